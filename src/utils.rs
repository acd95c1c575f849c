use anyhow::{Context, Result, bail};
use pretty_env_logger::formatted_builder;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub fn init_logger() -> Result<(), log::SetLoggerError> {
    let mut builder = formatted_builder();

    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.parse_filters("info");
    }

    builder.try_init()
}

/// How the hashmap encoder picks an edge label form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// `hml_short` when it is no longer than `hml_long`, otherwise `hml_long`
    #[default]
    ShortOrLong,
    /// Like `ShortOrLong`, but uses `hml_same` for uniform labels when it is
    /// strictly shorter. Matches the TON reference encoder byte for byte.
    Canonical,
}

impl FromStr for LabelPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_or_long" | "short-or-long" | "default" => Ok(Self::ShortOrLong),
            "canonical" => Ok(Self::Canonical),
            other => bail!("unknown label policy: {other}"),
        }
    }
}

/// Codec settings shared by decoders and encoders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Wrap errors with the path of fields being decoded or encoded
    pub debug_path: bool,
    pub label_policy: LabelPolicy,
    /// Append a CRC32C to serialized bags of cells
    pub boc_crc32c: bool,
}

impl CodecConfig {
    /// Defaults overlaid with `TLB_DEBUG_PATH`, `TLB_LABEL_POLICY` and `TLB_BOC_CRC32C`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(s) = ::std::env::var("TLB_DEBUG_PATH") {
            config.debug_path = parse_flag(&s).context("TLB_DEBUG_PATH")?;
        }
        if let Ok(s) = ::std::env::var("TLB_LABEL_POLICY") {
            config.label_policy = s.parse().context("TLB_LABEL_POLICY")?;
        }
        if let Ok(s) = ::std::env::var("TLB_BOC_CRC32C") {
            config.boc_crc32c = parse_flag(&s).context("TLB_BOC_CRC32C")?;
        }
        Ok(config)
    }
}

fn parse_flag(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("invalid boolean flag: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config: CodecConfig =
            serde_json::from_str(r#"{"debug_path": true, "label_policy": "canonical"}"#).unwrap();
        assert!(config.debug_path);
        assert_eq!(config.label_policy, LabelPolicy::Canonical);
        assert!(!config.boc_crc32c);

        let config: CodecConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
    }

    #[test]
    fn test_init_logger_once() {
        let _ = init_logger();
        log::debug!("logger initialized");
        assert!(init_logger().is_err());
    }

    #[test]
    fn test_parse_flags() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
        assert_eq!(
            "Canonical".parse::<LabelPolicy>().unwrap(),
            LabelPolicy::Canonical
        );
        assert!("longest".parse::<LabelPolicy>().is_err());
    }
}
