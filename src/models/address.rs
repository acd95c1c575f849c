//! Account addresses
//!
//! ```text
//! addr_none$00 = MsgAddressExt;
//! addr_extern$01 len:(## 9) external_address:(bits len) = MsgAddressExt;
//! anycast_info$_ depth:(#<= 30) { depth >= 1 } rewrite_pfx:(bits depth) = Anycast;
//! addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256 = MsgAddressInt;
//! addr_var$11 anycast:(Maybe Anycast) addr_len:(## 9) workchain_id:int32
//!   address:(bits addr_len) = MsgAddressInt;
//! ```
//!
//! [`MsgAddress`] is the on-chain form. [`AccountId`] is the usual
//! `workchain:hash` pair with its raw and user-friendly (base64) renderings.

use crate::cell::{BitString, CellBuilder, Slice, bits_for};
use crate::crc::CRC16;
use crate::tlb::{Bits256, Decoder, Encoder, TlbDecode, TlbEncode, TlbError, TlbResult};
use anyhow::{Result, bail};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const ANYCAST_MAX_DEPTH: u64 = 30;
const ADDR_LEN_BITS: usize = 9;

/// Rewrites the first `depth` bits of the address when routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anycast {
    pub depth: u8,
    pub rewrite_pfx: u32,
}

impl TlbDecode for Anycast {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let depth = slice.load_lim_uint(ANYCAST_MAX_DEPTH)? as u8;
        if depth < 1 {
            return Err(TlbError::InvalidData("anycast depth must be positive".to_string()));
        }
        let rewrite_pfx = slice.load_uint(depth as usize)? as u32;
        Ok(Self { depth, rewrite_pfx })
    }
}

impl TlbEncode for Anycast {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        if self.depth < 1 || self.depth as u64 > ANYCAST_MAX_DEPTH {
            return Err(TlbError::InvalidData(format!(
                "anycast depth {} out of range",
                self.depth
            )));
        }
        builder.store_uint(self.depth as u64, bits_for(ANYCAST_MAX_DEPTH))?;
        builder.store_uint(self.rewrite_pfx as u64, self.depth as usize)?;
        Ok(())
    }
}

/// Any of the four address forms
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MsgAddress {
    #[default]
    None,
    Extern(BitString),
    Std {
        anycast: Option<Anycast>,
        workchain: i8,
        address: Bits256,
    },
    Var {
        anycast: Option<Anycast>,
        workchain: i32,
        address: BitString,
    },
}

impl MsgAddress {
    pub fn std(workchain: i8, address: Bits256) -> Self {
        MsgAddress::Std {
            anycast: None,
            workchain,
            address,
        }
    }

    pub fn sum_type(&self) -> &'static str {
        match self {
            MsgAddress::None => "AddrNone",
            MsgAddress::Extern(_) => "AddrExtern",
            MsgAddress::Std { .. } => "AddrStd",
            MsgAddress::Var { .. } => "AddrVar",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, MsgAddress::None)
    }

    /// The internal account this address points at. Var addresses qualify
    /// only when they are exactly 256 bits long.
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            MsgAddress::Std {
                workchain, address, ..
            } => Some(AccountId::new(*workchain as i32, *address)),
            MsgAddress::Var {
                workchain, address, ..
            } if address.len() == Bits256::BITS => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(address.as_bytes());
                Some(AccountId::new(*workchain, Bits256(bytes)))
            }
            _ => None,
        }
    }
}

fn load_anycast(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Option<Anycast>> {
    if slice.load_bit()? {
        Ok(Some(Anycast::decode_tlb(slice, decoder)?))
    } else {
        Ok(None)
    }
}

fn store_anycast(
    builder: &mut CellBuilder,
    encoder: &mut Encoder,
    anycast: &Option<Anycast>,
) -> TlbResult<()> {
    builder.store_bit(anycast.is_some())?;
    if let Some(anycast) = anycast {
        anycast.encode_tlb(builder, encoder)?;
    }
    Ok(())
}

impl TlbDecode for MsgAddress {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        match slice.load_uint(2)? {
            0b00 => Ok(MsgAddress::None),
            0b01 => {
                let len = slice.load_uint(ADDR_LEN_BITS)? as usize;
                Ok(MsgAddress::Extern(slice.load_bit_string(len)?))
            }
            0b10 => {
                let anycast = load_anycast(slice, decoder)?;
                let workchain = slice.load_int(8)? as i8;
                let address = Bits256::decode_tlb(slice, decoder)?;
                Ok(MsgAddress::Std {
                    anycast,
                    workchain,
                    address,
                })
            }
            _ => {
                let anycast = load_anycast(slice, decoder)?;
                let len = slice.load_uint(ADDR_LEN_BITS)? as usize;
                let workchain = slice.load_int(32)? as i32;
                let address = slice.load_bit_string(len)?;
                Ok(MsgAddress::Var {
                    anycast,
                    workchain,
                    address,
                })
            }
        }
    }
}

impl TlbEncode for MsgAddress {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            MsgAddress::None => {
                builder.store_uint(0b00, 2)?;
            }
            MsgAddress::Extern(address) => {
                builder.store_uint(0b01, 2)?;
                builder.store_uint(address.len() as u64, ADDR_LEN_BITS)?;
                builder.store_bit_string(address)?;
            }
            MsgAddress::Std {
                anycast,
                workchain,
                address,
            } => {
                builder.store_uint(0b10, 2)?;
                store_anycast(builder, encoder, anycast)?;
                builder.store_int(*workchain as i64, 8)?;
                address.encode_tlb(builder, encoder)?;
            }
            MsgAddress::Var {
                anycast,
                workchain,
                address,
            } => {
                builder.store_uint(0b11, 2)?;
                store_anycast(builder, encoder, anycast)?;
                builder.store_uint(address.len() as u64, ADDR_LEN_BITS)?;
                builder.store_int(*workchain as i64, 32)?;
                builder.store_bit_string(address)?;
            }
        }
        Ok(())
    }
}

/// `""` for none, fift hex for extern, `wc:hex` for std and `wc:fifthex`
/// for var, with an optional `:Anycast(depth,prefix)` suffix.
impl fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (anycast, body) = match self {
            MsgAddress::None => return Ok(()),
            MsgAddress::Extern(address) => return f.write_str(&address.to_fift_hex()),
            MsgAddress::Std {
                anycast,
                workchain,
                address,
            } => (anycast, format!("{workchain}:{}", address.to_hex())),
            MsgAddress::Var {
                anycast,
                workchain,
                address,
            } => (anycast, format!("{workchain}:{}", address.to_fift_hex())),
        };
        f.write_str(&body)?;
        if let Some(anycast) = anycast {
            write!(f, ":Anycast({},{})", anycast.depth, anycast.rewrite_pfx)?;
        }
        Ok(())
    }
}

fn parse_anycast(s: &str) -> Result<Anycast> {
    let Some(inner) = s
        .strip_prefix("Anycast(")
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        bail!("unknown address suffix {s:?}");
    };
    let Some((depth, prefix)) = inner.split_once(',') else {
        bail!("invalid anycast {s:?}");
    };
    Ok(Anycast {
        depth: depth.trim().parse()?,
        rewrite_pfx: prefix.trim().parse()?,
    })
}

impl FromStr for MsgAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(MsgAddress::None);
        }
        let parts: Vec<&str> = s.split(':').collect();
        let anycast = match parts.len() {
            1 => return Ok(MsgAddress::Extern(BitString::from_fift_hex(s)?)),
            2 => None,
            3 => Some(parse_anycast(parts[2])?),
            _ => bail!("unknown address format {s:?}"),
        };

        let workchain: i32 = parts[0].parse()?;
        let body = parts[1];
        if body.len() == 64 && !body.ends_with('_') {
            if let Ok(workchain) = i8::try_from(workchain) {
                return Ok(MsgAddress::Std {
                    anycast,
                    workchain,
                    address: body.parse()?,
                });
            }
        }
        Ok(MsgAddress::Var {
            anycast,
            workchain,
            address: BitString::from_fift_hex(body)?,
        })
    }
}

impl Serialize for MsgAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MsgAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Flags carried by the user-friendly form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressFlags {
    pub bounceable: bool,
    pub test_only: bool,
}

impl Default for AddressFlags {
    fn default() -> Self {
        Self {
            bounceable: true,
            test_only: false,
        }
    }
}

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// An internal account: workchain plus the 256-bit account hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId {
    pub workchain: i32,
    pub address: Bits256,
}

impl AccountId {
    pub fn new(workchain: i32, address: Bits256) -> Self {
        Self { workchain, address }
    }

    /// Parses `workchain:hex`. A short hex part is left-padded with zeros.
    pub fn from_raw(s: &str) -> Result<Self> {
        let Some((workchain, hash)) = s.split_once(':') else {
            bail!("invalid raw address {s:?}");
        };
        if hash.is_empty() || hash.len() > 64 {
            bail!("invalid raw address {s:?}");
        }
        let workchain = workchain.parse::<i32>()?;
        let padded = format!("{hash:0>64}");
        let bytes = hex::decode(padded)?;
        let mut address = [0u8; 32];
        address.copy_from_slice(&bytes);
        Ok(Self::new(workchain, Bits256(address)))
    }

    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, self.address.to_hex())
    }

    /// Parses the 48-character user-friendly form, URL-safe or standard alphabet
    pub fn from_base64(s: &str) -> Result<(Self, AddressFlags)> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s)
            .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(s))
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(s))?;

        if decoded.len() != 36 {
            bail!("invalid user-friendly address length {}", decoded.len());
        }

        let mut tag = decoded[0];
        let test_only = tag & TAG_TEST_ONLY != 0;
        tag &= !TAG_TEST_ONLY;
        let bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            _ => bail!("invalid address tag {:#x}", decoded[0]),
        };

        let checksum = CRC16.checksum(&decoded[..34]).to_be_bytes();
        if checksum != decoded[34..36] {
            bail!("invalid address checksum");
        }

        let mut address = [0u8; 32];
        address.copy_from_slice(&decoded[2..34]);
        Ok((
            Self::new(decoded[1] as i8 as i32, Bits256(address)),
            AddressFlags {
                bounceable,
                test_only,
            },
        ))
    }

    pub fn to_base64(&self, flags: AddressFlags, url_safe: bool) -> String {
        let mut tag = if flags.bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if flags.test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut data = Vec::with_capacity(36);
        data.push(tag);
        data.push(self.workchain as i8 as u8);
        data.extend_from_slice(self.address.as_bytes());
        data.extend_from_slice(&CRC16.checksum(&data).to_be_bytes());

        if url_safe {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&data)
        } else {
            base64::engine::general_purpose::STANDARD.encode(&data)
        }
    }

    /// Internal addresses with a workchain outside `int8` take the var form
    pub fn to_msg_address(&self) -> MsgAddress {
        match i8::try_from(self.workchain) {
            Ok(workchain) => MsgAddress::std(workchain, self.address),
            Err(_) => MsgAddress::Var {
                anycast: None,
                workchain: self.workchain,
                address: BitString::from_bytes(self.address.as_bytes()),
            },
        }
    }
}

impl From<AccountId> for MsgAddress {
    fn from(account: AccountId) -> Self {
        account.to_msg_address()
    }
}

impl From<Option<AccountId>> for MsgAddress {
    fn from(account: Option<AccountId>) -> Self {
        account.map(|a| a.to_msg_address()).unwrap_or_default()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// Accepts both the raw and the user-friendly form
impl FromStr for AccountId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            return Self::from_raw(s);
        }
        Self::from_base64(s).map(|(account, _)| account)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{from_boc_hex, marshal, to_boc_hex, unmarshal};

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    #[test]
    fn test_account_id_raw() {
        let account = AccountId::from_raw(RAW).unwrap();
        assert_eq!(account.workchain, 0);
        assert_eq!(account.to_raw(), RAW);

        let padded = AccountId::from_raw(
            "0:14A79eb7a81cf37542a62b75defa99427580e6612f956d47caa0fe0ec5d05e",
        )
        .unwrap();
        assert_eq!(
            padded.to_raw(),
            "0:0014a79eb7a81cf37542a62b75defa99427580e6612f956d47caa0fe0ec5d05e"
        );

        assert!(AccountId::from_raw("0:14A79eb7a8ZZZZ").is_err());
        assert!(
            AccountId::from_raw(
                "0:7014a79eb7a81cf37542a62b75defa99427580e6612f956d47caa0fe0ec5d05e:"
            )
            .is_err()
        );
    }

    #[test]
    fn test_account_id_base64() {
        let (account, flags) =
            AccountId::from_base64("EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N").unwrap();
        assert_eq!(account.to_raw(), RAW);
        assert!(flags.bounceable);
        assert!(!flags.test_only);
        assert_eq!(
            account.to_base64(flags, true),
            "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N"
        );
        assert!(AccountId::from_base64("EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2O").is_err());
    }

    #[test]
    fn test_zero_address_formats() {
        let zero = AccountId::new(0, Bits256::default());
        assert_eq!(
            zero.to_base64(AddressFlags::default(), true),
            "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c"
        );
        let non_bounceable = AddressFlags {
            bounceable: false,
            test_only: false,
        };
        assert_eq!(
            zero.to_base64(non_bounceable, true),
            "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ"
        );
        let parsed: AccountId = "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ".parse().unwrap();
        assert_eq!(parsed, zero);
    }

    #[test]
    fn test_account_id_json() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(rename = "A")]
            a: AccountId,
        }
        let wrapper: Wrapper = serde_json::from_str(
            r#"{"A": "-1:7014a79eb7a81cf37542a62b75defa99427580e6612f956d47caa0fe0ec5d05e"}"#,
        )
        .unwrap();
        assert_eq!(wrapper.a.workchain, -1);
        assert_eq!(wrapper.a.address.0[..4], [112, 20, 167, 158]);
    }

    #[test]
    fn test_msg_address_forms() {
        let std = AccountId::from_raw(RAW).unwrap().to_msg_address();
        let anycast = MsgAddress::Std {
            anycast: Some(Anycast {
                depth: 5,
                rewrite_pfx: 0b10110,
            }),
            workchain: -1,
            address: Bits256([0xAB; 32]),
        };
        let var = MsgAddress::Var {
            anycast: None,
            workchain: 1_000_000,
            address: BitString::from_bytes(&[0xCA, 0xFE]),
        };
        let ext = MsgAddress::Extern(BitString::from_bytes(&[0x12, 0x34, 0x56]));

        for address in [MsgAddress::None, std.clone(), anycast, var, ext] {
            let hex = to_boc_hex(&address).unwrap();
            let decoded: MsgAddress = from_boc_hex(&hex).unwrap();
            assert_eq!(decoded, address);
        }

        assert_eq!(marshal(&MsgAddress::None).unwrap().bit_len(), 2);
        assert_eq!(marshal(&std).unwrap().bit_len(), 2 + 1 + 8 + 256);
    }

    #[test]
    fn test_msg_address_text() {
        let std: MsgAddress = RAW.parse().unwrap();
        assert_eq!(std.sum_type(), "AddrStd");
        assert_eq!(std.to_string(), RAW);
        assert_eq!(std.account_id().unwrap().to_raw(), RAW);

        let text = format!("-1:{}:Anycast(3,5)", "ab".repeat(32));
        let anycast: MsgAddress = text.parse().unwrap();
        assert!(matches!(
            anycast,
            MsgAddress::Std {
                anycast: Some(Anycast {
                    depth: 3,
                    rewrite_pfx: 5
                }),
                ..
            }
        ));
        assert_eq!(anycast.to_string(), text);

        // Out of int8 range, so it can only be a var address
        let var: MsgAddress = format!("300:{}", "ab".repeat(32)).parse().unwrap();
        assert_eq!(var.sum_type(), "AddrVar");
        assert_eq!(var.account_id().unwrap().workchain, 300);

        let none: MsgAddress = serde_json::from_str(r#""""#).unwrap();
        assert!(none.is_none());
        assert_eq!(serde_json::to_string(&none).unwrap(), r#""""#);
        assert_eq!(MsgAddress::from(None::<AccountId>), MsgAddress::None);
    }

    #[test]
    fn test_anycast_depth_rejected() {
        let mut builder = CellBuilder::new();
        // addr_std with anycast of depth zero
        builder.store_uint(0b10, 2).unwrap();
        builder.store_bit(true).unwrap();
        builder.store_uint(0, 5).unwrap();
        builder.store_byte(0).unwrap();
        builder.store_bytes(&[0; 32]).unwrap();
        let cell = builder.build().unwrap();
        assert!(unmarshal::<MsgAddress>(&cell).is_err());
    }
}
