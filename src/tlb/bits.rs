//! Fixed-size bit blobs (`bits256` and friends), rendered as hex

use crate::cell::{CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! define_bits {
    ($($(#[$meta:meta])* $name:ident => $bytes:literal),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $bytes]);

        impl $name {
            pub const BITS: usize = $bytes * 8;

            pub fn as_bytes(&self) -> &[u8; $bytes] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $bytes])
            }
        }

        impl From<[u8; $bytes]> for $name {
            fn from(bytes: [u8; $bytes]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = TlbError;

            fn from_str(s: &str) -> TlbResult<Self> {
                let bytes = hex::decode(s.trim())
                    .map_err(|e| TlbError::InvalidData(format!("{}: {e}", stringify!($name))))?;
                let bytes: [u8; $bytes] = bytes.try_into().map_err(|v: Vec<u8>| {
                    TlbError::InvalidData(format!(
                        "{} needs {} bytes, got {}",
                        stringify!($name),
                        $bytes,
                        v.len()
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl TlbDecode for $name {
            fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
                let bytes = slice.load_bytes($bytes)?;
                let mut array = [0u8; $bytes];
                array.copy_from_slice(&bytes);
                Ok(Self(array))
            }
        }

        impl TlbEncode for $name {
            fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
                builder.store_bytes(&self.0)?;
                Ok(())
            }
        }
    )*};
}

define_bits! {
    Bits96 => 12,
    /// Hashes, public keys and account ids
    Bits256 => 32,
    /// Workchain byte plus account id
    Bits264 => 33,
    Bits320 => 40,
    Bits352 => 44,
    /// Signatures
    Bits512 => 64,
}
