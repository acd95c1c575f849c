//! Arbitrary precision integers: `uint N`/`int N` wider than 64 bits and
//! the length-prefixed `VarUInteger n`/`VarInteger n`

use crate::cell::{CellBuilder, Slice, bits_for};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub(crate) fn load_biguint(slice: &mut Slice, bits: usize) -> TlbResult<BigUint> {
    if bits == 0 {
        return Ok(BigUint::zero());
    }
    let bytes = slice.load_bits(bits)?;
    let padding = bytes.len() * 8 - bits;
    Ok(BigUint::from_bytes_be(&bytes) >> padding)
}

pub(crate) fn store_biguint(builder: &mut CellBuilder, value: &BigUint, bits: usize) -> TlbResult<()> {
    if value.bits() as usize > bits {
        return Err(TlbError::IntOverflow(format!(
            "{value} does not fit into {bits} bits"
        )));
    }
    if bits == 0 {
        return Ok(());
    }
    let len = bits.div_ceil(8);
    let padding = len * 8 - bits;
    let raw = (value << padding).to_bytes_be();
    let mut bytes = vec![0u8; len];
    if !value.is_zero() {
        bytes[len - raw.len()..].copy_from_slice(&raw);
    }
    builder.store_bits(&bytes, bits)?;
    Ok(())
}

pub(crate) fn load_bigint(slice: &mut Slice, bits: usize) -> TlbResult<BigInt> {
    let unsigned = load_biguint(slice, bits)?;
    if bits > 0 && unsigned.bit(bits as u64 - 1) {
        let modulus = BigUint::one() << bits;
        return Ok(BigInt::from(unsigned) - BigInt::from(modulus));
    }
    Ok(BigInt::from(unsigned))
}

pub(crate) fn store_bigint(builder: &mut CellBuilder, value: &BigInt, bits: usize) -> TlbResult<()> {
    let overflow = || TlbError::IntOverflow(format!("{value} does not fit into {bits} signed bits"));
    if bits == 0 {
        return if value.is_zero() { Ok(()) } else { Err(overflow()) };
    }
    let limit = BigInt::one() << (bits - 1);
    if *value >= limit || *value < -&limit {
        return Err(overflow());
    }
    let unsigned = if value.sign() == Sign::Minus {
        value + (BigInt::one() << bits)
    } else {
        value.clone()
    };
    let unsigned = unsigned.to_biguint().ok_or_else(overflow)?;
    store_biguint(builder, &unsigned, bits)
}

/// `uint N` of any width
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BigUintN<const N: usize>(pub BigUint);

/// `int N` of any width
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BigIntN<const N: usize>(pub BigInt);

pub type Uint256 = BigUintN<256>;
pub type Int257 = BigIntN<257>;

impl<const N: usize> TlbDecode for BigUintN<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        load_biguint(slice, N).map(Self)
    }
}

impl<const N: usize> TlbEncode for BigUintN<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        store_biguint(builder, &self.0, N)
    }
}

impl<const N: usize> TlbDecode for BigIntN<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        load_bigint(slice, N).map(Self)
    }
}

impl<const N: usize> TlbEncode for BigIntN<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        store_bigint(builder, &self.0, N)
    }
}

/// `var_uint$_ {n:#} len:(#< n) value:(uint (len * 8)) = VarUInteger n`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarUInteger<const N: usize>(pub BigUint);

/// `var_int$_ {n:#} len:(#< n) value:(int (len * 8)) = VarInteger n`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarInteger<const N: usize>(pub BigInt);

pub type VarUInteger3 = VarUInteger<3>;
pub type VarUInteger7 = VarUInteger<7>;
pub type VarUInteger16 = VarUInteger<16>;
pub type VarUInteger32 = VarUInteger<32>;

fn var_len_bits<const N: usize>() -> usize {
    bits_for(N.saturating_sub(1) as u64)
}

impl<const N: usize> TlbDecode for VarUInteger<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let len = slice.load_uint(var_len_bits::<N>())? as usize;
        if len >= N {
            return Err(TlbError::IntOverflow(format!(
                "VarUInteger {N} with {len} bytes"
            )));
        }
        load_biguint(slice, len * 8).map(Self)
    }
}

impl<const N: usize> TlbEncode for VarUInteger<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        let len = (self.0.bits() as usize).div_ceil(8);
        if len >= N {
            return Err(TlbError::IntOverflow(format!(
                "{} does not fit into VarUInteger {N}",
                self.0
            )));
        }
        builder.store_uint(len as u64, var_len_bits::<N>())?;
        store_biguint(builder, &self.0, len * 8)
    }
}

impl<const N: usize> TlbDecode for VarInteger<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let len = slice.load_uint(var_len_bits::<N>())? as usize;
        if len >= N {
            return Err(TlbError::IntOverflow(format!("VarInteger {N} with {len} bytes")));
        }
        load_bigint(slice, len * 8).map(Self)
    }
}

impl<const N: usize> TlbEncode for VarInteger<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        let len = if self.0.is_zero() {
            0
        } else {
            self.0.to_signed_bytes_be().len()
        };
        if len >= N {
            return Err(TlbError::IntOverflow(format!(
                "{} does not fit into VarInteger {N}",
                self.0
            )));
        }
        builder.store_uint(len as u64, var_len_bits::<N>())?;
        store_bigint(builder, &self.0, len * 8)
    }
}

macro_rules! impl_decimal_text {
    ($($name:ident => $inner:ty),*) => {$(
        impl<const N: usize> fmt::Display for $name<N> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<const N: usize> FromStr for $name<N> {
            type Err = num_bigint::ParseBigIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<$inner>().map(Self)
            }
        }

        impl<const N: usize> From<u64> for $name<N> {
            fn from(value: u64) -> Self {
                Self(<$inner>::from(value))
            }
        }

        impl<const N: usize> Serialize for $name<N> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de, const N: usize> Deserialize<'de> for $name<N> {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    )*};
}

impl_decimal_text!(
    BigUintN => BigUint,
    BigIntN => BigInt,
    VarUInteger => BigUint,
    VarInteger => BigInt
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{marshal, unmarshal};

    #[test]
    fn test_uint256() {
        let value = Uint256::from_str(
            "115792089237316195423570985008687907853269984665640564039457584007913129639935",
        )
        .unwrap();
        let cell = marshal(&value).unwrap();
        assert_eq!(cell.bit_len(), 256);
        assert!(cell.data().iter().all(|b| *b == 0xFF));
        assert_eq!(unmarshal::<Uint256>(&cell).unwrap(), value);
    }

    #[test]
    fn test_int257_sign() {
        for v in ["-1", "0", "12345678901234567890", "-115792089237316195423570985008687907853269984665640564039457584007913129639936"] {
            let value = Int257::from_str(v).unwrap();
            let cell = marshal(&value).unwrap();
            assert_eq!(cell.bit_len(), 257);
            assert_eq!(unmarshal::<Int257>(&cell).unwrap(), value);
        }
        assert!(marshal(&BigIntN::<8>(BigInt::from(128))).is_err());
        assert!(marshal(&BigIntN::<8>(BigInt::from(-128))).is_ok());
    }

    #[test]
    fn test_var_uinteger() {
        let zero = marshal(&VarUInteger16::from(0)).unwrap();
        assert_eq!(zero.bit_len(), 4);

        let value = VarUInteger32::from(0x0102_0304);
        let cell = marshal(&value).unwrap();
        assert_eq!(cell.bit_len(), 5 + 32);
        assert_eq!(unmarshal::<VarUInteger32>(&cell).unwrap(), value);

        // 3 bytes do not fit into VarUInteger 3
        assert!(marshal(&VarUInteger3::from(0xFF_FFFF)).is_err());
        assert!(marshal(&VarUInteger3::from(0xFFFF)).is_ok());
    }

    #[test]
    fn test_var_integer() {
        for v in [0i64, -1, 127, 128, -129, i64::MIN] {
            let value = VarInteger::<16>(BigInt::from(v));
            let cell = marshal(&value).unwrap();
            assert_eq!(unmarshal::<VarInteger<16>>(&cell).unwrap(), value);
        }
        let cell = marshal(&VarInteger::<16>(BigInt::from(-1))).unwrap();
        assert_eq!(cell.bit_len(), 4 + 8);
    }

    #[test]
    fn test_decimal_json() {
        let value = VarUInteger16::from(1_000_000_000_000);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"1000000000000\"");
        assert_eq!(serde_json::from_str::<VarUInteger16>(&json).unwrap(), value);
    }
}
