//! Primitive TL-B types: integers, coins and the wrapper combinators

use crate::cell::{Cell, CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

impl TlbDecode for bool {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        Ok(slice.load_bit()?)
    }
}

impl TlbEncode for bool {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bit(*self)?;
        Ok(())
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl TlbDecode for $ty {
            fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
                Ok(slice.load_uint(<$ty>::BITS as usize)? as $ty)
            }

            fn decode_tlb_bits(slice: &mut Slice, _decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
                let value = slice.load_uint(bits)?;
                <$ty>::try_from(value).map_err(|_| {
                    TlbError::IntOverflow(format!("{value} does not fit {}", stringify!($ty)))
                })
            }
        }

        impl TlbEncode for $ty {
            fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
                builder.store_uint(*self as u64, <$ty>::BITS as usize)?;
                Ok(())
            }

            fn encode_tlb_bits(
                &self,
                builder: &mut CellBuilder,
                _encoder: &mut Encoder,
                bits: usize,
            ) -> TlbResult<()> {
                builder.store_uint(*self as u64, bits)?;
                Ok(())
            }
        }
    )*};
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl TlbDecode for $ty {
            fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
                Ok(slice.load_int(<$ty>::BITS as usize)? as $ty)
            }

            fn decode_tlb_bits(slice: &mut Slice, _decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
                if bits > 64 {
                    return Err(TlbError::IntOverflow(format!("{bits}-bit signed integer")));
                }
                let value = slice.load_int(bits)?;
                <$ty>::try_from(value).map_err(|_| {
                    TlbError::IntOverflow(format!("{value} does not fit {}", stringify!($ty)))
                })
            }
        }

        impl TlbEncode for $ty {
            fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
                builder.store_int(*self as i64, <$ty>::BITS as usize)?;
                Ok(())
            }

            fn encode_tlb_bits(
                &self,
                builder: &mut CellBuilder,
                _encoder: &mut Encoder,
                bits: usize,
            ) -> TlbResult<()> {
                builder.store_int(*self as i64, bits)?;
                Ok(())
            }
        }
    )*};
}

impl_unsigned!(u8, u16, u32, u64);
impl_signed!(i8, i16, i32, i64);

/// `uint N` for `N <= 64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uint<const N: usize>(pub u64);

/// `int N` for `N <= 64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Int<const N: usize>(pub i64);

impl<const N: usize> TlbDecode for Uint<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        Ok(Self(slice.load_uint(N)?))
    }
}

impl<const N: usize> TlbEncode for Uint<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_uint(self.0, N)?;
        Ok(())
    }
}

impl<const N: usize> TlbDecode for Int<N> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        Ok(Self(slice.load_int(N)?))
    }
}

impl<const N: usize> TlbEncode for Int<N> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_int(self.0, N)?;
        Ok(())
    }
}

/// Fixed-size byte arrays are stored verbatim
impl<const N: usize> TlbDecode for [u8; N] {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let bytes = slice.load_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(&bytes);
        Ok(array)
    }
}

impl<const N: usize> TlbEncode for [u8; N] {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bytes(self)?;
        Ok(())
    }
}

/// Byte strings: the rest of the slice, or exactly `Nbits`/`Nbytes`
impl TlbDecode for Vec<u8> {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let bits = slice.remaining_bits();
        if bits % 8 != 0 {
            return Err(TlbError::InvalidData(format!(
                "{bits} remaining bits are not a whole number of bytes"
            )));
        }
        Ok(slice.load_bits(bits)?)
    }

    fn decode_tlb_bits(slice: &mut Slice, _decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
        Ok(slice.load_bits(bits)?)
    }
}

impl TlbEncode for Vec<u8> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bytes(self)?;
        Ok(())
    }

    fn encode_tlb_bits(
        &self,
        builder: &mut CellBuilder,
        _encoder: &mut Encoder,
        bits: usize,
    ) -> TlbResult<()> {
        if self.len() * 8 < bits {
            return Err(TlbError::InvalidData(format!(
                "{} bytes cannot fill {bits} bits",
                self.len()
            )));
        }
        builder.store_bits(self, bits)?;
        Ok(())
    }
}

/// `True`, `Unit` and other constructors without fields
impl TlbDecode for () {
    fn decode_tlb(_slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        Ok(())
    }
}

impl TlbEncode for () {
    fn encode_tlb(&self, _builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        Ok(())
    }
}

/// The remaining bits of the slice as UTF-8. Only valid as the last field.
impl TlbDecode for String {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let bits = slice.remaining_bits();
        if bits % 8 != 0 {
            return Err(TlbError::InvalidData(format!(
                "{bits} remaining bits are not a whole number of bytes"
            )));
        }
        let bytes = slice.load_bits(bits)?;
        String::from_utf8(bytes).map_err(|e| TlbError::InvalidData(e.to_string()))
    }
}

impl TlbEncode for String {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bytes(self.as_bytes())?;
        Ok(())
    }
}

fn load_grams(slice: &mut Slice) -> TlbResult<u64> {
    let len = slice.load_lim_uint(15)? as usize;
    if len > 8 {
        return Err(TlbError::GramsOverflow { bytes: len });
    }
    if len == 0 {
        return Ok(0);
    }
    Ok(slice.load_uint(len * 8)?)
}

fn store_grams(builder: &mut CellBuilder, amount: u64) -> TlbResult<()> {
    let len = (u64::BITS - amount.leading_zeros()).div_ceil(8) as usize;
    builder.store_uint(len as u64, 4)?;
    if len > 0 {
        builder.store_uint(amount, len * 8)?;
    }
    Ok(())
}

/// `nanograms$_ amount:(VarUInteger 16) = Grams`, limited to what fits into u64.
/// Rendered in JSON as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Grams(pub u64);

pub type Coins = Grams;

impl Grams {
    pub const ZERO: Grams = Grams(0);

    pub fn checked_add(self, other: Grams) -> TlbResult<Grams> {
        self.0
            .checked_add(other.0)
            .map(Grams)
            .ok_or_else(|| TlbError::IntOverflow(format!("{} + {}", self.0, other.0)))
    }
}

impl TlbDecode for Grams {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        load_grams(slice).map(Grams)
    }
}

impl TlbEncode for Grams {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        store_grams(builder, self.0)
    }
}

impl From<u64> for Grams {
    fn from(value: u64) -> Self {
        Grams(value)
    }
}

impl fmt::Display for Grams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Grams {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Grams)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

impl Serialize for Grams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Grams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrString::<u64>::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(Grams(n)),
            NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// A sign bit followed by [`Grams`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SignedCoins(pub i64);

impl TlbDecode for SignedCoins {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let negative = slice.load_bit()?;
        let amount = load_grams(slice)?;
        if amount > 1 << 63 || (!negative && amount == 1 << 63) {
            return Err(TlbError::GramsOverflow { bytes: 8 });
        }
        let value = if negative {
            (amount as i64).wrapping_neg()
        } else {
            amount as i64
        };
        Ok(SignedCoins(value))
    }
}

impl TlbEncode for SignedCoins {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bit(self.0 < 0)?;
        store_grams(builder, self.0.unsigned_abs())
    }
}

impl Serialize for SignedCoins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for SignedCoins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrString::<i64>::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(SignedCoins(n)),
            NumberOrString::String(s) => s.trim().parse().map(SignedCoins).map_err(serde::de::Error::custom),
        }
    }
}

/// `nothing$0 | just$1 value:X`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Maybe<T>(pub Option<T>);

impl<T> Maybe<T> {
    pub fn some(value: T) -> Self {
        Maybe(Some(value))
    }

    pub fn none() -> Self {
        Maybe(None)
    }

    pub fn as_ref(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T> From<Option<T>> for Maybe<T> {
    fn from(value: Option<T>) -> Self {
        Maybe(value)
    }
}

impl<T: TlbDecode> TlbDecode for Maybe<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if !slice.load_bit()? {
            return Ok(Maybe(None));
        }
        T::decode_tlb(slice, decoder).map(Maybe::some)
    }
}

impl<T: TlbEncode> TlbEncode for Maybe<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bit(self.0.is_some())?;
        match &self.0 {
            Some(value) => value.encode_tlb(builder, encoder),
            None => Ok(()),
        }
    }
}

/// `left$0 value:X | right$1 value:Y`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L: TlbDecode, R: TlbDecode> TlbDecode for Either<L, R> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if slice.load_bit()? {
            R::decode_tlb(slice, decoder).map(Either::Right)
        } else {
            L::decode_tlb(slice, decoder).map(Either::Left)
        }
    }
}

impl<L: TlbEncode, R: TlbEncode> TlbEncode for Either<L, R> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            Either::Left(value) => {
                builder.store_bit(false)?;
                value.encode_tlb(builder, encoder)
            }
            Either::Right(value) => {
                builder.store_bit(true)?;
                value.encode_tlb(builder, encoder)
            }
        }
    }
}

/// `Either X ^X`: the value inline or in the next child cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EitherRef<T> {
    Inline(T),
    Ref(T),
}

impl<T> EitherRef<T> {
    pub fn value(&self) -> &T {
        match self {
            EitherRef::Inline(value) | EitherRef::Ref(value) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            EitherRef::Inline(value) | EitherRef::Ref(value) => value,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, EitherRef::Ref(_))
    }
}

impl<T: TlbDecode> TlbDecode for EitherRef<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if !slice.load_bit()? {
            return T::decode_tlb(slice, decoder).map(EitherRef::Inline);
        }
        let cell = slice.load_reference()?;
        let mut inner = decoder.open::<T>(&cell)?;
        T::decode_tlb(&mut inner, decoder).map(EitherRef::Ref)
    }
}

impl<T: TlbEncode> TlbEncode for EitherRef<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            EitherRef::Inline(value) => {
                builder.store_bit(false)?;
                value.encode_tlb(builder, encoder)
            }
            EitherRef::Ref(value) => {
                builder.store_bit(true)?;
                let cell = value.encode_as_ref(encoder)?;
                builder.store_reference(cell)?;
                Ok(())
            }
        }
    }
}

impl<T: Serialize> Serialize for EitherRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// `^X`: the value always lives in the next child cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ref<T>(pub T);

impl<T: TlbDecode> TlbDecode for Ref<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let cell = slice.load_reference()?;
        let mut inner = decoder.open::<T>(&cell)?;
        T::decode_tlb(&mut inner, decoder).map(Ref)
    }
}

impl<T: TlbEncode> TlbEncode for Ref<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        let cell = self.0.encode_as_ref(encoder)?;
        builder.store_reference(cell)?;
        Ok(())
    }
}

/// Captures everything left in the slice, bits and references, as a cell.
/// Library and pruned cells are kept as they are.
#[derive(Clone, PartialEq, Eq)]
pub struct Any(pub Arc<Cell>);

impl Any {
    pub fn cell(&self) -> &Arc<Cell> {
        &self.0
    }
}

impl Default for Any {
    fn default() -> Self {
        Any(Arc::new(Cell::new()))
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Any({:?})", self.0)
    }
}

impl TlbDecode for Any {
    const KEEPS_LIBRARY_CELLS: bool = true;
    const KEEPS_PRUNED_CELLS: bool = true;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        Arc::<Cell>::decode_tlb(slice, decoder).map(Any)
    }
}

impl TlbEncode for Any {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_cell(&self.0)?;
        Ok(())
    }

    fn encode_as_ref(&self, _encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        Ok(self.0.clone())
    }
}

/// Serialized as the hex of a bag of cells holding the captured cell
impl Serialize for Any {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hex = crate::cell::boc_to_hex(&self.0, false).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Any {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        crate::cell::hex_to_boc(&hex)
            .map(Any)
            .map_err(serde::de::Error::custom)
    }
}

/// `unary_zero$0 | unary_succ$1 x:(Unary ~n)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unary(pub usize);

impl TlbDecode for Unary {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        Ok(Unary(slice.load_unary()?))
    }
}

impl TlbEncode for Unary {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_unary(self.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{marshal, unmarshal};

    fn roundtrip<T: TlbDecode + TlbEncode + PartialEq + fmt::Debug>(value: T) -> Arc<Cell> {
        let cell = marshal(&value).unwrap();
        let decoded: T = unmarshal(&cell).unwrap();
        assert_eq!(decoded, value);
        cell
    }

    #[test]
    fn test_grams_boundaries() {
        assert_eq!(roundtrip(Grams(0)).bit_len(), 4);
        assert_eq!(roundtrip(Grams(1 << 32)).bit_len(), 4 + 5 * 8);
        assert_eq!(roundtrip(Grams(1 << 63)).bit_len(), 4 + 8 * 8);
        assert_eq!(roundtrip(Grams(u64::MAX)).bit_len(), 4 + 8 * 8);
    }

    #[test]
    fn test_grams_overflow() {
        let mut builder = CellBuilder::new();
        builder.store_uint(9, 4).unwrap();
        builder.store_bytes(&[1; 9]).unwrap();
        let err = unmarshal::<Grams>(&builder.build().unwrap()).unwrap_err();
        assert!(matches!(err, TlbError::GramsOverflow { bytes: 9 }));
    }

    #[test]
    fn test_grams_json() {
        assert_eq!(serde_json::to_string(&Grams(1_000_000_000)).unwrap(), "\"1000000000\"");
        assert_eq!(serde_json::from_str::<Grams>("\"42\"").unwrap(), Grams(42));
        assert_eq!(serde_json::from_str::<Grams>("42").unwrap(), Grams(42));
    }

    #[test]
    fn test_signed_coins() {
        roundtrip(SignedCoins(0));
        roundtrip(SignedCoins(-5));
        roundtrip(SignedCoins(i64::MAX));
        roundtrip(SignedCoins(i64::MIN));

        let mut builder = CellBuilder::new();
        builder.store_bit(false).unwrap();
        builder.store_uint(8, 4).unwrap();
        builder.store_u64(1 << 63).unwrap();
        assert!(unmarshal::<SignedCoins>(&builder.build().unwrap()).is_err());
    }

    #[test]
    fn test_integers() {
        roundtrip(-1i8);
        roundtrip(0xBEEFu16);
        roundtrip(i64::MIN);
        roundtrip(Uint::<9>(511));
        roundtrip(Int::<9>(-256));
        assert!(marshal(&Uint::<9>(512)).is_err());
    }

    #[test]
    fn test_combinators() {
        assert_eq!(roundtrip(Maybe::<u8>(None)).bit_len(), 1);
        assert_eq!(roundtrip(Maybe::some(7u8)).bit_len(), 9);
        roundtrip(Either::<u8, u16>::Left(1));
        assert_eq!(roundtrip(Either::<u8, u16>::Right(2)).bit_len(), 17);

        let cell = roundtrip(EitherRef::Ref(0xAAu8));
        assert_eq!(cell.bit_len(), 1);
        assert_eq!(cell.reference_count(), 1);
        let cell = roundtrip(EitherRef::Inline(0xAAu8));
        assert_eq!(cell.reference_count(), 0);

        let cell = roundtrip(Ref(5u32));
        assert_eq!(cell.bit_len(), 0);
        assert_eq!(cell.reference(0).unwrap().bit_len(), 32);
        roundtrip(Unary(5));
    }

    #[test]
    fn test_any_captures_rest() {
        let child = Arc::new(Cell::new());
        let mut builder = CellBuilder::new();
        builder.store_u16(0xABCD).unwrap();
        builder.store_reference(child).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = cell.as_slice();
        slice.skip_bits(8).unwrap();
        let any = Any::decode_tlb(&mut slice, &mut Decoder::new()).unwrap();
        assert!(slice.is_empty());
        assert_eq!(any.0.bit_len(), 8);
        assert_eq!(any.0.reference_count(), 1);
    }

    #[test]
    fn test_string_tail() {
        let cell = roundtrip("hello".to_string());
        assert_eq!(cell.bit_len(), 40);
        let mut builder = CellBuilder::new();
        builder.store_uint(1, 3).unwrap();
        assert!(unmarshal::<String>(&builder.build().unwrap()).is_err());
    }
}
