//! TL-B codec
//!
//! Every schema type implements [`TlbDecode`] and [`TlbEncode`]. Most impls are
//! generated by [`tlb_struct!`](crate::tlb_struct) and [`tlb_sum!`](crate::tlb_sum)
//! from the field list and tag annotations; types whose layout cannot be
//! expressed that way (dictionaries, addresses, block headers) implement the
//! traits by hand.
//!
//! [`Decoder`] and [`Encoder`] carry the per-call state: the library
//! resolver, the debug field path and the label policy.

#[macro_use]
pub mod macros;

pub mod bigint;
pub mod bintree;
pub mod bits;
pub mod error;
pub mod hashmap;
pub mod hashmap_aug;
pub mod label;
pub mod merkle;
pub mod primitives;
pub mod tag;
pub mod text;
#[cfg(test)]
mod tests;

pub use bigint::{BigIntN, BigUintN, Int257, Uint256, VarInteger, VarUInteger};
pub use bintree::BinTree;
pub use bits::{Bits96, Bits256, Bits264, Bits320, Bits352, Bits512};
pub use error::{TlbError, TlbResult};
pub use hashmap::{Hashmap, HashmapE, HashmapKey};
pub use hashmap_aug::{AugExtra, AugExtraTree, HashmapAug, HashmapAugE};
pub use merkle::{MerkleProof, MerkleUpdate, Prunable};
pub use primitives::{
    Any, Coins, Either, EitherRef, Grams, Int, Maybe, Ref, SignedCoins, Uint, Unary,
};
pub use tag::{FieldTag, Tag, expect_magic, match_tag, write_tag};
pub use text::{Bytes, FixedLengthText, SnakeData, Text};

use crate::cell::{Cell, CellBuilder, CellType, Slice, boc};
use crate::utils::{CodecConfig, LabelPolicy};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// A value that can be read from a cell slice
pub trait TlbDecode: Sized {
    /// Library cells are handed to the type as is instead of being resolved
    const KEEPS_LIBRARY_CELLS: bool = false;
    /// Pruned branch cells are handed to the type instead of failing
    const KEEPS_PRUNED_CELLS: bool = false;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self>;

    /// Decodes with an explicit `Nbits`/`Nbytes` width
    fn decode_tlb_bits(slice: &mut Slice, decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
        let _ = (slice, decoder);
        Err(TlbError::InvalidData(format!(
            "{} has no {bits}-bit form",
            std::any::type_name::<Self>()
        )))
    }

    /// Value for a `maybe` field whose presence bit is zero
    fn absent() -> Option<Self> {
        None
    }
}

/// A value that can be written into a cell builder
pub trait TlbEncode {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()>;

    fn encode_tlb_bits(
        &self,
        builder: &mut CellBuilder,
        encoder: &mut Encoder,
        bits: usize,
    ) -> TlbResult<()> {
        let _ = (builder, encoder);
        Err(TlbError::InvalidData(format!(
            "{} has no {bits}-bit form",
            std::any::type_name::<Self>()
        )))
    }

    /// False for values that a `maybe` field writes as a single zero bit
    fn is_present(&self) -> bool {
        true
    }

    /// Serializes the value into its own cell
    fn encode_as_ref(&self, encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        let mut builder = CellBuilder::new();
        self.encode_tlb(&mut builder, encoder)?;
        Ok(builder.build()?)
    }
}

/// Substitutes library cells with the cells they point at
pub trait LibraryResolver: Send + Sync {
    fn resolve(&self, hash: &[u8; 32]) -> Option<Arc<Cell>>;
}

impl<F> LibraryResolver for F
where
    F: Fn(&[u8; 32]) -> Option<Arc<Cell>> + Send + Sync,
{
    fn resolve(&self, hash: &[u8; 32]) -> Option<Arc<Cell>> {
        self(hash)
    }
}

/// Decoding context
#[derive(Default, Clone)]
pub struct Decoder {
    resolver: Option<Arc<dyn LibraryResolver>>,
    debug: bool,
    path: Vec<&'static str>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("resolver", &self.resolver.is_some())
            .field("debug", &self.debug)
            .field("path", &self.path)
            .finish()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new().with_debug_path(config.debug_path)
    }

    pub fn with_library_resolver(mut self, resolver: Arc<dyn LibraryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Wrap errors with the dotted path of the fields being decoded
    pub fn with_debug_path(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Decodes a whole cell
    pub fn decode<T: TlbDecode>(&mut self, cell: &Arc<Cell>) -> TlbResult<T> {
        let mut slice = self.open::<T>(cell)?;
        T::decode_tlb(&mut slice, self)
    }

    /// Decodes one schema field, applying its annotation
    pub fn decode_field<T: TlbDecode>(
        &mut self,
        slice: &mut Slice,
        name: &'static str,
        tag: Option<&str>,
    ) -> TlbResult<T> {
        if self.debug {
            self.path.push(name);
        }
        let result = self.decode_annotated::<T>(slice, tag);
        let result = match result {
            Err(err) if self.debug && !matches!(err, TlbError::Path { .. }) => {
                Err(TlbError::Path {
                    path: self.path.join("."),
                    source: Box::new(err),
                })
            }
            other => other,
        };
        if self.debug {
            self.path.pop();
        }
        result
    }

    fn decode_annotated<T: TlbDecode>(
        &mut self,
        slice: &mut Slice,
        tag: Option<&str>,
    ) -> TlbResult<T> {
        let field_tag = match tag {
            Some(tag) => FieldTag::parse(tag)?,
            None => FieldTag::default(),
        };

        if field_tag.maybe && !slice.load_bit()? {
            return T::absent().ok_or_else(|| {
                TlbError::InvalidData(format!(
                    "maybe field of type {} is absent",
                    std::any::type_name::<T>()
                ))
            });
        }

        if field_tag.reference {
            let cell = slice.load_reference()?;
            let mut inner = self.open::<T>(&cell)?;
            return self.decode_width(&mut inner, field_tag.bits);
        }
        self.decode_width(slice, field_tag.bits)
    }

    fn decode_width<T: TlbDecode>(&mut self, slice: &mut Slice, bits: Option<usize>) -> TlbResult<T> {
        match bits {
            Some(bits) => T::decode_tlb_bits(slice, self, bits),
            None => T::decode_tlb(slice, self),
        }
    }

    /// Opens a child cell for reading as `T`
    pub fn open<T: TlbDecode>(&mut self, cell: &Arc<Cell>) -> TlbResult<Slice> {
        match cell.cell_type() {
            CellType::Library if !T::KEEPS_LIBRARY_CELLS => {
                Ok(Slice::new(self.resolve_library(cell)?))
            }
            CellType::PrunedBranch if !T::KEEPS_PRUNED_CELLS => Err(TlbError::PrunedBranch {
                type_name: std::any::type_name::<T>(),
            }),
            _ => Ok(Slice::new(cell.clone())),
        }
    }

    fn resolve_library(&self, cell: &Arc<Cell>) -> TlbResult<Arc<Cell>> {
        let hash = cell
            .library_hash()
            .ok_or_else(|| TlbError::InvalidData("malformed library cell".to_string()))?;
        let hash_hex = hex::encode(hash);
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| TlbError::LibraryResolverMissing {
                hash: hash_hex.clone(),
            })?;
        let resolved = resolver
            .resolve(&hash)
            .ok_or_else(|| TlbError::LibraryNotFound {
                hash: hash_hex.clone(),
            })?;
        if resolved.hash() != hash {
            return Err(TlbError::InvalidData(format!(
                "library resolver returned cell {} for {hash_hex}",
                hex::encode(resolved.hash())
            )));
        }
        log::trace!("substituted library cell {hash_hex}");
        Ok(resolved)
    }
}

/// Encoding context
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    debug: bool,
    path: Vec<&'static str>,
    label_policy: LabelPolicy,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new()
            .with_debug_path(config.debug_path)
            .with_label_policy(config.label_policy)
    }

    pub fn with_debug_path(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_label_policy(mut self, label_policy: LabelPolicy) -> Self {
        self.label_policy = label_policy;
        self
    }

    pub fn label_policy(&self) -> LabelPolicy {
        self.label_policy
    }

    /// Encodes a value into a new cell
    pub fn encode<T: TlbEncode + ?Sized>(&mut self, value: &T) -> TlbResult<Arc<Cell>> {
        value.encode_as_ref(self)
    }

    /// Encodes one schema field, applying its annotation
    pub fn encode_field<T: TlbEncode + ?Sized>(
        &mut self,
        builder: &mut CellBuilder,
        name: &'static str,
        value: &T,
        tag: Option<&str>,
    ) -> TlbResult<()> {
        if self.debug {
            self.path.push(name);
        }
        let result = self.encode_annotated(builder, value, tag);
        let result = match result {
            Err(err) if self.debug && !matches!(err, TlbError::Path { .. }) => {
                Err(TlbError::Path {
                    path: self.path.join("."),
                    source: Box::new(err),
                })
            }
            other => other,
        };
        if self.debug {
            self.path.pop();
        }
        result
    }

    fn encode_annotated<T: TlbEncode + ?Sized>(
        &mut self,
        builder: &mut CellBuilder,
        value: &T,
        tag: Option<&str>,
    ) -> TlbResult<()> {
        let field_tag = match tag {
            Some(tag) => FieldTag::parse(tag)?,
            None => FieldTag::default(),
        };

        if field_tag.maybe {
            builder.store_bit(value.is_present())?;
            if !value.is_present() {
                return Ok(());
            }
        } else if !value.is_present() {
            return Err(TlbError::InvalidData(format!(
                "value of type {} is required",
                std::any::type_name::<T>()
            )));
        }

        if field_tag.reference {
            let cell = match field_tag.bits {
                Some(bits) => {
                    let mut child = CellBuilder::new();
                    value.encode_tlb_bits(&mut child, self, bits)?;
                    child.build()?
                }
                None => value.encode_as_ref(self)?,
            };
            builder.store_reference(cell)?;
            return Ok(());
        }

        match field_tag.bits {
            Some(bits) => value.encode_tlb_bits(builder, self, bits),
            None => value.encode_tlb(builder, self),
        }
    }
}

impl<T: TlbDecode> TlbDecode for Box<T> {
    const KEEPS_LIBRARY_CELLS: bool = T::KEEPS_LIBRARY_CELLS;
    const KEEPS_PRUNED_CELLS: bool = T::KEEPS_PRUNED_CELLS;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        T::decode_tlb(slice, decoder).map(Box::new)
    }

    fn decode_tlb_bits(slice: &mut Slice, decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
        T::decode_tlb_bits(slice, decoder, bits).map(Box::new)
    }
}

impl<T: TlbEncode + ?Sized> TlbEncode for Box<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        (**self).encode_tlb(builder, encoder)
    }

    fn encode_tlb_bits(
        &self,
        builder: &mut CellBuilder,
        encoder: &mut Encoder,
        bits: usize,
    ) -> TlbResult<()> {
        (**self).encode_tlb_bits(builder, encoder, bits)
    }

    fn is_present(&self) -> bool {
        (**self).is_present()
    }

    fn encode_as_ref(&self, encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        (**self).encode_as_ref(encoder)
    }
}

/// `Option<T>` is how `maybe` fields are spelled; `None` only encodes behind a presence bit
impl<T: TlbDecode> TlbDecode for Option<T> {
    const KEEPS_LIBRARY_CELLS: bool = T::KEEPS_LIBRARY_CELLS;
    const KEEPS_PRUNED_CELLS: bool = T::KEEPS_PRUNED_CELLS;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        T::decode_tlb(slice, decoder).map(Some)
    }

    fn decode_tlb_bits(slice: &mut Slice, decoder: &mut Decoder, bits: usize) -> TlbResult<Self> {
        T::decode_tlb_bits(slice, decoder, bits).map(Some)
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

impl<T: TlbEncode> TlbEncode for Option<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            Some(value) => value.encode_tlb(builder, encoder),
            None => Err(TlbError::InvalidData(
                "empty optional value outside a maybe field".to_string(),
            )),
        }
    }

    fn encode_tlb_bits(
        &self,
        builder: &mut CellBuilder,
        encoder: &mut Encoder,
        bits: usize,
    ) -> TlbResult<()> {
        match self {
            Some(value) => value.encode_tlb_bits(builder, encoder, bits),
            None => Err(TlbError::InvalidData(
                "empty optional value outside a maybe field".to_string(),
            )),
        }
    }

    fn is_present(&self) -> bool {
        self.is_some()
    }

    fn encode_as_ref(&self, encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        match self {
            Some(value) => value.encode_as_ref(encoder),
            None => Err(TlbError::InvalidData(
                "empty optional value outside a maybe field".to_string(),
            )),
        }
    }
}

/// A raw cell: taken as the rest of the slice when decoding inline, or the
/// referenced cell itself behind `^`
impl TlbDecode for Arc<Cell> {
    const KEEPS_LIBRARY_CELLS: bool = true;
    const KEEPS_PRUNED_CELLS: bool = true;

    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let cell = slice.to_cell()?;
        slice.skip_bits(slice.remaining_bits())?;
        slice.skip_refs(slice.remaining_refs())?;
        Ok(cell)
    }
}

impl TlbEncode for Arc<Cell> {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_cell(self)?;
        Ok(())
    }

    fn encode_as_ref(&self, _encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        Ok(self.clone())
    }
}

/// Decodes a cell with default settings
pub fn unmarshal<T: TlbDecode>(cell: &Arc<Cell>) -> TlbResult<T> {
    Decoder::new().decode(cell)
}

/// Encodes a value into a new cell with default settings
pub fn marshal<T: TlbEncode + ?Sized>(value: &T) -> TlbResult<Arc<Cell>> {
    Encoder::new().encode(value)
}

pub fn from_boc<T: TlbDecode>(boc: &[u8]) -> Result<T> {
    let cell = boc::deserialize_boc(boc)?;
    Ok(unmarshal(&cell)?)
}

pub fn from_boc_hex<T: TlbDecode>(hex_str: &str) -> Result<T> {
    let cell = boc::hex_to_boc(hex_str)?;
    Ok(unmarshal(&cell)?)
}

pub fn to_boc<T: TlbEncode + ?Sized>(value: &T, has_crc32: bool) -> Result<Vec<u8>> {
    let cell = marshal(value)?;
    boc::serialize_boc(&cell, has_crc32)
}

pub fn to_boc_hex<T: TlbEncode + ?Sized>(value: &T) -> Result<String> {
    let cell = marshal(value)?;
    boc::boc_to_hex(&cell, false)
}
