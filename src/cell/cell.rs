//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable:
//! the level mask, depth and representation hash are computed once, when the
//! cell is built.

use crate::cell::bits::BitString;
use crate::cell::error::{CellError, CellResult};
use crate::cell::slice::Slice;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Cell level range (0-3)
pub const MAX_CELL_LEVEL: u8 = 3;

/// Maximum depth of a cell tree
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Bit length of a level-1 pruned branch: tag, mask, one hash and one depth
pub const PRUNED_BRANCH_BITS: usize = 16 + 256 + 16;

/// Bit length of a library reference cell: tag and the library hash
pub const LIBRARY_CELL_BITS: usize = 8 + 256;

/// Kind of a cell. Everything except `Ordinary` is an exotic cell whose first
/// data byte carries the type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellType {
    #[default]
    Ordinary,
    PrunedBranch,
    Library,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    pub fn is_exotic(self) -> bool {
        self != Self::Ordinary
    }

    /// Maps the first data byte of an exotic cell to its type
    pub fn from_exotic_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::PrunedBranch),
            2 => Some(Self::Library),
            3 => Some(Self::MerkleProof),
            4 => Some(Self::MerkleUpdate),
            _ => None,
        }
    }

    pub fn exotic_tag(self) -> Option<u8> {
        match self {
            Self::Ordinary => None,
            Self::PrunedBranch => Some(1),
            Self::Library => Some(2),
            Self::MerkleProof => Some(3),
            Self::MerkleUpdate => Some(4),
        }
    }
}

/// Represents a cell in the TON blockchain
#[derive(Clone)]
pub struct Cell {
    /// Cell data as bytes, bits past `bit_len` are zero
    data: Vec<u8>,
    /// Number of bits in the cell (not necessarily a multiple of 8)
    bit_len: usize,
    /// References to other cells
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
    level_mask: u8,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    /// Creates a new empty ordinary cell
    pub fn new() -> Self {
        let mut cell = Self {
            data: Vec::new(),
            bit_len: 0,
            references: Vec::new(),
            cell_type: CellType::Ordinary,
            level_mask: 0,
            hash: [0u8; 32],
            depth: 0,
        };
        cell.hash = cell.compute_hash();
        cell
    }

    /// Creates an ordinary cell with the given data and bit length
    pub fn with_data(data: Vec<u8>, bit_len: usize) -> CellResult<Self> {
        Self::from_parts(CellType::Ordinary, data, bit_len, Vec::new())
    }

    /// Creates a cell of any type, validating exotic layouts and computing
    /// the level mask, depth and hash.
    pub fn from_parts(
        cell_type: CellType,
        mut data: Vec<u8>,
        bit_len: usize,
        references: Vec<Arc<Cell>>,
    ) -> CellResult<Self> {
        if bit_len > MAX_CELL_BITS {
            return Err(CellError::BitsOverflow {
                requested: bit_len,
                available: MAX_CELL_BITS,
            });
        }
        if references.len() > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow { max: MAX_CELL_REFS });
        }

        let required_bytes = bit_len.div_ceil(8);
        if data.len() < required_bytes {
            return Err(CellError::InvalidData(format!(
                "data length {} is insufficient for {} bits",
                data.len(),
                bit_len
            )));
        }
        data.truncate(required_bytes);
        if bit_len % 8 != 0 {
            data[required_bytes - 1] &= 0xFF << (8 - bit_len % 8);
        }

        let level_mask = compute_level_mask(cell_type, &data, bit_len, &references)?;
        let depth = references
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0);
        if depth > MAX_CELL_DEPTH {
            return Err(CellError::InvalidData(format!(
                "cell depth {depth} exceeds maximum {MAX_CELL_DEPTH}"
            )));
        }

        let mut cell = Self {
            data,
            bit_len,
            references,
            cell_type,
            level_mask,
            hash: [0u8; 32],
            depth,
        };
        cell.hash = cell.compute_hash();
        Ok(cell)
    }

    /// Creates a library reference cell pointing at the library with `hash`
    pub fn library(hash: &[u8; 32]) -> CellResult<Arc<Cell>> {
        let mut data = Vec::with_capacity(33);
        data.push(2);
        data.extend_from_slice(hash);
        Ok(Arc::new(Self::from_parts(
            CellType::Library,
            data,
            LIBRARY_CELL_BITS,
            Vec::new(),
        )?))
    }

    /// Replaces a level-0 cell by a level-1 pruned branch that keeps only its
    /// hash and depth.
    pub fn pruned_branch(cell: &Cell) -> CellResult<Arc<Cell>> {
        if cell.level_mask != 0 {
            return Err(CellError::InvalidExotic(
                "only level 0 cells can be pruned".to_string(),
            ));
        }
        let mut data = Vec::with_capacity(36);
        data.push(1);
        data.push(1);
        data.extend_from_slice(&cell.hash);
        data.extend_from_slice(&cell.depth.to_be_bytes());
        Ok(Arc::new(Self::from_parts(
            CellType::PrunedBranch,
            data,
            PRUNED_BRANCH_BITS,
            Vec::new(),
        )?))
    }

    /// Returns the cell's data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Copies the cell data into a [`BitString`]
    pub fn bit_string(&self) -> BitString {
        BitString::from_bits(&self.data, self.bit_len).unwrap_or_default()
    }

    /// Returns the cell's references
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    /// Returns the number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&Arc<Cell>> {
        self.references.get(index)
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Returns whether this is an exotic cell
    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn level_mask(&self) -> u8 {
        self.level_mask
    }

    /// Returns the cell's level
    pub fn level(&self) -> u8 {
        (u8::BITS - self.level_mask.leading_zeros()) as u8
    }

    /// Returns the depth of the cell tree below this cell
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Returns the representation hash of the cell
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    /// Library hash stored in a library cell, `None` for other cell types
    pub fn library_hash(&self) -> Option<[u8; 32]> {
        if self.cell_type != CellType::Library {
            return None;
        }
        self.data[1..33].try_into().ok()
    }

    /// Opens a slice over this cell
    pub fn as_slice(self: &Arc<Self>) -> Slice {
        Slice::new(self.clone())
    }

    /// Computes the cell's descriptors (2 bytes)
    pub fn descriptors(&self) -> [u8; 2] {
        // First byte: r + 8*s + 32*l
        // r = number of references (0-4)
        // s = exotic flag (0 or 1)
        // l = level mask (0-7)
        let refs_descriptor = self.references.len() as u8
            + if self.is_exotic() { 8 } else { 0 }
            + self.level_mask * 32;

        // Second byte: floor(b/8) + ceil(b/8)
        let bits_descriptor = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;

        [refs_descriptor, bits_descriptor]
    }

    /// Serializes the cell data with the completion tag if needed
    pub fn serialize_data(&self) -> Vec<u8> {
        let mut result = self.data.clone();

        // If we have incomplete byte, add padding bit
        if self.bit_len % 8 != 0 {
            let last_byte_idx = self.bit_len / 8;
            let bits_in_last_byte = self.bit_len % 8;
            result[last_byte_idx] |= 1 << (7 - bits_in_last_byte);
        }

        result
    }

    fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // 1. Add descriptors
        hasher.update(self.descriptors());

        // 2. Add serialized cell data
        hasher.update(self.serialize_data());

        // 3. Add depth of each reference (2 bytes each)
        for reference in &self.references {
            hasher.update(reference.depth().to_be_bytes());
        }

        // 4. Add hash of each reference
        for reference in &self.references {
            hasher.update(reference.hash());
        }

        hasher.finalize().into()
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = match self.cell_type {
            CellType::Ordinary => "",
            _ => "*",
        };
        writeln!(
            f,
            "{:indent$}{prefix}x{{{}}}",
            "",
            self.bit_string().to_fift_hex(),
            indent = indent
        )?;
        for reference in &self.references {
            reference.fmt_tree(f, indent + 1)?;
        }
        Ok(())
    }
}

fn compute_level_mask(
    cell_type: CellType,
    data: &[u8],
    bit_len: usize,
    references: &[Arc<Cell>],
) -> CellResult<u8> {
    let children_mask = references.iter().fold(0u8, |acc, r| acc | r.level_mask());

    if let Some(tag) = cell_type.exotic_tag() {
        if bit_len < 8 || data[0] != tag {
            return Err(CellError::InvalidExotic(format!(
                "{cell_type:?} cell must start with tag {tag}"
            )));
        }
    }

    match cell_type {
        CellType::Ordinary => Ok(children_mask),
        CellType::PrunedBranch => {
            if !references.is_empty() {
                return Err(CellError::InvalidExotic(
                    "pruned branch cannot have references".to_string(),
                ));
            }
            if bit_len < 16 {
                return Err(CellError::InvalidExotic(
                    "pruned branch is too short".to_string(),
                ));
            }
            let mask = data[1];
            if mask == 0 || mask > 7 {
                return Err(CellError::InvalidExotic(format!(
                    "invalid pruned branch level mask {mask}"
                )));
            }
            let expected = 16 + mask.count_ones() as usize * (256 + 16);
            if bit_len != expected {
                return Err(CellError::InvalidExotic(format!(
                    "pruned branch must have {expected} bits, got {bit_len}"
                )));
            }
            Ok(mask)
        }
        CellType::Library => {
            if bit_len != LIBRARY_CELL_BITS || !references.is_empty() {
                return Err(CellError::InvalidExotic(
                    "library cell must hold exactly a 256-bit hash".to_string(),
                ));
            }
            Ok(0)
        }
        CellType::MerkleProof => {
            if references.len() != 1 || bit_len != 8 + 256 + 16 {
                return Err(CellError::InvalidExotic(
                    "merkle proof must have one reference and 280 bits".to_string(),
                ));
            }
            Ok(children_mask >> 1)
        }
        CellType::MerkleUpdate => {
            if references.len() != 2 || bit_len != 8 + 2 * (256 + 16) {
                return Err(CellError::InvalidExotic(
                    "merkle update must have two references and 552 bits".to_string(),
                ));
            }
            Ok(children_mask >> 1)
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("type", &self.cell_type)
            .field("bits", &self.bit_string())
            .field("references", &self.references)
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Low-level builder for constructing cells
///
/// # Example
///
/// ```rust
/// use tonutils_tlb::cell::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// builder.store_byte(0xFF).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 40);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
    cell_type: CellType,
}

impl CellBuilder {
    /// Creates a new cell builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bits stored so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    pub fn bits_available(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn refs_available(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Marks the cell being built as exotic. The data must start with the
    /// matching type tag when the cell is built.
    pub fn set_cell_type(&mut self, cell_type: CellType) -> &mut Self {
        self.cell_type = cell_type;
        self
    }

    /// Stores bits from a byte slice
    pub fn store_bits(&mut self, bits: &[u8], bit_len: usize) -> CellResult<&mut Self> {
        if bit_len > self.bits_available() {
            return Err(CellError::BitsOverflow {
                requested: bit_len,
                available: self.bits_available(),
            });
        }

        let required_bytes = bit_len.div_ceil(8);
        if bits.len() < required_bytes {
            return Err(CellError::NotEnoughBits {
                requested: bit_len,
                available: bits.len() * 8,
            });
        }

        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(&bits[..required_bytes]);
            self.bit_len += bit_len;
            if bit_len % 8 != 0 {
                let last = self.data.len() - 1;
                self.data[last] &= 0xFF << (8 - bit_len % 8);
            }
            return Ok(self);
        }

        for i in 0..bit_len {
            let bit = (bits[i / 8] >> (7 - (i % 8))) & 1;

            let target_byte_idx = self.bit_len / 8;
            if target_byte_idx >= self.data.len() {
                self.data.push(0);
            }
            if bit == 1 {
                self.data[target_byte_idx] |= 1 << (7 - (self.bit_len % 8));
            }
            self.bit_len += 1;
        }

        Ok(self)
    }

    pub fn store_bit_string(&mut self, bits: &BitString) -> CellResult<&mut Self> {
        self.store_bits(bits.as_bytes(), bits.len())
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        self.store_bits(&[if bit { 0x80 } else { 0x00 }], 1)
    }

    /// Stores a byte
    pub fn store_byte(&mut self, byte: u8) -> CellResult<&mut Self> {
        self.store_bits(&[byte], 8)
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 16)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 32)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_bits(&value.to_be_bytes(), 64)
    }

    /// Stores the least significant `bits` of the value in big-endian bit order.
    /// Fails if the value does not fit.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(CellError::IntOverflow { bits });
        }
        if bits == 0 {
            return Ok(self);
        }
        let shifted = value << (64 - bits);
        self.store_bits(&shifted.to_be_bytes(), bits)
    }

    /// Stores a two's complement signed integer. Fails if the value does not fit.
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 {
            return Err(CellError::IntOverflow { bits });
        }
        if bits == 0 {
            return if value == 0 {
                Ok(self)
            } else {
                Err(CellError::IntOverflow { bits })
            };
        }
        if bits < 64 {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(CellError::IntOverflow { bits });
            }
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint(value as u64 & mask, bits)
    }

    /// Stores `n` in unary: `n` one bits followed by a zero
    pub fn store_unary(&mut self, n: usize) -> CellResult<&mut Self> {
        for _ in 0..n {
            self.store_bit(true)?;
        }
        self.store_bit(false)
    }

    /// Adds a reference to another cell
    pub fn store_reference(&mut self, cell: Arc<Cell>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::RefsOverflow { max: MAX_CELL_REFS });
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Stores the contents of another cell
    pub fn store_cell(&mut self, cell: &Cell) -> CellResult<&mut Self> {
        if self.references.len() + cell.reference_count() > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow { max: MAX_CELL_REFS });
        }
        self.store_bits(cell.data(), cell.bit_len())?;
        for reference in cell.references() {
            self.store_reference(reference.clone())?;
        }
        Ok(self)
    }

    /// Stores the unread bits and references of a slice
    pub fn store_slice(&mut self, slice: &Slice) -> CellResult<&mut Self> {
        if self.references.len() + slice.remaining_refs() > MAX_CELL_REFS {
            return Err(CellError::RefsOverflow { max: MAX_CELL_REFS });
        }
        let mut rest = slice.clone();
        let bits = rest.load_bit_string(rest.remaining_bits())?;
        self.store_bit_string(&bits)?;
        for reference in rest.load_remaining_refs()? {
            self.store_reference(reference)?;
        }
        Ok(self)
    }

    /// Builds the cell
    pub fn build(self) -> CellResult<Arc<Cell>> {
        Ok(Arc::new(Cell::from_parts(
            self.cell_type,
            self.data,
            self.bit_len,
            self.references,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell() {
        let cell = Cell::new();
        assert_eq!(cell.bit_len(), 0);
        assert_eq!(cell.reference_count(), 0);
        assert_eq!(cell.level(), 0);
        assert!(!cell.is_exotic());
        assert_eq!(
            hex::encode(cell.hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn test_cell_with_data() {
        let data = vec![0x0F];
        let cell = Cell::with_data(data, 8).unwrap();
        assert_eq!(cell.bit_len(), 8);
        assert_eq!(cell.data()[0], 0x0F);
    }

    #[test]
    fn test_cell_builder() {
        let mut builder = CellBuilder::new();
        builder.store_byte(0xFF).unwrap();
        builder.store_u32(0x12345678).unwrap();
        builder.store_uint(5, 3).unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 43);
        assert_eq!(cell.bit_string().to_fift_hex(), "FF12345678B_");
    }

    #[test]
    fn test_cell_hash() {
        let cell = Cell::with_data(vec![0x00, 0x00, 0x00, 0x0F], 32).unwrap();
        let expected =
            hex::decode("57b520dbcb9d135863fc33963cde9f6db2ded1430d88056810a2c9434a3860f9")
                .unwrap();
        assert_eq!(&cell.hash()[..], &expected[..]);
    }

    #[test]
    fn test_store_int_range() {
        let mut builder = CellBuilder::new();
        builder.store_int(-1, 8).unwrap();
        builder.store_int(127, 8).unwrap();
        assert!(builder.store_int(128, 8).is_err());
        assert!(builder.store_uint(256, 8).is_err());
        assert_eq!(builder.bit_len(), 16);
        assert_eq!(builder.build().unwrap().data(), &[0xFF, 0x7F]);
    }

    #[test]
    fn test_builder_overflow() {
        let mut builder = CellBuilder::new();
        builder.store_bits(&[0u8; 128], 1023).unwrap();
        assert!(matches!(
            builder.store_bit(true),
            Err(CellError::BitsOverflow { .. })
        ));
        for _ in 0..4 {
            builder.store_reference(Arc::new(Cell::new())).unwrap();
        }
        assert!(builder.store_reference(Arc::new(Cell::new())).is_err());
    }

    #[test]
    fn test_pruned_branch_keeps_level() {
        let mut builder = CellBuilder::new();
        builder.store_u32(42).unwrap();
        let leaf = builder.build().unwrap();

        let pruned = Cell::pruned_branch(&leaf).unwrap();
        assert_eq!(pruned.cell_type(), CellType::PrunedBranch);
        assert_eq!(pruned.level_mask(), 1);
        assert_eq!(pruned.bit_len(), PRUNED_BRANCH_BITS);

        let mut parent = CellBuilder::new();
        parent.store_reference(pruned).unwrap();
        let parent = parent.build().unwrap();
        assert_eq!(parent.level_mask(), 1);
        assert_eq!(parent.level(), 1);
    }

    #[test]
    fn test_library_cell() {
        let hash = [7u8; 32];
        let library = Cell::library(&hash).unwrap();
        assert!(library.is_exotic());
        assert_eq!(library.library_hash(), Some(hash));
        assert_eq!(library.level_mask(), 0);

        let mut bad = CellBuilder::new();
        bad.set_cell_type(CellType::Library);
        bad.store_byte(2).unwrap();
        assert!(matches!(bad.build(), Err(CellError::InvalidExotic(_))));
    }
}
