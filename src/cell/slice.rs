//! Slice implementation for reading data from cells
//!
//! A Slice provides a way to read data from a Cell sequentially,
//! tracking the current position in both bits and references.

use crate::cell::bits::{BitString, bits_for};
use crate::cell::cell::{Cell, CellBuilder};
use crate::cell::error::{CellError, CellResult};
use std::sync::Arc;

/// A slice for reading data from a cell
#[derive(Debug, Clone)]
pub struct Slice {
    /// The cell being read
    cell: Arc<Cell>,
    /// Current bit position in the cell
    bit_pos: usize,
    /// Current reference position
    ref_pos: usize,
}

impl Slice {
    /// Creates a new slice from a cell
    pub fn new(cell: Arc<Cell>) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// Returns the number of remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len().saturating_sub(self.bit_pos)
    }

    /// Returns the number of remaining references
    pub fn remaining_refs(&self) -> usize {
        self.cell.reference_count().saturating_sub(self.ref_pos)
    }

    /// Checks if there is nothing left to read
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn ensure_bits(&self, n: usize) -> CellResult<()> {
        if n > self.remaining_bits() {
            return Err(CellError::NotEnoughBits {
                requested: n,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn bit_at(&self, pos: usize) -> bool {
        (self.cell.data()[pos / 8] >> (7 - (pos % 8))) & 1 == 1
    }

    /// Loads a single bit
    pub fn load_bit(&mut self) -> CellResult<bool> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Loads multiple bits into a byte vector, left aligned
    pub fn load_bits(&mut self, n: usize) -> CellResult<Vec<u8>> {
        Ok(self.load_bit_string(n)?.into_bytes())
    }

    pub fn load_bit_string(&mut self, n: usize) -> CellResult<BitString> {
        self.ensure_bits(n)?;
        let bits = if self.bit_pos % 8 == 0 {
            let start = self.bit_pos / 8;
            BitString::from_bits(&self.cell.data()[start..], n)?
        } else {
            (self.bit_pos..self.bit_pos + n)
                .map(|pos| self.bit_at(pos))
                .collect()
        };
        self.bit_pos += n;
        Ok(bits)
    }

    /// Reads `n` bits without advancing
    pub fn preload_bit_string(&self, n: usize) -> CellResult<BitString> {
        self.clone().load_bit_string(n)
    }

    /// Loads a byte (8 bits)
    pub fn load_byte(&mut self) -> CellResult<u8> {
        Ok(self.load_uint(8)? as u8)
    }

    /// Loads multiple bytes
    pub fn load_bytes(&mut self, n: usize) -> CellResult<Vec<u8>> {
        self.load_bits(n * 8)
    }

    /// Loads a u16 value (16 bits, big-endian)
    pub fn load_u16(&mut self) -> CellResult<u16> {
        Ok(self.load_uint(16)? as u16)
    }

    /// Loads a u32 value (32 bits, big-endian)
    pub fn load_u32(&mut self) -> CellResult<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    /// Loads a u64 value (64 bits, big-endian)
    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    /// Loads a uint with a specific number of bits
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        let value = self.preload_uint(bits)?;
        self.bit_pos += bits;
        Ok(value)
    }

    /// Reads a uint without advancing
    pub fn preload_uint(&self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::IntOverflow { bits });
        }
        self.ensure_bits(bits)?;
        let mut result = 0u64;
        for pos in self.bit_pos..self.bit_pos + bits {
            result = (result << 1) | self.bit_at(pos) as u64;
        }
        Ok(result)
    }

    /// Loads a signed integer with a specific number of bits
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        if bits == 0 {
            return Ok(0);
        }

        let unsigned = self.load_uint(bits)?;
        if bits == 64 {
            return Ok(unsigned as i64);
        }

        // Check if the sign bit is set
        let sign_bit = 1u64 << (bits - 1);
        if unsigned & sign_bit != 0 {
            let mask = !0u64 << bits;
            Ok((unsigned | mask) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Loads a unary number: one bits terminated by a zero
    pub fn load_unary(&mut self) -> CellResult<usize> {
        let mut n = 0;
        while self.load_bit()? {
            n += 1;
        }
        Ok(n)
    }

    /// Loads a `#<= max` value, failing if it exceeds `max`
    pub fn load_lim_uint(&mut self, max: u64) -> CellResult<u64> {
        let value = self.load_uint(bits_for(max))?;
        if value > max {
            return Err(CellError::InvalidData(format!(
                "value {value} exceeds upper bound {max}"
            )));
        }
        Ok(value)
    }

    /// Loads a reference to another cell
    pub fn load_reference(&mut self) -> CellResult<Arc<Cell>> {
        let reference = self.preload_reference(0)?;
        self.ref_pos += 1;
        Ok(reference)
    }

    /// Preloads a reference without advancing the position
    pub fn preload_reference(&self, index: usize) -> CellResult<Arc<Cell>> {
        self.cell
            .reference(self.ref_pos + index)
            .cloned()
            .ok_or(CellError::NotEnoughRefs {
                requested: index + 1,
                available: self.remaining_refs(),
            })
    }

    /// Skips a number of bits
    pub fn skip_bits(&mut self, n: usize) -> CellResult<()> {
        self.ensure_bits(n)?;
        self.bit_pos += n;
        Ok(())
    }

    /// Skips a number of references
    pub fn skip_refs(&mut self, n: usize) -> CellResult<()> {
        if n > self.remaining_refs() {
            return Err(CellError::NotEnoughRefs {
                requested: n,
                available: self.remaining_refs(),
            });
        }
        self.ref_pos += n;
        Ok(())
    }

    /// Gets the underlying cell
    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    /// Gets the current bit position
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Gets the current reference position
    pub fn ref_position(&self) -> usize {
        self.ref_pos
    }

    /// Loads all remaining bits
    pub fn load_remaining_bits(&mut self) -> CellResult<BitString> {
        self.load_bit_string(self.remaining_bits())
    }

    /// Loads all remaining references
    pub fn load_remaining_refs(&mut self) -> CellResult<Vec<Arc<Cell>>> {
        let mut refs = Vec::with_capacity(self.remaining_refs());
        while self.remaining_refs() > 0 {
            refs.push(self.load_reference()?);
        }
        Ok(refs)
    }

    /// Returns the unread part as a cell. An untouched slice yields the
    /// original cell, so exotic cells survive the round trip.
    pub fn to_cell(&self) -> CellResult<Arc<Cell>> {
        if self.bit_pos == 0 && self.ref_pos == 0 {
            return Ok(self.cell.clone());
        }
        let mut builder = CellBuilder::new();
        builder.store_slice(self)?;
        builder.build()
    }

    /// Checks if a specific number of bits can be read
    pub fn can_read_bits(&self, n: usize) -> bool {
        n <= self.remaining_bits()
    }

    /// Checks if a specific number of references can be read
    pub fn can_read_refs(&self, n: usize) -> bool {
        n <= self.remaining_refs()
    }
}

impl From<Arc<Cell>> for Slice {
    fn from(cell: Arc<Cell>) -> Self {
        Self::new(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_load_bits() {
        let mut builder = CellBuilder::new();
        builder.store_byte(0xFF).unwrap();
        builder.store_byte(0x00).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = Slice::new(cell);
        assert_eq!(slice.remaining_bits(), 16);
        assert_eq!(slice.load_byte().unwrap(), 0xFF);
        assert_eq!(slice.remaining_bits(), 8);
        assert_eq!(slice.load_byte().unwrap(), 0x00);
        assert_eq!(slice.remaining_bits(), 0);
        assert!(matches!(
            slice.load_bit(),
            Err(CellError::NotEnoughBits { .. })
        ));
    }

    #[test]
    fn test_slice_unaligned_reads() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b101, 3).unwrap();
        builder.store_u32(0x12345678).unwrap();
        builder.store_int(-3, 5).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = Slice::new(cell);
        assert_eq!(slice.preload_uint(3).unwrap(), 0b101);
        assert_eq!(slice.load_uint(3).unwrap(), 0b101);
        assert_eq!(slice.load_u32().unwrap(), 0x12345678);
        assert_eq!(slice.load_int(5).unwrap(), -3);
    }

    #[test]
    fn test_slice_load_reference() {
        let ref_cell = CellBuilder::new().build().unwrap();

        let mut builder = CellBuilder::new();
        builder.store_reference(ref_cell.clone()).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = Slice::new(cell);
        assert_eq!(slice.remaining_refs(), 1);
        let loaded = slice.load_reference().unwrap();
        assert_eq!(loaded.hash(), ref_cell.hash());
        assert_eq!(slice.remaining_refs(), 0);
        assert!(slice.load_reference().is_err());
    }

    #[test]
    fn test_slice_unary_and_lim_uint() {
        let mut builder = CellBuilder::new();
        builder.store_unary(3).unwrap();
        builder.store_uint(20, 5).unwrap();
        builder.store_uint(31, 5).unwrap();
        let mut slice = Slice::new(builder.build().unwrap());
        assert_eq!(slice.load_unary().unwrap(), 3);
        assert_eq!(slice.load_lim_uint(30).unwrap(), 20);
        assert!(slice.load_lim_uint(30).is_err());
    }

    #[test]
    fn test_slice_to_cell() {
        let mut builder = CellBuilder::new();
        builder.store_u32(0xAABBCCDD).unwrap();
        builder.store_reference(Arc::new(Cell::new())).unwrap();
        let cell = builder.build().unwrap();

        let slice = Slice::new(cell.clone());
        assert!(Arc::ptr_eq(&slice.to_cell().unwrap(), &cell));

        let mut slice = Slice::new(cell);
        slice.skip_bits(8).unwrap();
        let rest = slice.to_cell().unwrap();
        assert_eq!(rest.bit_len(), 24);
        assert_eq!(rest.reference_count(), 1);
        assert_eq!(rest.data(), &[0xBB, 0xCC, 0xDD]);
    }
}
