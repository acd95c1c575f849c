//! Owned bit sequences
//!
//! [`BitString`] is used for dictionary keys and labels, external addresses and
//! any other field whose width is not a multiple of eight bits.

use crate::cell::error::{CellError, CellResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Number of bits needed to store any value in `0..=max` (TL-B `#<= max`).
pub fn bits_for(max: u64) -> usize {
    (u64::BITS - max.leading_zeros()) as usize
}

/// A growable, big-endian sequence of bits.
///
/// Bits past `len()` in the last byte are always zero, so two equal bit
/// strings always have equal byte buffers.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString {
    data: Vec<u8>,
    bit_len: usize,
}

impl BitString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            data: Vec::with_capacity(bits.div_ceil(8)),
            bit_len: 0,
        }
    }

    /// Creates a bit string holding every bit of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            bit_len: bytes.len() * 8,
        }
    }

    /// Creates a bit string from the first `bit_len` bits of `data`
    pub fn from_bits(data: &[u8], bit_len: usize) -> CellResult<Self> {
        let required = bit_len.div_ceil(8);
        if data.len() < required {
            return Err(CellError::NotEnoughBits {
                requested: bit_len,
                available: data.len() * 8,
            });
        }
        let mut data = data[..required].to_vec();
        if bit_len % 8 != 0 {
            data[required - 1] &= 0xFF << (8 - bit_len % 8);
        }
        Ok(Self { data, bit_len })
    }

    /// Creates `len` copies of `bit`
    pub fn repeat(bit: bool, len: usize) -> Self {
        let mut bits = Self::with_capacity(len);
        for _ in 0..len {
            bits.push(bit);
        }
        bits
    }

    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Returns the underlying bytes, zero padded to a byte boundary
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        Some(self.data[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    pub fn push(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn pop(&mut self) -> Option<bool> {
        if self.bit_len == 0 {
            return None;
        }
        self.bit_len -= 1;
        let index = self.bit_len / 8;
        let mask = 0x80 >> (self.bit_len % 8);
        let bit = self.data[index] & mask != 0;
        self.data[index] &= !mask;
        if self.bit_len % 8 == 0 {
            self.data.pop();
        }
        Some(bit)
    }

    /// Appends the lowest `bits` bits of `value`, most significant first
    pub fn push_uint(&mut self, value: u64, bits: usize) {
        for i in (0..bits.min(64)).rev() {
            self.push((value >> i) & 1 == 1);
        }
    }

    pub fn extend_from(&mut self, other: &BitString) {
        if self.bit_len % 8 == 0 {
            self.data.extend_from_slice(&other.data);
            self.bit_len += other.bit_len;
            return;
        }
        for bit in other.iter() {
            self.push(bit);
        }
    }

    /// Copies bits `start..end` into a new bit string
    pub fn slice(&self, start: usize, end: usize) -> BitString {
        let end = end.min(self.bit_len);
        let mut out = BitString::with_capacity(end.saturating_sub(start));
        for i in start..end {
            out.push(self.data[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len).map(move |i| self.data[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Length of the common prefix of `self` and `other`, starting at bit `from`
    pub fn common_prefix_len(&self, other: &BitString, from: usize) -> usize {
        let end = self.bit_len.min(other.bit_len);
        let mut len = 0;
        for i in from..end {
            if self.get(i) != other.get(i) {
                break;
            }
            len += 1;
        }
        len
    }

    /// Returns the repeated bit if every bit is the same, `None` for mixed or empty strings
    pub fn uniform_bit(&self) -> Option<bool> {
        let first = self.get(0)?;
        self.iter().all(|bit| bit == first).then_some(first)
    }

    pub fn to_binary_string(&self) -> String {
        self.iter().map(|bit| if bit { '1' } else { '0' }).collect()
    }

    /// Renders the bits in Fift notation: hex digits, with a `_` completion
    /// tag when the length is not a multiple of four.
    pub fn to_fift_hex(&self) -> String {
        let tagged = self.bit_len % 4 != 0;
        let mut padded = self.clone();
        if tagged {
            padded.push(true);
            while padded.bit_len % 4 != 0 {
                padded.push(false);
            }
        }
        let mut out = hex::encode_upper(&padded.data);
        out.truncate(padded.bit_len / 4);
        if tagged {
            out.push('_');
        }
        out
    }

    pub fn from_fift_hex(s: &str) -> CellResult<Self> {
        let (digits, tagged) = match s.strip_suffix('_') {
            Some(digits) => (digits, true),
            None => (s, false),
        };
        let mut bits = BitString::with_capacity(digits.len() * 4);
        for c in digits.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| CellError::InvalidData(format!("invalid fift hex digit {c:?}")))?;
            bits.push_uint(nibble as u64, 4);
        }
        if tagged {
            while let Some(bit) = bits.pop() {
                if bit {
                    break;
                }
            }
        }
        Ok(bits)
    }
}

impl Ord for BitString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data
            .cmp(&other.data)
            .then(self.bit_len.cmp(&other.bit_len))
    }
}

impl PartialOrd for BitString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{{{}}}", self.to_fift_hex())
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fift_hex())
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bits = BitString::new();
        for bit in iter {
            bits.push(bit);
        }
        bits
    }
}

impl Serialize for BitString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_fift_hex())
    }
}

impl<'de> Deserialize<'de> for BitString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BitString::from_fift_hex(&s).map_err(serde::de::Error::custom)
    }
}
