//! Tag micro-language
//!
//! Constructor tags come in two spellings: `name$0101` with the bits written
//! out in binary, and `name#1a2b` with four bits per hex digit. `$_` and `#_`
//! mean an empty tag. Field annotations (`maybe`, `^`, `256bits`, `8bytes`)
//! are parsed into a [`FieldTag`].

use crate::cell::{CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};

/// A constructor prefix: `len` bits holding `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tag {
    pub len: usize,
    pub value: u64,
}

impl Tag {
    pub const fn new(len: usize, value: u64) -> Self {
        Self { len, value }
    }

    pub fn parse(s: &str) -> TlbResult<Self> {
        let invalid = || TlbError::InvalidTag { tag: s.to_string() };

        let (digits, radix, bits_per_digit) = if let Some((_, digits)) = s.split_once('$') {
            (digits, 2, 1)
        } else if let Some((_, digits)) = s.split_once('#') {
            (digits, 16, 4)
        } else {
            return Err(invalid());
        };

        if digits == "_" {
            return Ok(Self::default());
        }
        if digits.is_empty() {
            return Err(invalid());
        }

        let len = digits.len() * bits_per_digit;
        if len > 64 {
            return Err(invalid());
        }
        let value = u64::from_str_radix(digits, radix).map_err(|_| invalid())?;
        Ok(Self { len, value })
    }

    /// Peeks the next `len` bits. Running out of bits is not an error here,
    /// it just means this constructor does not match.
    pub fn matches(&self, slice: &Slice) -> bool {
        if self.len == 0 {
            return true;
        }
        match slice.preload_uint(self.len) {
            Ok(value) => value == self.value,
            Err(_) => false,
        }
    }

    pub fn store(&self, builder: &mut CellBuilder) -> TlbResult<()> {
        if self.len > 0 {
            builder.store_uint(self.value, self.len)?;
        }
        Ok(())
    }

    pub fn to_tag_string(&self) -> String {
        if self.len == 0 {
            return "$_".to_string();
        }
        if self.len % 4 == 0 {
            format!("#{:0width$x}", self.value, width = self.len / 4)
        } else {
            format!("${:0width$b}", self.value, width = self.len)
        }
    }
}

/// Consumes the tag if the slice starts with it, leaving the slice untouched otherwise
pub fn match_tag(slice: &mut Slice, tag: &str) -> TlbResult<bool> {
    let tag = Tag::parse(tag)?;
    if !tag.matches(slice) {
        return Ok(false);
    }
    slice.skip_bits(tag.len)?;
    Ok(true)
}

pub fn write_tag(builder: &mut CellBuilder, tag: &str) -> TlbResult<()> {
    Tag::parse(tag)?.store(builder)
}

/// Like [`match_tag`] but a mismatch is an error
pub fn expect_magic(slice: &mut Slice, tag: &str) -> TlbResult<()> {
    let parsed = Tag::parse(tag)?;
    if parsed.matches(slice) {
        slice.skip_bits(parsed.len)?;
        return Ok(());
    }
    let found = slice
        .preload_uint(parsed.len.min(slice.remaining_bits()))
        .unwrap_or_default();
    Err(TlbError::MagicMismatch {
        expected: tag.to_string(),
        found,
    })
}

/// Parsed field annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldTag {
    /// Preceded by a presence bit
    pub maybe: bool,
    /// Stored in the next child cell
    pub reference: bool,
    /// Explicit width in bits
    pub bits: Option<usize>,
}

impl FieldTag {
    pub fn parse(s: &str) -> TlbResult<Self> {
        let invalid = || TlbError::InvalidTag { tag: s.to_string() };
        let mut tag = Self::default();
        let mut rest = s.trim();

        if let Some(tail) = rest.strip_prefix("maybe") {
            tag.maybe = true;
            rest = tail.trim_start();
        }
        if let Some(tail) = rest.strip_prefix('^') {
            tag.reference = true;
            rest = tail.trim_start();
        }
        if rest.is_empty() {
            return Ok(tag);
        }

        let (count, scale) = if let Some(count) = rest.strip_suffix("bits") {
            (count, 1)
        } else if let Some(count) = rest.strip_suffix("bytes") {
            (count, 8)
        } else {
            return Err(invalid());
        };
        let count: usize = count.trim().parse().map_err(|_| invalid())?;
        tag.bits = Some(count * scale);
        Ok(tag)
    }
}
