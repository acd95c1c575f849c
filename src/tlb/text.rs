//! Snake-encoded data: bit strings too long for one cell continue in the
//! first reference of each cell

use crate::cell::{BitString, CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ```text
/// tail#_ {bn:#} b:(bits bn) = SnakeData ~0;
/// cons#_ {bn:#} {n:#} b:(bits bn) next:^(SnakeData ~n) = SnakeData ~(n + 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnakeData(pub BitString);

impl SnakeData {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        SnakeData(BitString::from_bytes(bytes))
    }

    /// The data as bytes, failing on a partial trailing byte
    pub fn to_bytes(&self) -> TlbResult<Vec<u8>> {
        if self.0.len() % 8 != 0 {
            return Err(TlbError::InvalidData(format!(
                "snake data of {} bits is not a whole number of bytes",
                self.0.len()
            )));
        }
        Ok(self.0.as_bytes().to_vec())
    }
}

impl TlbDecode for SnakeData {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let mut bits = slice.load_remaining_bits()?;
        let mut next = if slice.remaining_refs() > 0 {
            Some(slice.load_reference()?)
        } else {
            None
        };
        while let Some(cell) = next.take() {
            let mut chunk = decoder.open::<SnakeData>(&cell)?;
            bits.extend_from(&chunk.load_remaining_bits()?);
            if chunk.remaining_refs() > 0 {
                next = Some(chunk.load_reference()?);
            }
        }
        Ok(SnakeData(bits))
    }
}

impl TlbEncode for SnakeData {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        let bits = &self.0;
        let first = builder.bits_available().min(bits.len());
        builder.store_bit_string(&bits.slice(0, first))?;
        if first == bits.len() {
            return Ok(());
        }

        // Tail cells are built back to front so each one can own its successor
        let mut bounds = Vec::new();
        let mut start = first;
        while start < bits.len() {
            let end = (start + crate::cell::MAX_CELL_BITS).min(bits.len());
            bounds.push((start, end));
            start = end;
        }
        let mut tail = None;
        for (start, end) in bounds.into_iter().rev() {
            let mut chunk = CellBuilder::new();
            chunk.store_bit_string(&bits.slice(start, end))?;
            if let Some(cell) = tail.take() {
                chunk.store_reference(cell)?;
            }
            tail = Some(chunk.build()?);
        }
        if let Some(cell) = tail {
            builder.store_reference(cell)?;
        }
        Ok(())
    }
}

/// Snake-encoded bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl TlbDecode for Bytes {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        SnakeData::decode_tlb(slice, decoder)?.to_bytes().map(Bytes)
    }
}

impl TlbEncode for Bytes {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        SnakeData::from_bytes(&self.0).encode_tlb(builder, encoder)
    }
}

impl Serialize for Bytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

/// `text#_ {n:#} data:(SnakeData ~n) = Text`, holding UTF-8
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Text(pub String);

impl TlbDecode for Text {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let bytes = Bytes::decode_tlb(slice, decoder)?.0;
        String::from_utf8(bytes)
            .map(Text)
            .map_err(|_| TlbError::InvalidData("invalid unicode characters in text".to_string()))
    }
}

impl TlbEncode for Text {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        SnakeData::from_bytes(self.0.as_bytes()).encode_tlb(builder, encoder)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text(s.to_string())
    }
}

/// A byte length in 8 bits followed by that many bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedLengthText(pub String);

impl TlbDecode for FixedLengthText {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        let len = slice.load_byte()? as usize;
        let bytes = slice.load_bytes(len)?;
        String::from_utf8(bytes)
            .map(FixedLengthText)
            .map_err(|e| TlbError::InvalidData(e.to_string()))
    }
}

impl TlbEncode for FixedLengthText {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        let len = u8::try_from(self.0.len()).map_err(|_| {
            TlbError::IntOverflow(format!("text of {} bytes exceeds 255", self.0.len()))
        })?;
        builder.store_byte(len)?;
        builder.store_bytes(self.0.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{marshal, unmarshal};

    #[test]
    fn test_long_text_spans_cells() {
        let text = Text("a".repeat(300));
        let cell = marshal(&text).unwrap();
        assert_eq!(cell.bit_len(), 1023);
        let second = cell.reference(0).unwrap();
        assert_eq!(second.bit_len(), 1023);
        let third = second.reference(0).unwrap();
        assert_eq!(third.bit_len(), 300 * 8 - 2046);
        assert_eq!(unmarshal::<Text>(&cell).unwrap(), text);
    }

    #[test]
    fn test_snake_after_prefix() {
        let mut builder = CellBuilder::new();
        builder.store_u32(0).unwrap();
        Text("b".repeat(200))
            .encode_tlb(&mut builder, &mut Encoder::new())
            .unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 1023);

        let mut slice = cell.as_slice();
        slice.skip_bits(32).unwrap();
        let decoded = Text::decode_tlb(&mut slice, &mut Decoder::new()).unwrap();
        assert_eq!(decoded.0.len(), 200);
    }

    #[test]
    fn test_invalid_utf8() {
        let cell = marshal(&Bytes(vec![0xFF, 0xFE])).unwrap();
        assert!(unmarshal::<Text>(&cell).is_err());
        assert_eq!(unmarshal::<Bytes>(&cell).unwrap().0, vec![0xFF, 0xFE]);
    }

    #[test]
    fn test_fixed_length_text() {
        let cell = marshal(&FixedLengthText("ton".to_string())).unwrap();
        assert_eq!(cell.data(), &[3, b't', b'o', b'n']);
        assert_eq!(unmarshal::<FixedLengthText>(&cell).unwrap().0, "ton");
        assert!(marshal(&FixedLengthText("x".repeat(256))).is_err());
    }
}
