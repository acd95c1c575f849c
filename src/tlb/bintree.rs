//! ```text
//! bt_leaf$0 {X:Type} leaf:X = BinTree X;
//! bt_fork$1 {X:Type} left:^(BinTree X) right:^(BinTree X) = BinTree X;
//! ```

use crate::cell::{CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::Serialize;

/// A non-empty list stored as a balanced binary tree, leaves left to right
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct BinTree<T>(pub Vec<T>);

impl<T> BinTree<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> From<Vec<T>> for BinTree<T> {
    fn from(values: Vec<T>) -> Self {
        BinTree(values)
    }
}

impl<T: TlbDecode> BinTree<T> {
    fn decode_into(slice: &mut Slice, decoder: &mut Decoder, out: &mut Vec<T>) -> TlbResult<()> {
        if !slice.load_bit()? {
            out.push(T::decode_tlb(slice, decoder)?);
            return Ok(());
        }
        for _ in 0..2 {
            let child = slice.load_reference()?;
            let mut child = decoder.open::<Self>(&child)?;
            Self::decode_into(&mut child, decoder, out)?;
        }
        Ok(())
    }
}

impl<T: TlbDecode> TlbDecode for BinTree<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let mut values = Vec::new();
        Self::decode_into(slice, decoder, &mut values)?;
        Ok(BinTree(values))
    }
}

fn encode_values<T: TlbEncode>(
    builder: &mut CellBuilder,
    encoder: &mut Encoder,
    values: &[T],
) -> TlbResult<()> {
    match values {
        [] => Err(TlbError::EmptyBinTree),
        [value] => {
            builder.store_bit(false)?;
            value.encode_tlb(builder, encoder)
        }
        _ => {
            builder.store_bit(true)?;
            let (left, right) = values.split_at(values.len() / 2);
            for half in [left, right] {
                let mut child = CellBuilder::new();
                encode_values(&mut child, encoder, half)?;
                builder.store_reference(child.build()?)?;
            }
            Ok(())
        }
    }
}

impl<T: TlbEncode> TlbEncode for BinTree<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        encode_values(builder, encoder, &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{boc_to_hex, hex_to_boc};
    use crate::tlb::{marshal, unmarshal};

    #[test]
    fn test_order_preserved() {
        for len in 1..=4u32 {
            let tree = BinTree((1..=len).collect::<Vec<u32>>());
            let cell = marshal(&tree).unwrap();
            let reparsed = hex_to_boc(&boc_to_hex(&cell, false).unwrap()).unwrap();
            let decoded: BinTree<u32> = unmarshal(&reparsed).unwrap();
            assert_eq!(decoded, tree);
        }
    }

    #[test]
    fn test_three_splits_one_two() {
        let cell = marshal(&BinTree(vec![1u8, 2, 3])).unwrap();
        let left = cell.reference(0).unwrap();
        let right = cell.reference(1).unwrap();
        // Leaf bit plus the value
        assert_eq!(left.bit_len(), 9);
        assert_eq!(left.reference_count(), 0);
        assert_eq!(right.bit_len(), 1);
        assert_eq!(right.reference_count(), 2);
    }

    #[test]
    fn test_empty_rejected() {
        let err = marshal(&BinTree::<u8>(Vec::new())).unwrap_err();
        assert!(matches!(err, TlbError::EmptyBinTree));
    }
}
