//! Dictionaries: `Hashmap n X` and `HashmapE n X`
//!
//! ```text
//! hm_edge#_ {n:#} {X:Type} {l:#} {m:#} label:(HmLabel ~l n)
//!           {n = (~m) + l} node:(HashmapNode m X) = Hashmap n X;
//! hmn_leaf#_ {X:Type} value:X = HashmapNode 0 X;
//! hmn_fork#_ {n:#} {X:Type} left:^(Hashmap n X)
//!            right:^(Hashmap n X) = HashmapNode (n + 1) X;
//! hme_empty$0 {n:#} {X:Type} = HashmapE n X;
//! hme_root$1 {n:#} {X:Type} root:^(Hashmap n X) = HashmapE n X;
//! ```
//!
//! Items are kept in trie order (keys compared bit by bit). Subtrees behind
//! pruned branch cells are skipped while decoding.

use crate::cell::{BitString, Cell, CellBuilder, CellType, Slice};
use crate::tlb::bigint::{BigIntN, BigUintN};
use crate::tlb::bits::{Bits96, Bits256, Bits264, Bits320, Bits352, Bits512};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::label::{load_label, load_label_len, store_label};
use crate::tlb::primitives::{Int, Uint};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// A fixed-width dictionary key
pub trait HashmapKey: TlbDecode + TlbEncode {
    const KEY_BITS: usize;

    fn to_key_bits(&self) -> TlbResult<BitString> {
        let mut builder = CellBuilder::new();
        self.encode_tlb(&mut builder, &mut Encoder::new())?;
        let bits = builder.build()?.bit_string();
        if bits.len() != Self::KEY_BITS {
            return Err(TlbError::InvalidData(format!(
                "key encodes to {} bits instead of {}",
                bits.len(),
                Self::KEY_BITS
            )));
        }
        Ok(bits)
    }

    fn from_key_bits(bits: &BitString) -> TlbResult<Self> {
        let mut builder = CellBuilder::new();
        builder.store_bit_string(bits)?;
        let cell = builder.build()?;
        Self::decode_tlb(&mut cell.as_slice(), &mut Decoder::new())
    }
}

macro_rules! impl_key {
    ($($ty:ty => $bits:expr),* $(,)?) => {$(
        impl HashmapKey for $ty {
            const KEY_BITS: usize = $bits;
        }
    )*};
}

impl_key! {
    u8 => 8, u16 => 16, u32 => 32, u64 => 64,
    i8 => 8, i16 => 16, i32 => 32, i64 => 64,
    Bits96 => Bits96::BITS,
    Bits256 => Bits256::BITS,
    Bits264 => Bits264::BITS,
    Bits320 => Bits320::BITS,
    Bits352 => Bits352::BITS,
    Bits512 => Bits512::BITS,
}

impl<const N: usize> HashmapKey for Uint<N> {
    const KEY_BITS: usize = N;
}

impl<const N: usize> HashmapKey for Int<N> {
    const KEY_BITS: usize = N;
}

impl<const N: usize> HashmapKey for BigUintN<N> {
    const KEY_BITS: usize = N;
}

impl<const N: usize> HashmapKey for BigIntN<N> {
    const KEY_BITS: usize = N;
}

/// Pairs every item with its key bits, sorted in trie order. Duplicate keys are rejected.
pub(crate) fn keyed_items<'a, K: HashmapKey + 'a, T>(
    items: impl IntoIterator<Item = (&'a K, T)>,
) -> TlbResult<Vec<(BitString, T)>> {
    let mut keyed = items
        .into_iter()
        .map(|(key, item)| Ok((key.to_key_bits()?, item)))
        .collect::<TlbResult<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(TlbError::InvalidData(format!(
            "duplicate dictionary key {}",
            pair[0].0.to_fift_hex()
        )));
    }
    Ok(keyed)
}

/// Label shared by every key in `items` starting at bit `offset`. A single
/// key takes the whole remaining suffix.
pub(crate) fn common_label<T>(items: &[(BitString, T)], offset: usize) -> BitString {
    let first = &items[0].0;
    if items.len() == 1 {
        return first.slice(offset, first.len());
    }
    let last = &items[items.len() - 1].0;
    let len = first.common_prefix_len(last, offset);
    first.slice(offset, offset + len)
}

/// Index of the first item whose key has a one at `bit`
pub(crate) fn split_point<T>(items: &[(BitString, T)], bit: usize) -> usize {
    items.partition_point(|(key, _)| key.get(bit) != Some(true))
}

/// Order-insensitive comparison of dictionary items with unique keys
pub(crate) fn same_items<T: PartialEq>(left: &[T], right: &[T]) -> bool {
    left.len() == right.len() && left.iter().all(|item| right.contains(item))
}

pub(crate) fn is_pruned(cell: &Arc<Cell>) -> bool {
    cell.cell_type() == CellType::PrunedBranch
}

/// A non-empty dictionary with `K::KEY_BITS`-bit keys. Equality ignores
/// item order, decoding yields items in key order.
#[derive(Debug, Clone)]
pub struct Hashmap<K, V> {
    items: Vec<(K, V)>,
}

impl<K: PartialEq, V: PartialEq> PartialEq for Hashmap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        same_items(&self.items, &other.items)
    }
}

impl<K, V> Default for Hashmap<K, V> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<K, V> Hashmap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from items in any order. Encoding sorts them.
    pub fn from_items(items: Vec<(K, V)>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[(K, V)] {
        &self.items
    }

    pub fn into_items(self) -> Vec<(K, V)> {
        self.items
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter().map(|(key, value)| (key, value))
    }
}

impl<K: PartialEq, V> Hashmap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replaces the value of an existing key, or appends a new item
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.items.push((key, value));
                None
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Hashmap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().collect())
    }
}

impl<K: HashmapKey, V: TlbDecode> Hashmap<K, V> {
    fn decode_node(
        slice: &mut Slice,
        decoder: &mut Decoder,
        remaining: usize,
        mut prefix: BitString,
        items: &mut Vec<(K, V)>,
    ) -> TlbResult<()> {
        let label = load_label(slice, remaining)?;
        prefix.extend_from(&label);

        if label.len() == remaining {
            let value = V::decode_tlb(slice, decoder)?;
            items.push((K::from_key_bits(&prefix)?, value));
            return Ok(());
        }

        let rest = remaining - label.len() - 1;
        for bit in [false, true] {
            let child = slice.load_reference()?;
            if is_pruned(&child) {
                log::trace!("skipping pruned dictionary branch at {prefix}");
                continue;
            }
            let mut branch = prefix.clone();
            branch.push(bit);
            Self::decode_node(&mut Slice::new(child), decoder, rest, branch, items)?;
        }
        Ok(())
    }

    /// Decodes the value stored under `key` without decoding the rest of the
    /// dictionary rooted at `root`
    pub fn lookup(root: &Arc<Cell>, key: &K, decoder: &mut Decoder) -> TlbResult<Option<V>> {
        let bits = key.to_key_bits()?;
        let mut slice = Slice::new(root.clone());
        let mut offset = 0;
        let mut remaining = K::KEY_BITS;
        loop {
            if is_pruned(slice.cell()) {
                return Err(TlbError::PrunedBranch {
                    type_name: std::any::type_name::<Self>(),
                });
            }
            let label = load_label(&mut slice, remaining)?;
            if bits.slice(offset, offset + label.len()) != label {
                return Ok(None);
            }
            offset += label.len();
            if label.len() == remaining {
                return V::decode_tlb(&mut slice, decoder).map(Some);
            }
            let right = bits.get(offset) == Some(true);
            let child = slice.preload_reference(usize::from(right))?;
            offset += 1;
            remaining -= label.len() + 1;
            slice = Slice::new(child);
        }
    }
}

impl<K: HashmapKey, V> Hashmap<K, V> {
    /// Number of leaves under `root`, without decoding any value
    pub fn count_leaves(root: &Arc<Cell>) -> TlbResult<usize> {
        count_leaves(root, K::KEY_BITS)
    }
}

pub(crate) fn count_leaves(cell: &Arc<Cell>, remaining: usize) -> TlbResult<usize> {
    if is_pruned(cell) {
        return Err(TlbError::InvalidData(
            "cannot count leaves of a dictionary with pruned branches".to_string(),
        ));
    }
    let mut slice = Slice::new(cell.clone());
    let len = load_label_len(&mut slice, remaining)?;
    if len == remaining {
        return Ok(1);
    }
    let left = count_leaves(&slice.preload_reference(0)?, remaining - len - 1)?;
    let right = count_leaves(&slice.preload_reference(1)?, remaining - len - 1)?;
    Ok(left + right)
}

fn encode_node<V: TlbEncode>(
    builder: &mut CellBuilder,
    encoder: &mut Encoder,
    items: &[(BitString, &V)],
    offset: usize,
    remaining: usize,
) -> TlbResult<()> {
    let label = common_label(items, offset);
    store_label(builder, &label, remaining, encoder.label_policy())?;

    if items.len() == 1 {
        return items[0].1.encode_tlb(builder, encoder);
    }

    let branch_bit = offset + label.len();
    let rest = remaining - label.len() - 1;
    let (left, right) = items.split_at(split_point(items, branch_bit));
    for half in [left, right] {
        let mut child = CellBuilder::new();
        encode_node(&mut child, encoder, half, branch_bit + 1, rest)?;
        builder.store_reference(child.build()?)?;
    }
    Ok(())
}

impl<K: HashmapKey, V: TlbDecode> TlbDecode for Hashmap<K, V> {
    const KEEPS_PRUNED_CELLS: bool = true;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let mut items = Vec::new();
        if is_pruned(slice.cell()) {
            log::trace!("skipping pruned dictionary root");
            return Ok(Self { items });
        }
        Self::decode_node(slice, decoder, K::KEY_BITS, BitString::new(), &mut items)?;
        Ok(Self { items })
    }
}

impl<K: HashmapKey, V: TlbEncode> TlbEncode for Hashmap<K, V> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        let keyed = keyed_items(self.items.iter().map(|(k, v)| (k, v)))?;
        encode_node(builder, encoder, &keyed, 0, K::KEY_BITS)
    }
}

/// Rendered as a JSON object keyed by the JSON text of each key
impl<K: Serialize, V: Serialize> Serialize for Hashmap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (key, value) in &self.items {
            let key = match serde_json::to_value(key).map_err(S::Error::custom)? {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            map.serialize_entry(&key, value)?;
        }
        map.end()
    }
}

/// A possibly empty dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct HashmapE<K, V>(pub Hashmap<K, V>);

impl<K, V> Default for HashmapE<K, V> {
    fn default() -> Self {
        Self(Hashmap::default())
    }
}

impl<K, V> std::ops::Deref for HashmapE<K, V> {
    type Target = Hashmap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> std::ops::DerefMut for HashmapE<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K, V> HashmapE<K, V> {
    pub fn from_items(items: Vec<(K, V)>) -> Self {
        Self(Hashmap::from_items(items))
    }
}

impl<K, V> FromIterator<(K, V)> for HashmapE<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<K: HashmapKey, V: TlbDecode> HashmapE<K, V> {
    /// Looks a key up in a `HashmapE` stored at the start of `slice`
    pub fn lookup(slice: &mut Slice, key: &K, decoder: &mut Decoder) -> TlbResult<Option<V>> {
        if !slice.load_bit()? {
            return Ok(None);
        }
        let root = slice.load_reference()?;
        Hashmap::<K, V>::lookup(&root, key, decoder)
    }
}

impl<K: HashmapKey, V> HashmapE<K, V> {
    /// Counts the entries of a `HashmapE` stored at the start of `slice`
    pub fn count_leaves(slice: &mut Slice) -> TlbResult<usize> {
        if !slice.load_bit()? {
            return Ok(0);
        }
        let root = slice.load_reference()?;
        count_leaves(&root, K::KEY_BITS)
    }
}

impl<K: HashmapKey, V: TlbDecode> TlbDecode for HashmapE<K, V> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if !slice.load_bit()? {
            return Ok(Self::default());
        }
        let root = slice.load_reference()?;
        let mut root = decoder.open::<Hashmap<K, V>>(&root)?;
        Hashmap::decode_tlb(&mut root, decoder).map(Self)
    }
}

impl<K: HashmapKey, V: TlbEncode> TlbEncode for HashmapE<K, V> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        if self.0.is_empty() {
            builder.store_bit(false)?;
            return Ok(());
        }
        builder.store_bit(true)?;
        let root = self.0.encode_as_ref(encoder)?;
        builder.store_reference(root)?;
        Ok(())
    }
}

impl<K: Serialize, V: Serialize> Serialize for HashmapE<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{marshal, unmarshal};

    #[test]
    fn test_single_entry_layout() {
        let map = Hashmap::from_items(vec![(0xA5u8, 7u8)]);
        let cell = marshal(&map).unwrap();
        // hml_long$10, len 8 in 4 bits, 8 key bits, then the value
        assert_eq!(cell.bit_len(), 2 + 4 + 8 + 8);
        assert_eq!(cell.reference_count(), 0);
        assert_eq!(unmarshal::<Hashmap<u8, u8>>(&cell).unwrap(), map);
    }

    #[test]
    fn test_fork_layout() {
        let map = Hashmap::from_items(vec![(0b1000_0000u8, 1u8), (0b0000_0000u8, 2u8)]);
        let cell = marshal(&map).unwrap();
        assert_eq!(cell.reference_count(), 2);
        // Empty short label at the root
        assert_eq!(cell.bit_len(), 2);

        let decoded: Hashmap<u8, u8> = unmarshal(&cell).unwrap();
        assert_eq!(decoded.items(), &[(0, 2), (0x80, 1)]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let map = Hashmap::from_items(vec![(1u16, 1u8), (1u16, 2u8)]);
        assert!(marshal(&map).is_err());
    }

    #[test]
    fn test_hashmap_e() {
        let empty = HashmapE::<u32, u32>::default();
        let cell = marshal(&empty).unwrap();
        assert_eq!(cell.bit_len(), 1);
        assert!(unmarshal::<HashmapE<u32, u32>>(&cell).unwrap().is_empty());

        let map: HashmapE<u32, u32> = (0..20u32).map(|i| (i * 7, i)).collect();
        let cell = marshal(&map).unwrap();
        let decoded: HashmapE<u32, u32> = unmarshal(&cell).unwrap();
        assert_eq!(decoded.len(), 20);
        assert_eq!(decoded.get(&21), Some(&3));

        let mut slice = cell.as_slice();
        assert_eq!(HashmapE::<u32, u32>::count_leaves(&mut slice).unwrap(), 20);

        let mut decoder = Decoder::new();
        let found = HashmapE::<u32, u32>::lookup(&mut cell.as_slice(), &70, &mut decoder).unwrap();
        assert_eq!(found, Some(10));
        let missing = HashmapE::<u32, u32>::lookup(&mut cell.as_slice(), &71, &mut decoder).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = HashmapE::<u16, u8>::default();
        assert_eq!(map.insert(5, 1), None);
        assert_eq!(map.insert(5, 2), Some(1));
        map.insert(3, 9);
        assert_eq!(map.get(&5), Some(&2));
        assert_eq!(map.len(), 2);
    }

    /// Copies `cell` with reference `index` replaced by its pruned branch
    fn prune_child(cell: &Arc<Cell>, index: usize) -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_bit_string(&cell.bit_string()).unwrap();
        for (i, child) in cell.references().iter().enumerate() {
            let child = if i == index {
                Cell::pruned_branch(child).unwrap()
            } else {
                child.clone()
            };
            builder.store_reference(child).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_pruned_branch_skipped() {
        let map = Hashmap::from_items(vec![(0x01u8, 11u32), (0x02, 12), (0x81, 13)]);
        let cell = marshal(&map).unwrap();
        assert_eq!(cell.reference_count(), 2);

        let proof = prune_child(&cell, 1);
        let decoded: Hashmap<u8, u32> = unmarshal(&proof).unwrap();
        assert_eq!(decoded.items(), &[(0x01, 11), (0x02, 12)]);
        assert!(Hashmap::<u8, u32>::count_leaves(&proof).is_err());
        assert_eq!(Hashmap::<u8, u32>::count_leaves(&cell).unwrap(), 3);

        let mut decoder = Decoder::new();
        assert_eq!(Hashmap::<u8, u32>::lookup(&proof, &0x02, &mut decoder).unwrap(), Some(12));
        assert!(Hashmap::<u8, u32>::lookup(&proof, &0x81, &mut decoder).is_err());
    }

    #[test]
    fn test_pruned_root_is_empty() {
        let map: HashmapE<u8, u32> = vec![(0x01u8, 11u32), (0x81, 13)].into_iter().collect();
        let cell = prune_child(&marshal(&map).unwrap(), 0);

        let decoded: HashmapE<u8, u32> = unmarshal(&cell).unwrap();
        assert!(decoded.is_empty());
        assert!(HashmapE::<u8, u32>::count_leaves(&mut cell.as_slice()).is_err());
    }

    #[test]
    fn test_equality_ignores_order() {
        let map = Hashmap::from_items(vec![(0x81u8, 13u32), (0x01, 11)]);
        let decoded: Hashmap<u8, u32> = unmarshal(&marshal(&map).unwrap()).unwrap();
        assert_eq!(decoded.items(), &[(0x01, 11), (0x81, 13)]);
        assert_eq!(decoded, map);
        assert_ne!(decoded, Hashmap::from_items(vec![(0x81u8, 13u32), (0x01, 12)]));
    }

    #[test]
    fn test_json_rendering() {
        let map: HashmapE<u32, u8> = vec![(1u32, 10u8), (2, 20)].into_iter().collect();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"1":10,"2":20}"#);
    }
}
