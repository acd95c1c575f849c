//! Augmented dictionaries: every fork carries an aggregate of its subtree
//!
//! ```text
//! ahm_edge#_ {n:#} {X:Type} {Y:Type} {l:#} {m:#}
//!   label:(HmLabel ~l n) {n = (~m) + l}
//!   node:(HashmapAugNode m X Y) = HashmapAug n X Y;
//! ahmn_leaf#_ {X:Type} {Y:Type} extra:Y value:X = HashmapAugNode 0 X Y;
//! ahmn_fork#_ {n:#} {X:Type} {Y:Type} left:^(HashmapAug n X Y)
//!   right:^(HashmapAug n X Y) extra:Y = HashmapAugNode (n + 1) X Y;
//! ahme_empty$0 {n:#} {X:Type} {Y:Type} extra:Y = HashmapAugE n X Y;
//! ahme_root$1 {n:#} {X:Type} {Y:Type} root:^(HashmapAug n X Y)
//!   extra:Y = HashmapAugE n X Y;
//! ```

use crate::cell::{BitString, Cell, CellBuilder, Slice};
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::hashmap::{
    HashmapKey, common_label, count_leaves, is_pruned, keyed_items, same_items, split_point,
};
use crate::tlb::label::{load_label, store_label};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Combines the extras of two sibling subtrees into their parent's extra
pub trait AugExtra: Sized {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self>;
}

/// Message queues aggregate the minimal logical time
impl AugExtra for u64 {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self> {
        Ok(*left.min(right))
    }
}

/// Extras as they were stored on every node of a decoded dictionary.
/// Pruned subtrees have no entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AugExtraTree<E> {
    pub data: E,
    pub left: Option<Box<AugExtraTree<E>>>,
    pub right: Option<Box<AugExtraTree<E>>>,
}

/// One dictionary entry: the value and its own extra
#[derive(Debug, Clone, PartialEq)]
pub struct AugItem<K, V, E> {
    pub key: K,
    pub value: V,
    pub extra: E,
}

impl<K, V, E> AugItem<K, V, E> {
    pub fn new(key: K, value: V, extra: E) -> Self {
        Self { key, value, extra }
    }
}

/// A non-empty augmented dictionary. Two maps are equal when they hold the
/// same items in any order; the node extras of a decoded map are not compared.
#[derive(Debug, Clone)]
pub struct HashmapAug<K, V, E> {
    items: Vec<AugItem<K, V, E>>,
    extra_tree: Option<AugExtraTree<E>>,
}

impl<K, V, E> Default for HashmapAug<K, V, E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            extra_tree: None,
        }
    }
}

impl<K, V, E> HashmapAug<K, V, E> {
    /// Builds a map from items in any order. Encoding sorts them.
    pub fn from_items(items: Vec<AugItem<K, V, E>>) -> Self {
        Self {
            items,
            extra_tree: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[AugItem<K, V, E>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<AugItem<K, V, E>> {
        self.items
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.iter().map(|item| &item.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.iter().map(|item| &item.value)
    }

    /// Node extras of a decoded dictionary, root first
    pub fn extra_tree(&self) -> Option<&AugExtraTree<E>> {
        self.extra_tree.as_ref()
    }
}

impl<K: PartialEq, V: PartialEq, E: PartialEq> PartialEq for HashmapAug<K, V, E> {
    fn eq(&self, other: &Self) -> bool {
        same_items(&self.items, &other.items)
    }
}

impl<K: PartialEq, V, E> HashmapAug<K, V, E> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.items
            .iter()
            .find(|item| item.key == *key)
            .map(|item| &item.value)
    }
}

impl<K: HashmapKey, V, E> HashmapAug<K, V, E> {
    pub fn count_leaves(root: &Arc<Cell>) -> TlbResult<usize> {
        count_leaves(root, K::KEY_BITS)
    }
}

impl<K: HashmapKey, V: TlbDecode, E: TlbDecode + Clone> HashmapAug<K, V, E> {
    fn decode_node(
        slice: &mut Slice,
        decoder: &mut Decoder,
        remaining: usize,
        mut prefix: BitString,
        items: &mut Vec<AugItem<K, V, E>>,
    ) -> TlbResult<AugExtraTree<E>> {
        let label = load_label(slice, remaining)?;
        prefix.extend_from(&label);

        if label.len() == remaining {
            let extra = E::decode_tlb(slice, decoder)?;
            let value = V::decode_tlb(slice, decoder)?;
            let key = K::from_key_bits(&prefix)?;
            items.push(AugItem::new(key, value, extra.clone()));
            return Ok(AugExtraTree {
                data: extra,
                left: None,
                right: None,
            });
        }

        let rest = remaining - label.len() - 1;
        let mut children = [None, None];
        for (bit, subtree) in [false, true].into_iter().zip(children.iter_mut()) {
            let child = slice.load_reference()?;
            if is_pruned(&child) {
                log::trace!("skipping pruned augmented dictionary branch at {prefix}");
                continue;
            }
            let mut branch = prefix.clone();
            branch.push(bit);
            let tree = Self::decode_node(&mut Slice::new(child), decoder, rest, branch, items)?;
            *subtree = Some(Box::new(tree));
        }
        let data = E::decode_tlb(slice, decoder)?;
        let [left, right] = children;
        Ok(AugExtraTree { data, left, right })
    }
}

impl<K: HashmapKey, V: TlbDecode, E: TlbDecode + Clone> TlbDecode for HashmapAug<K, V, E> {
    const KEEPS_PRUNED_CELLS: bool = true;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let mut items = Vec::new();
        if is_pruned(slice.cell()) {
            log::trace!("skipping pruned augmented dictionary root");
            return Ok(Self::default());
        }
        let tree = Self::decode_node(slice, decoder, K::KEY_BITS, BitString::new(), &mut items)?;
        Ok(Self {
            items,
            extra_tree: Some(tree),
        })
    }
}

/// Writes one node and returns the aggregated extra of its subtree
fn encode_node<V: TlbEncode, E: TlbEncode + AugExtra + Clone>(
    builder: &mut CellBuilder,
    encoder: &mut Encoder,
    items: &[(BitString, (&V, &E))],
    offset: usize,
    remaining: usize,
) -> TlbResult<E> {
    let label = common_label(items, offset);
    store_label(builder, &label, remaining, encoder.label_policy())?;

    if items.len() == 1 {
        let (value, extra) = items[0].1;
        extra.encode_tlb(builder, encoder)?;
        value.encode_tlb(builder, encoder)?;
        return Ok(extra.clone());
    }

    let branch_bit = offset + label.len();
    let rest = remaining - label.len() - 1;
    let (left, right) = items.split_at(split_point(items, branch_bit));

    let mut left_cell = CellBuilder::new();
    let left_extra = encode_node(&mut left_cell, encoder, left, branch_bit + 1, rest)?;
    builder.store_reference(left_cell.build()?)?;

    let mut right_cell = CellBuilder::new();
    let right_extra = encode_node(&mut right_cell, encoder, right, branch_bit + 1, rest)?;
    builder.store_reference(right_cell.build()?)?;

    let extra = E::aggregate(&left_extra, &right_extra)?;
    extra.encode_tlb(builder, encoder)?;
    Ok(extra)
}

impl<K: HashmapKey, V: TlbEncode, E: TlbEncode + AugExtra + Clone> HashmapAug<K, V, E> {
    /// Aggregated extra of all items, `None` for an empty map
    pub fn total_extra(&self) -> TlbResult<Option<E>> {
        let mut total: Option<E> = None;
        for item in &self.items {
            total = Some(match total {
                Some(acc) => E::aggregate(&acc, &item.extra)?,
                None => item.extra.clone(),
            });
        }
        Ok(total)
    }

    fn encode_root(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<E> {
        let keyed = keyed_items(
            self.items
                .iter()
                .map(|item| (&item.key, (&item.value, &item.extra))),
        )?;
        encode_node(builder, encoder, &keyed, 0, K::KEY_BITS)
    }
}

impl<K: HashmapKey, V: TlbEncode, E: TlbEncode + AugExtra + Clone> TlbEncode
    for HashmapAug<K, V, E>
{
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        if self.items.is_empty() {
            return Err(TlbError::InvalidData(
                "augmented dictionary without items has no root".to_string(),
            ));
        }
        self.encode_root(builder, encoder).map(|_| ())
    }
}

impl<K: Serialize, V: Serialize, E> Serialize for HashmapAug<K, V, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for item in &self.items {
            let key = match serde_json::to_value(&item.key).map_err(S::Error::custom)? {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            map.serialize_entry(&key, &item.value)?;
        }
        map.end()
    }
}

/// A possibly empty augmented dictionary with the grand total of its extras
#[derive(Debug, Clone, PartialEq)]
pub struct HashmapAugE<K, V, E> {
    pub map: HashmapAug<K, V, E>,
    pub extra: E,
}

impl<K, V, E: Default> Default for HashmapAugE<K, V, E> {
    fn default() -> Self {
        Self {
            map: HashmapAug::default(),
            extra: E::default(),
        }
    }
}

impl<K, V, E> std::ops::Deref for HashmapAugE<K, V, E> {
    type Target = HashmapAug<K, V, E>;

    fn deref(&self) -> &Self::Target {
        &self.map
    }
}

impl<K: HashmapKey, V: TlbEncode, E: TlbEncode + AugExtra + Clone + Default> HashmapAugE<K, V, E> {
    /// Builds the dictionary and computes its grand total
    pub fn from_items(items: Vec<AugItem<K, V, E>>) -> TlbResult<Self> {
        let map = HashmapAug::from_items(items);
        let extra = map.total_extra()?.unwrap_or_default();
        Ok(Self { map, extra })
    }
}

impl<K: HashmapKey, V, E> HashmapAugE<K, V, E> {
    /// Counts the entries of a `HashmapAugE` stored at the start of `slice`
    pub fn count_leaves(slice: &mut Slice) -> TlbResult<usize> {
        if !slice.load_bit()? {
            return Ok(0);
        }
        let root = slice.load_reference()?;
        count_leaves(&root, K::KEY_BITS)
    }
}

impl<K: HashmapKey, V: TlbDecode, E: TlbDecode + Clone> TlbDecode for HashmapAugE<K, V, E> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let map = if slice.load_bit()? {
            let root = slice.load_reference()?;
            let mut root = decoder.open::<HashmapAug<K, V, E>>(&root)?;
            HashmapAug::decode_tlb(&mut root, decoder)?
        } else {
            HashmapAug::default()
        };
        let extra = E::decode_tlb(slice, decoder)?;
        Ok(Self { map, extra })
    }
}

impl<K: HashmapKey, V: TlbEncode, E: TlbEncode + AugExtra + Clone> TlbEncode
    for HashmapAugE<K, V, E>
{
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        builder.store_bit(!self.map.is_empty())?;
        if !self.map.is_empty() {
            let root = self.map.encode_as_ref(encoder)?;
            builder.store_reference(root)?;
        }
        self.extra.encode_tlb(builder, encoder)
    }
}

impl<K: Serialize, V: Serialize, E> Serialize for HashmapAugE<K, V, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}
