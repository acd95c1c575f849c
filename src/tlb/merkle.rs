//! Merkle proof and update wrappers
//!
//! ```text
//! !merkle_proof#03 {X:Type} virtual_hash:bits256 depth:uint16 virtual_root:^X = MERKLE_PROOF X;
//! !merkle_update#04 {X:Type} from_hash:bits256 to_hash:bits256
//!   from_depth:uint16 to_depth:uint16 from_proof:^X to_proof:^X = MERKLE_UPDATE X;
//! ```
//!
//! The stored hashes are level-0 hashes: pruned branches inside the proof
//! stand for the subtrees they replaced.

use crate::cell::{Cell, CellBuilder, CellType, PRUNED_BRANCH_BITS, Slice};
use crate::tlb::bits::Bits256;
use crate::tlb::error::{TlbError, TlbResult};
use crate::tlb::{Decoder, Encoder, TlbDecode, TlbEncode};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const MERKLE_PROOF_TAG: u8 = 3;
const MERKLE_UPDATE_TAG: u8 = 4;

/// Hash and depth of `cell` as seen with every pruned branch expanded
pub fn virtual_hash(cell: &Cell) -> TlbResult<([u8; 32], u16)> {
    if cell.level_mask() == 0 {
        return Ok((cell.hash(), cell.depth()));
    }
    match cell.cell_type() {
        CellType::PrunedBranch => {
            let data = cell.data();
            if cell.bit_len() < PRUNED_BRANCH_BITS {
                return Err(TlbError::InvalidData("truncated pruned branch".to_string()));
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&data[2..34]);
            let depth = u16::from_be_bytes([data[34], data[35]]);
            Ok((hash, depth))
        }
        CellType::Ordinary => {
            let mut children = Vec::with_capacity(cell.reference_count());
            for child in cell.references() {
                children.push(virtual_hash(child)?);
            }
            let [refs_descriptor, bits_descriptor] = cell.descriptors();
            let mut hasher = Sha256::new();
            hasher.update([refs_descriptor & 0x1F, bits_descriptor]);
            hasher.update(cell.serialize_data());
            for (_, depth) in &children {
                hasher.update(depth.to_be_bytes());
            }
            for (hash, _) in &children {
                hasher.update(hash);
            }
            let depth = children.iter().map(|(_, d)| d + 1).max().unwrap_or(0);
            Ok((hasher.finalize().into(), depth))
        }
        other => Err(TlbError::InvalidData(format!(
            "nested {other:?} cells are not supported inside merkle proofs"
        ))),
    }
}

fn check_virtual_root(root: &Cell, hash: &Bits256, depth: u16) -> TlbResult<()> {
    let (actual, actual_depth) = virtual_hash(root)?;
    if actual != hash.0 || actual_depth != depth {
        return Err(TlbError::InvalidData(format!(
            "merkle root {} does not match stored hash {hash}",
            hex::encode(actual)
        )));
    }
    Ok(())
}

fn expect_exotic(slice: &mut Slice, cell_type: CellType, tag: u8) -> TlbResult<()> {
    if slice.cell().cell_type() != cell_type {
        return Err(TlbError::InvalidData(format!(
            "expected a {cell_type:?} cell, got {:?}",
            slice.cell().cell_type()
        )));
    }
    let found = slice.load_byte()?;
    if found != tag {
        return Err(TlbError::MagicMismatch {
            expected: format!("#{tag:02x}"),
            found: found as u64,
        });
    }
    Ok(())
}

fn own_cell(builder: &CellBuilder) -> TlbResult<()> {
    if builder.bit_len() > 0 || builder.ref_count() > 0 {
        return Err(TlbError::InvalidData(
            "merkle cells cannot be stored inline".to_string(),
        ));
    }
    Ok(())
}

/// A value together with the proof cell it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct MerkleProof<T> {
    pub virtual_hash: Bits256,
    pub depth: u16,
    pub virtual_root: T,
}

impl<T: TlbEncode> MerkleProof<T> {
    /// Wraps a value, computing the hash and depth of its cell
    pub fn new(virtual_root: T) -> TlbResult<Self> {
        let cell = virtual_root.encode_as_ref(&mut Encoder::new())?;
        let (hash, depth) = virtual_hash(&cell)?;
        Ok(Self {
            virtual_hash: Bits256(hash),
            depth,
            virtual_root,
        })
    }
}

impl<T: TlbDecode> TlbDecode for MerkleProof<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        expect_exotic(slice, CellType::MerkleProof, MERKLE_PROOF_TAG)?;
        let virtual_hash = Bits256::decode_tlb(slice, decoder)?;
        let depth = slice.load_u16()?;
        let root = slice.load_reference()?;
        check_virtual_root(&root, &virtual_hash, depth)?;
        let mut inner = decoder.open::<T>(&root)?;
        let virtual_root = T::decode_tlb(&mut inner, decoder)?;
        Ok(Self {
            virtual_hash,
            depth,
            virtual_root,
        })
    }
}

impl<T: TlbEncode> TlbEncode for MerkleProof<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        own_cell(builder)?;
        let root = self.virtual_root.encode_as_ref(encoder)?;
        check_virtual_root(&root, &self.virtual_hash, self.depth)?;
        builder.set_cell_type(CellType::MerkleProof);
        builder.store_byte(MERKLE_PROOF_TAG)?;
        builder.store_bytes(&self.virtual_hash.0)?;
        builder.store_u16(self.depth)?;
        builder.store_reference(root)?;
        Ok(())
    }
}

/// Old and new state of a structure, each with its unpruned hash
#[derive(Debug, Clone, PartialEq)]
pub struct MerkleUpdate<T> {
    pub old_hash: Bits256,
    pub new_hash: Bits256,
    pub old_depth: u16,
    pub new_depth: u16,
    pub old: T,
    pub new: T,
}

impl<T: TlbEncode> MerkleUpdate<T> {
    pub fn new(old: T, new: T) -> TlbResult<Self> {
        let mut encoder = Encoder::new();
        let old_cell = old.encode_as_ref(&mut encoder)?;
        let new_cell = new.encode_as_ref(&mut encoder)?;
        let (old_hash, old_depth) = virtual_hash(&old_cell)?;
        let (new_hash, new_depth) = virtual_hash(&new_cell)?;
        Ok(Self {
            old_hash: Bits256(old_hash),
            new_hash: Bits256(new_hash),
            old_depth,
            new_depth,
            old,
            new,
        })
    }
}

impl<T: TlbDecode> TlbDecode for MerkleUpdate<T> {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        expect_exotic(slice, CellType::MerkleUpdate, MERKLE_UPDATE_TAG)?;
        let old_hash = Bits256::decode_tlb(slice, decoder)?;
        let new_hash = Bits256::decode_tlb(slice, decoder)?;
        let old_depth = slice.load_u16()?;
        let new_depth = slice.load_u16()?;

        let old_root = slice.load_reference()?;
        check_virtual_root(&old_root, &old_hash, old_depth)?;
        let new_root = slice.load_reference()?;
        check_virtual_root(&new_root, &new_hash, new_depth)?;

        let old = T::decode_tlb(&mut decoder.open::<T>(&old_root)?, decoder)?;
        let new = T::decode_tlb(&mut decoder.open::<T>(&new_root)?, decoder)?;
        Ok(Self {
            old_hash,
            new_hash,
            old_depth,
            new_depth,
            old,
            new,
        })
    }
}

impl<T: TlbEncode> TlbEncode for MerkleUpdate<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        own_cell(builder)?;
        let old_root = self.old.encode_as_ref(encoder)?;
        check_virtual_root(&old_root, &self.old_hash, self.old_depth)?;
        let new_root = self.new.encode_as_ref(encoder)?;
        check_virtual_root(&new_root, &self.new_hash, self.new_depth)?;

        builder.set_cell_type(CellType::MerkleUpdate);
        builder.store_byte(MERKLE_UPDATE_TAG)?;
        builder.store_bytes(&self.old_hash.0)?;
        builder.store_bytes(&self.new_hash.0)?;
        builder.store_u16(self.old_depth)?;
        builder.store_u16(self.new_depth)?;
        builder.store_reference(old_root)?;
        builder.store_reference(new_root)?;
        Ok(())
    }
}

/// A referenced value that a proof may have replaced by a pruned branch
#[derive(Debug, Clone, PartialEq)]
pub enum Prunable<T> {
    Value(T),
    Pruned(Arc<Cell>),
}

impl<T> Prunable<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Prunable::Value(value) => Some(value),
            Prunable::Pruned(_) => None,
        }
    }

    pub fn is_pruned(&self) -> bool {
        matches!(self, Prunable::Pruned(_))
    }
}

/// Pruned values render as `null`
impl<T: Serialize> Serialize for Prunable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Prunable::Value(value) => value.serialize(serializer),
            Prunable::Pruned(_) => serializer.serialize_none(),
        }
    }
}

impl<T: TlbDecode> TlbDecode for Prunable<T> {
    const KEEPS_PRUNED_CELLS: bool = true;

    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if slice.cell().cell_type() == CellType::PrunedBranch {
            log::trace!("keeping pruned branch {}", hex::encode(slice.cell().hash()));
            let cell = slice.cell().clone();
            slice.skip_bits(slice.remaining_bits())?;
            return Ok(Prunable::Pruned(cell));
        }
        T::decode_tlb(slice, decoder).map(Prunable::Value)
    }
}

impl<T: TlbEncode> TlbEncode for Prunable<T> {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            Prunable::Value(value) => value.encode_tlb(builder, encoder),
            Prunable::Pruned(_) => Err(TlbError::InvalidData(
                "a pruned branch can only be stored as a reference".to_string(),
            )),
        }
    }

    fn encode_as_ref(&self, encoder: &mut Encoder) -> TlbResult<Arc<Cell>> {
        match self {
            Prunable::Value(value) => value.encode_as_ref(encoder),
            Prunable::Pruned(cell) => Ok(cell.clone()),
        }
    }
}
