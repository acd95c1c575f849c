//! Shards and block identifiers
//!
//! A shard is a 64-bit value whose lowest set bit terminates the account
//! prefix it covers: `0x8000000000000000` is the whole workchain,
//! `0x4000000000000000` and `0xc000000000000000` are its two halves.

use crate::cell::{CellBuilder, Slice, bits_for};
use crate::models::address::AccountId;
use crate::models::block::{BlkPrevInfo, Block, BlockInfo, ExtBlkRef};
use crate::tlb::{
    Bits256, Decoder, Encoder, TlbDecode, TlbEncode, TlbError, TlbResult, expect_magic, write_tag,
};
use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Shard covering the whole workchain
pub const SHARD_FULL: u64 = 0x8000_0000_0000_0000;

const SHARD_IDENT_TAG: &str = "shard_ident$00";
const MAX_SHARD_PFX_BITS: u64 = 60;
const TL_BLOCK_ID_LEN: usize = 80;

fn lower_bit(shard: u64) -> u64 {
    shard & shard.wrapping_neg()
}

/// One of the two shards `shard` splits into
pub fn shard_child(shard: u64, left: bool) -> u64 {
    let x = lower_bit(shard) >> 1;
    if left { shard - x } else { shard + x }
}

/// The shard `shard` was split from
pub fn shard_parent(shard: u64) -> u64 {
    let x = lower_bit(shard);
    (shard - x) | (x << 1)
}

/// `shard_ident$00 shard_pfx_bits:(#<= 60) workchain_id:int32 shard_prefix:uint64 = ShardIdent;`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ShardIdent {
    pub shard_pfx_bits: u8,
    pub workchain_id: i32,
    pub shard_prefix: u64,
}

impl ShardIdent {
    pub fn from_shard(workchain_id: i32, shard: u64) -> TlbResult<Self> {
        if shard == 0 {
            return Err(TlbError::InvalidData("shard must have a terminating bit".to_string()));
        }
        let shard_pfx_bits = 63 - shard.trailing_zeros() as u64;
        if shard_pfx_bits > MAX_SHARD_PFX_BITS {
            return Err(TlbError::InvalidData(format!(
                "shard {shard:016x} is deeper than {MAX_SHARD_PFX_BITS} bits"
            )));
        }
        Ok(Self {
            shard_pfx_bits: shard_pfx_bits as u8,
            workchain_id,
            shard_prefix: shard - lower_bit(shard),
        })
    }

    /// The prefix with its terminating bit, as used in block ids
    pub fn shard(&self) -> u64 {
        let tag = 1u64
            .checked_shl(63u32.saturating_sub(self.shard_pfx_bits as u32))
            .unwrap_or(0);
        self.shard_prefix | tag
    }
}

impl TlbDecode for ShardIdent {
    fn decode_tlb(slice: &mut Slice, _decoder: &mut Decoder) -> TlbResult<Self> {
        expect_magic(slice, SHARD_IDENT_TAG)?;
        Ok(Self {
            shard_pfx_bits: slice.load_lim_uint(MAX_SHARD_PFX_BITS)? as u8,
            workchain_id: slice.load_int(32)? as i32,
            shard_prefix: slice.load_u64()?,
        })
    }
}

impl TlbEncode for ShardIdent {
    fn encode_tlb(&self, builder: &mut CellBuilder, _encoder: &mut Encoder) -> TlbResult<()> {
        if self.shard_pfx_bits as u64 > MAX_SHARD_PFX_BITS {
            return Err(TlbError::InvalidData(format!(
                "shard prefix of {} bits",
                self.shard_pfx_bits
            )));
        }
        write_tag(builder, SHARD_IDENT_TAG)?;
        builder.store_uint(self.shard_pfx_bits as u64, bits_for(MAX_SHARD_PFX_BITS))?;
        builder.store_int(self.workchain_id as i64, 32)?;
        builder.store_u64(self.shard_prefix)?;
        Ok(())
    }
}

/// Shard prefix and mask, for matching accounts and other shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardId {
    prefix: u64,
    mask: u64,
}

impl ShardId {
    pub fn parse(shard: u64) -> Result<Self> {
        if shard == 0 {
            bail!("at least one non-zero bit required in shard id");
        }
        let trailing_zeros = shard.trailing_zeros();
        Ok(Self {
            prefix: shard ^ (1 << trailing_zeros),
            mask: u64::MAX.checked_shl(trailing_zeros + 1).unwrap_or(0),
        })
    }

    pub fn encode(&self) -> u64 {
        self.prefix | (1 << (self.mask.trailing_zeros() - 1))
    }

    pub fn match_account_id(&self, account: &AccountId) -> bool {
        let mut head = [0u8; 8];
        head.copy_from_slice(&account.address.0[..8]);
        u64::from_be_bytes(head) & self.mask == self.prefix
    }

    /// Whether one shard contains the other
    pub fn match_block_id(&self, block: &BlockId) -> bool {
        let Ok(other) = ShardId::parse(block.shard) else {
            return false;
        };
        if self.mask.trailing_zeros() < other.mask.trailing_zeros() {
            self.prefix & other.mask == other.prefix
        } else {
            other.prefix & self.mask == self.prefix
        }
    }
}

/// Block id without hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct BlockId {
    pub workchain: i32,
    pub shard: u64,
    pub seqno: u32,
}

impl BlockId {
    pub fn new(workchain: i32, shard: u64, seqno: u32) -> Self {
        Self {
            workchain,
            shard,
            seqno,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:x},{})", self.workchain, self.shard, self.seqno)
    }
}

impl FromStr for BlockId {
    type Err = anyhow::Error;

    /// Parses the `(workchain,shard hex,seqno)` form
    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| anyhow!("block id must be enclosed in parentheses: {s}"))?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let [workchain, shard, seqno] = parts.as_slice() else {
            bail!("block id must have three components: {s}");
        };
        Ok(Self {
            workchain: workchain.parse()?,
            shard: u64::from_str_radix(shard, 16)?,
            seqno: seqno.parse()?,
        })
    }
}

/// Block id with root and file hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FullBlockId {
    pub workchain: i32,
    pub shard: u64,
    pub seqno: u32,
    pub root_hash: Bits256,
    pub file_hash: Bits256,
}

#[derive(tl_proto::TlRead, tl_proto::TlWrite)]
struct TlBlockIdExt {
    workchain: i32,
    shard: u64,
    seqno: u32,
    root_hash: [u8; 32],
    file_hash: [u8; 32],
}

impl FullBlockId {
    pub fn id(&self) -> BlockId {
        BlockId::new(self.workchain, self.shard, self.seqno)
    }

    fn from_ext_ref(workchain: i32, shard: u64, blk: &ExtBlkRef) -> Self {
        Self {
            workchain,
            shard,
            seqno: blk.seq_no,
            root_hash: blk.root_hash,
            file_hash: blk.file_hash,
        }
    }

    /// `tonNode.blockIdExt`, little-endian and 80 bytes long
    pub fn to_tl(&self) -> Vec<u8> {
        tl_proto::serialize(TlBlockIdExt {
            workchain: self.workchain,
            shard: self.shard,
            seqno: self.seqno,
            root_hash: self.root_hash.0,
            file_hash: self.file_hash.0,
        })
    }

    pub fn from_tl(data: &[u8]) -> Result<Self> {
        if data.len() != TL_BLOCK_ID_LEN {
            bail!("block id must be {TL_BLOCK_ID_LEN} bytes, got {}", data.len());
        }
        let id = tl_proto::deserialize::<TlBlockIdExt>(data).map_err(|err| anyhow!("{err:?}"))?;
        Ok(Self {
            workchain: id.workchain,
            shard: id.shard,
            seqno: id.seqno,
            root_hash: Bits256(id.root_hash),
            file_hash: Bits256(id.file_hash),
        })
    }
}

impl fmt::Display for FullBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{:x},{},{},{})",
            self.workchain, self.shard, self.seqno, self.root_hash, self.file_hash
        )
    }
}

fn parents_of(
    prev: &BlkPrevInfo,
    after_split: bool,
    after_merge: bool,
    workchain: i32,
    shard: u64,
) -> Result<Vec<FullBlockId>> {
    match (prev, after_merge) {
        (BlkPrevInfo::PrevBlkInfo { prev }, false) => {
            let shard = if after_split { shard_parent(shard) } else { shard };
            Ok(vec![FullBlockId::from_ext_ref(workchain, shard, prev)])
        }
        (BlkPrevInfo::PrevBlksInfo { prev1, prev2 }, true) => Ok(vec![
            FullBlockId::from_ext_ref(workchain, shard_child(shard, true), prev1),
            FullBlockId::from_ext_ref(workchain, shard_child(shard, false), prev2),
        ]),
        (BlkPrevInfo::PrevBlksInfo { .. }, false) => {
            bail!("two parent blocks may be only after merge")
        }
        (BlkPrevInfo::PrevBlkInfo { .. }, true) => bail!("two parent blocks must be after merge"),
    }
}

/// Ids of the blocks this block was built on top of
pub fn get_parents(info: &BlockInfo) -> Result<Vec<FullBlockId>> {
    parents_of(
        &info.prev_ref,
        info.after_split,
        info.after_merge,
        info.shard.workchain_id,
        info.shard.shard(),
    )
}

/// Ids of the shard blocks a masterchain block refers to, skipping
/// shards that have not produced a block yet
pub fn shard_ids(block: &Block) -> Vec<FullBlockId> {
    let Some(custom) = &block.extra.custom else {
        return Vec::new();
    };
    custom
        .shard_hashes
        .iter()
        .flat_map(|(workchain, tree)| {
            tree.0
                .iter()
                .filter(|desc| desc.seq_no() != 0)
                .map(|desc| desc.to_block_id(*workchain))
        })
        .collect()
}
