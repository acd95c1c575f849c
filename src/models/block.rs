//! Blocks
//!
//! ```text
//! block#11ef55aa global_id:int32 info:^BlockInfo value_flow:^ValueFlow
//!   state_update:^(MERKLE_UPDATE ShardState) extra:^BlockExtra = Block;
//! ```
//!
//! Message descriptors are kept as cells and decoded on demand, they are the
//! largest part of a block and most readers only need the transactions.

use crate::cell::{Cell, CellBuilder, Slice};
use crate::models::currency::CurrencyCollection;
use crate::models::message::{ImportFees, InMsg, OutMsg};
use crate::models::shard::{FullBlockId, ShardIdent};
use crate::models::transaction::{HashUpdate, Transaction};
use crate::tlb::{
    Any, AugExtra, BinTree, Bits96, Bits256, Decoder, Encoder, Hashmap, HashmapAug, HashmapAugE,
    HashmapE, MerkleUpdate, Ref, TlbDecode, TlbEncode, TlbError, TlbResult, Uint, expect_magic,
    match_tag, unmarshal, write_tag,
};
use serde::Serialize;
use std::sync::Arc;

const BLOCK_INFO_TAG: &str = "block_info#9bc7a987";
const VALUE_FLOW_TAG: &str = "value_flow#b8e48dfb";
const VALUE_FLOW_V2_TAG: &str = "value_flow_v2#3ebf98b7";
const MC_BLOCK_EXTRA_TAG: &str = "masterchain_block_extra#cca5";

/// `_ (HashmapAugE 256 InMsg ImportFees) = InMsgDescr;`
pub type InMsgDescr = HashmapAugE<Bits256, InMsg, ImportFees>;
/// `_ (HashmapAugE 256 OutMsg CurrencyCollection) = OutMsgDescr;`
pub type OutMsgDescr = HashmapAugE<Bits256, OutMsg, CurrencyCollection>;
/// `_ (HashmapAugE 256 AccountBlock CurrencyCollection) = ShardAccountBlocks;`
pub type ShardAccountBlocks = HashmapAugE<Bits256, AccountBlock, CurrencyCollection>;
/// `_ (HashmapAugE 96 ShardFeeCreated ShardFeeCreated) = ShardFees;`
pub type ShardFees = HashmapAugE<Bits96, ShardFeeCreated, ShardFeeCreated>;
/// `_ (HashmapE 32 ^(BinTree ShardDescr)) = ShardHashes;`
pub type ShardHashes = HashmapE<i32, Ref<BinTree<ShardDesc>>>;

tlb_struct! {
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Block: "block#11ef55aa" {
        pub global_id: i32,
        pub info: BlockInfo => "^",
        pub value_flow: ValueFlow => "^",
        pub state_update: Any => "^",
        pub extra: BlockExtra => "^",
    }
}

impl Block {
    /// Number of transactions over all account blocks
    pub fn transactions_quantity(&self) -> usize {
        self.extra
            .account_blocks
            .values()
            .map(|account_block| account_block.transactions.len())
            .sum()
    }

    /// Every transaction of the block, ordered by logical time
    pub fn all_transactions(&self) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self
            .extra
            .account_blocks
            .values()
            .flat_map(|account_block| account_block.transactions.values().map(|tx| &tx.0))
            .collect();
        transactions.sort_by_key(|tx| tx.lt);
        transactions
    }

    /// The shard state update; untouched subtrees come back as pruned cells
    pub fn state_update(&self) -> TlbResult<MerkleUpdate<Any>> {
        unmarshal(self.state_update.cell())
    }
}

/// ```text
/// block_info#9bc7a987 version:uint32 not_master:(## 1) after_merge:(## 1)
///   before_split:(## 1) after_split:(## 1) want_split:Bool want_merge:Bool
///   key_block:Bool vert_seqno_incr:(## 1) flags:(## 8) { flags <= 1 }
///   seq_no:# vert_seq_no:# shard:ShardIdent gen_utime:uint32
///   start_lt:uint64 end_lt:uint64 gen_validator_list_hash_short:uint32
///   gen_catchain_seqno:uint32 min_ref_mc_seqno:uint32 prev_key_block_seqno:uint32
///   gen_software:flags . 0?GlobalVersion master_ref:not_master?^BlkMasterInfo
///   prev_ref:^(BlkPrevInfo after_merge) prev_vert_ref:vert_seqno_incr?^(BlkPrevInfo 0)
///   = BlockInfo;
/// ```
///
/// The optional tail is driven by the flags, so encoding fails when a part is
/// present without its flag or the other way around.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockInfo {
    pub version: u32,
    pub not_master: bool,
    pub after_merge: bool,
    pub before_split: bool,
    pub after_split: bool,
    pub want_split: bool,
    pub want_merge: bool,
    pub key_block: bool,
    pub vert_seqno_incr: bool,
    pub flags: u8,
    pub seq_no: u32,
    pub vert_seq_no: u32,
    pub shard: ShardIdent,
    pub gen_utime: u32,
    pub start_lt: u64,
    pub end_lt: u64,
    pub gen_validator_list_hash_short: u32,
    pub gen_catchain_seqno: u32,
    pub min_ref_mc_seqno: u32,
    pub prev_key_block_seqno: u32,
    pub gen_software: Option<GlobalVersion>,
    pub master_ref: Option<BlkMasterInfo>,
    pub prev_ref: BlkPrevInfo,
    pub prev_vert_ref: Option<BlkPrevInfo>,
}

impl TlbDecode for BlockInfo {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        expect_magic(slice, BLOCK_INFO_TAG)?;
        let version = decoder.decode_field(slice, "version", None)?;
        let not_master: bool = decoder.decode_field(slice, "not_master", None)?;
        let after_merge: bool = decoder.decode_field(slice, "after_merge", None)?;
        let before_split = decoder.decode_field(slice, "before_split", None)?;
        let after_split = decoder.decode_field(slice, "after_split", None)?;
        let want_split = decoder.decode_field(slice, "want_split", None)?;
        let want_merge = decoder.decode_field(slice, "want_merge", None)?;
        let key_block = decoder.decode_field(slice, "key_block", None)?;
        let vert_seqno_incr: bool = decoder.decode_field(slice, "vert_seqno_incr", None)?;
        let flags: u8 = decoder.decode_field(slice, "flags", None)?;
        let seq_no = decoder.decode_field(slice, "seq_no", None)?;
        let vert_seq_no = decoder.decode_field(slice, "vert_seq_no", None)?;
        let shard = decoder.decode_field(slice, "shard", None)?;
        let gen_utime = decoder.decode_field(slice, "gen_utime", None)?;
        let start_lt = decoder.decode_field(slice, "start_lt", None)?;
        let end_lt = decoder.decode_field(slice, "end_lt", None)?;
        let gen_validator_list_hash_short =
            decoder.decode_field(slice, "gen_validator_list_hash_short", None)?;
        let gen_catchain_seqno = decoder.decode_field(slice, "gen_catchain_seqno", None)?;
        let min_ref_mc_seqno = decoder.decode_field(slice, "min_ref_mc_seqno", None)?;
        let prev_key_block_seqno = decoder.decode_field(slice, "prev_key_block_seqno", None)?;

        let gen_software = match flags & 1 {
            1 => Some(decoder.decode_field(slice, "gen_software", None)?),
            _ => None,
        };
        let master_ref = match not_master {
            true => Some(decoder.decode_field(slice, "master_ref", Some("^"))?),
            false => None,
        };
        let prev_ref = BlkPrevInfo::decode_ref(slice, decoder, after_merge)?;
        let prev_vert_ref = match vert_seqno_incr {
            true => Some(BlkPrevInfo::decode_ref(slice, decoder, false)?),
            false => None,
        };

        Ok(Self {
            version,
            not_master,
            after_merge,
            before_split,
            after_split,
            want_split,
            want_merge,
            key_block,
            vert_seqno_incr,
            flags,
            seq_no,
            vert_seq_no,
            shard,
            gen_utime,
            start_lt,
            end_lt,
            gen_validator_list_hash_short,
            gen_catchain_seqno,
            min_ref_mc_seqno,
            prev_key_block_seqno,
            gen_software,
            master_ref,
            prev_ref,
            prev_vert_ref,
        })
    }
}

impl BlockInfo {
    fn check_layout(&self) -> TlbResult<()> {
        let mismatch = |what: &str| {
            Err(TlbError::InvalidData(format!(
                "block info {what} does not agree with its flags"
            )))
        };
        if self.gen_software.is_some() != (self.flags & 1 == 1) {
            return mismatch("gen_software");
        }
        if self.master_ref.is_some() != self.not_master {
            return mismatch("master_ref");
        }
        if self.prev_ref.is_merge() != self.after_merge {
            return mismatch("prev_ref");
        }
        match &self.prev_vert_ref {
            Some(prev) if !self.vert_seqno_incr || prev.is_merge() => mismatch("prev_vert_ref"),
            None if self.vert_seqno_incr => mismatch("prev_vert_ref"),
            _ => Ok(()),
        }
    }
}

impl TlbEncode for BlockInfo {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        self.check_layout()?;
        write_tag(builder, BLOCK_INFO_TAG)?;
        encoder.encode_field(builder, "version", &self.version, None)?;
        encoder.encode_field(builder, "not_master", &self.not_master, None)?;
        encoder.encode_field(builder, "after_merge", &self.after_merge, None)?;
        encoder.encode_field(builder, "before_split", &self.before_split, None)?;
        encoder.encode_field(builder, "after_split", &self.after_split, None)?;
        encoder.encode_field(builder, "want_split", &self.want_split, None)?;
        encoder.encode_field(builder, "want_merge", &self.want_merge, None)?;
        encoder.encode_field(builder, "key_block", &self.key_block, None)?;
        encoder.encode_field(builder, "vert_seqno_incr", &self.vert_seqno_incr, None)?;
        encoder.encode_field(builder, "flags", &self.flags, None)?;
        encoder.encode_field(builder, "seq_no", &self.seq_no, None)?;
        encoder.encode_field(builder, "vert_seq_no", &self.vert_seq_no, None)?;
        encoder.encode_field(builder, "shard", &self.shard, None)?;
        encoder.encode_field(builder, "gen_utime", &self.gen_utime, None)?;
        encoder.encode_field(builder, "start_lt", &self.start_lt, None)?;
        encoder.encode_field(builder, "end_lt", &self.end_lt, None)?;
        encoder.encode_field(
            builder,
            "gen_validator_list_hash_short",
            &self.gen_validator_list_hash_short,
            None,
        )?;
        encoder.encode_field(builder, "gen_catchain_seqno", &self.gen_catchain_seqno, None)?;
        encoder.encode_field(builder, "min_ref_mc_seqno", &self.min_ref_mc_seqno, None)?;
        encoder.encode_field(builder, "prev_key_block_seqno", &self.prev_key_block_seqno, None)?;

        if let Some(gen_software) = &self.gen_software {
            encoder.encode_field(builder, "gen_software", gen_software, None)?;
        }
        if let Some(master_ref) = &self.master_ref {
            encoder.encode_field(builder, "master_ref", master_ref, Some("^"))?;
        }
        self.prev_ref.encode_ref(builder, encoder)?;
        if let Some(prev_vert_ref) = &self.prev_vert_ref {
            prev_vert_ref.encode_ref(builder, encoder)?;
        }
        Ok(())
    }
}

tlb_struct! {
    /// `capabilities#c4 version:uint32 capabilities:uint64 = GlobalVersion;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct GlobalVersion: "capabilities#c4" {
        pub version: u32,
        pub capabilities: u64,
    }
}

tlb_struct! {
    /// `ext_blk_ref$_ end_lt:uint64 seq_no:uint32 root_hash:bits256 file_hash:bits256 = ExtBlkRef;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct ExtBlkRef {
        pub end_lt: u64,
        pub seq_no: u32,
        pub root_hash: Bits256,
        pub file_hash: Bits256,
    }
}

tlb_struct! {
    /// `master_info$_ master:ExtBlkRef = BlkMasterInfo;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct BlkMasterInfo {
        pub master: ExtBlkRef,
    }
}

/// ```text
/// prev_blk_info$_ prev:ExtBlkRef = BlkPrevInfo 0;
/// prev_blks_info$_ prev1:^ExtBlkRef prev2:^ExtBlkRef = BlkPrevInfo 1;
/// ```
///
/// The variant is chosen by the `after_merge` flag of the enclosing
/// [`BlockInfo`], not by a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlkPrevInfo {
    PrevBlkInfo { prev: ExtBlkRef },
    PrevBlksInfo { prev1: ExtBlkRef, prev2: ExtBlkRef },
}

impl BlkPrevInfo {
    pub fn sum_type(&self) -> &'static str {
        match self {
            BlkPrevInfo::PrevBlkInfo { .. } => "PrevBlkInfo",
            BlkPrevInfo::PrevBlksInfo { .. } => "PrevBlksInfo",
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, BlkPrevInfo::PrevBlksInfo { .. })
    }

    fn decode_ref(slice: &mut Slice, decoder: &mut Decoder, after_merge: bool) -> TlbResult<Self> {
        let cell = slice.load_reference()?;
        let mut inner = decoder.open::<ExtBlkRef>(&cell)?;
        if after_merge {
            Ok(BlkPrevInfo::PrevBlksInfo {
                prev1: decoder.decode_field(&mut inner, "prev1", Some("^"))?,
                prev2: decoder.decode_field(&mut inner, "prev2", Some("^"))?,
            })
        } else {
            Ok(BlkPrevInfo::PrevBlkInfo {
                prev: decoder.decode_field(&mut inner, "prev", None)?,
            })
        }
    }

    fn encode_ref(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        let mut inner = CellBuilder::new();
        match self {
            BlkPrevInfo::PrevBlkInfo { prev } => {
                encoder.encode_field(&mut inner, "prev", prev, None)?;
            }
            BlkPrevInfo::PrevBlksInfo { prev1, prev2 } => {
                encoder.encode_field(&mut inner, "prev1", prev1, Some("^"))?;
                encoder.encode_field(&mut inner, "prev2", prev2, Some("^"))?;
            }
        }
        builder.store_reference(inner.build()?)?;
        Ok(())
    }
}

/// ```text
/// value_flow#b8e48dfb ^[ from_prev_blk:CurrencyCollection to_next_blk:CurrencyCollection
///   imported:CurrencyCollection exported:CurrencyCollection ]
///   fees_collected:CurrencyCollection
///   ^[ fees_imported:CurrencyCollection recovered:CurrencyCollection
///   created:CurrencyCollection minted:CurrencyCollection ] = ValueFlow;
/// value_flow_v2#3ebf98b7 ... fees_collected:CurrencyCollection burned:CurrencyCollection ... = ValueFlow;
/// ```
///
/// `burned` is set exactly for the second version.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValueFlow {
    pub from_prev_blk: CurrencyCollection,
    pub to_next_blk: CurrencyCollection,
    pub imported: CurrencyCollection,
    pub exported: CurrencyCollection,
    pub fees_collected: CurrencyCollection,
    pub burned: Option<CurrencyCollection>,
    pub fees_imported: CurrencyCollection,
    pub recovered: CurrencyCollection,
    pub created: CurrencyCollection,
    pub minted: CurrencyCollection,
}

impl TlbDecode for ValueFlow {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let v2 = if match_tag(slice, VALUE_FLOW_TAG)? {
            false
        } else if match_tag(slice, VALUE_FLOW_V2_TAG)? {
            true
        } else {
            return Err(TlbError::SumTypeMismatch {
                type_name: "ValueFlow",
            });
        };

        let first = slice.load_reference()?;
        let mut first = decoder.open::<CurrencyCollection>(&first)?;
        let from_prev_blk = decoder.decode_field(&mut first, "from_prev_blk", None)?;
        let to_next_blk = decoder.decode_field(&mut first, "to_next_blk", None)?;
        let imported = decoder.decode_field(&mut first, "imported", None)?;
        let exported = decoder.decode_field(&mut first, "exported", None)?;

        let fees_collected = decoder.decode_field(slice, "fees_collected", None)?;
        let burned = match v2 {
            true => Some(decoder.decode_field(slice, "burned", None)?),
            false => None,
        };

        let second = slice.load_reference()?;
        let mut second = decoder.open::<CurrencyCollection>(&second)?;
        Ok(Self {
            from_prev_blk,
            to_next_blk,
            imported,
            exported,
            fees_collected,
            burned,
            fees_imported: decoder.decode_field(&mut second, "fees_imported", None)?,
            recovered: decoder.decode_field(&mut second, "recovered", None)?,
            created: decoder.decode_field(&mut second, "created", None)?,
            minted: decoder.decode_field(&mut second, "minted", None)?,
        })
    }
}

impl TlbEncode for ValueFlow {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self.burned {
            Some(_) => write_tag(builder, VALUE_FLOW_V2_TAG)?,
            None => write_tag(builder, VALUE_FLOW_TAG)?,
        }

        let mut first = CellBuilder::new();
        encoder.encode_field(&mut first, "from_prev_blk", &self.from_prev_blk, None)?;
        encoder.encode_field(&mut first, "to_next_blk", &self.to_next_blk, None)?;
        encoder.encode_field(&mut first, "imported", &self.imported, None)?;
        encoder.encode_field(&mut first, "exported", &self.exported, None)?;
        builder.store_reference(first.build()?)?;

        encoder.encode_field(builder, "fees_collected", &self.fees_collected, None)?;
        if let Some(burned) = &self.burned {
            encoder.encode_field(builder, "burned", burned, None)?;
        }

        let mut second = CellBuilder::new();
        encoder.encode_field(&mut second, "fees_imported", &self.fees_imported, None)?;
        encoder.encode_field(&mut second, "recovered", &self.recovered, None)?;
        encoder.encode_field(&mut second, "created", &self.created, None)?;
        encoder.encode_field(&mut second, "minted", &self.minted, None)?;
        builder.store_reference(second.build()?)?;
        Ok(())
    }
}

tlb_struct! {
    /// ```text
    /// block_extra in_msg_descr:^InMsgDescr out_msg_descr:^OutMsgDescr
    ///   account_blocks:^ShardAccountBlocks rand_seed:bits256 created_by:bits256
    ///   custom:(Maybe ^McBlockExtra) = BlockExtra;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct BlockExtra: "block_extra#4a33f6fd" {
        pub in_msg_descr: Any => "^",
        pub out_msg_descr: Any => "^",
        pub account_blocks: ShardAccountBlocks => "^",
        pub rand_seed: Bits256,
        pub created_by: Bits256,
        pub custom: Option<McBlockExtra> => "maybe ^",
    }
}

impl BlockExtra {
    pub fn in_msg_descr(&self) -> TlbResult<InMsgDescr> {
        unmarshal(self.in_msg_descr.cell())
    }

    pub fn out_msg_descr(&self) -> TlbResult<OutMsgDescr> {
        unmarshal(self.out_msg_descr.cell())
    }

    /// Number of inbound messages, without decoding them
    pub fn in_msg_descr_len(&self) -> TlbResult<usize> {
        InMsgDescr::count_leaves(&mut self.in_msg_descr.cell().as_slice())
    }

    /// Number of outbound messages, without decoding them
    pub fn out_msg_descr_len(&self) -> TlbResult<usize> {
        OutMsgDescr::count_leaves(&mut self.out_msg_descr.cell().as_slice())
    }
}

tlb_struct! {
    /// ```text
    /// acc_trans#5 account_addr:bits256
    ///   transactions:(HashmapAug 64 ^Transaction CurrencyCollection)
    ///   state_update:^(HASH_UPDATE Account) = AccountBlock;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct AccountBlock: "acc_trans#5" {
        pub account_addr: Bits256,
        pub transactions: HashmapAug<u64, Ref<Transaction>, CurrencyCollection>,
        pub state_update: HashUpdate => "^",
    }
}

/// ```text
/// masterchain_block_extra#cca5 key_block:(## 1) shard_hashes:ShardHashes
///   shard_fees:ShardFees
///   ^[ prev_blk_signatures:(HashmapE 16 CryptoSignaturePair)
///      recover_create_msg:(Maybe ^InMsg) mint_msg:(Maybe ^InMsg) ]
///   config:key_block?ConfigParams = McBlockExtra;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McBlockExtra {
    pub key_block: bool,
    pub shard_hashes: ShardHashes,
    pub shard_fees: ShardFees,
    pub other: Option<McExtraOther>,
    pub config: Option<ConfigParams>,
}

impl TlbDecode for McBlockExtra {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        expect_magic(slice, MC_BLOCK_EXTRA_TAG)?;
        let key_block: bool = decoder.decode_field(slice, "key_block", None)?;
        let shard_hashes = decoder.decode_field(slice, "shard_hashes", None)?;
        let shard_fees = decoder.decode_field(slice, "shard_fees", None)?;
        // the config dictionary takes the last ref of a key block
        let other = match slice.remaining_refs() > usize::from(key_block) {
            true => Some(decoder.decode_field(slice, "other", Some("^"))?),
            false => None,
        };
        let config = match key_block {
            true => Some(decoder.decode_field(slice, "config", None)?),
            false => None,
        };
        Ok(Self {
            key_block,
            shard_hashes,
            shard_fees,
            other,
            config,
        })
    }
}

impl TlbEncode for McBlockExtra {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        if self.config.is_some() != self.key_block {
            return Err(TlbError::InvalidData(
                "config params must be present exactly in key blocks".to_string(),
            ));
        }
        write_tag(builder, MC_BLOCK_EXTRA_TAG)?;
        encoder.encode_field(builder, "key_block", &self.key_block, None)?;
        encoder.encode_field(builder, "shard_hashes", &self.shard_hashes, None)?;
        encoder.encode_field(builder, "shard_fees", &self.shard_fees, None)?;
        if let Some(other) = &self.other {
            encoder.encode_field(builder, "other", other, Some("^"))?;
        }
        if let Some(config) = &self.config {
            encoder.encode_field(builder, "config", config, None)?;
        }
        Ok(())
    }
}

tlb_struct! {
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct McExtraOther {
        pub prev_blk_signatures: HashmapE<u16, CryptoSignaturePair>,
        pub recover_create_msg: Option<InMsg> => "maybe ^",
        pub mint_msg: Option<InMsg> => "maybe ^",
    }
}

tlb_struct! {
    /// `_ config_addr:bits256 config:^(Hashmap 32 ^Cell) = ConfigParams;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct ConfigParams {
        pub config_addr: Bits256,
        pub config: Hashmap<u32, Ref<Any>> => "^",
    }
}

impl ConfigParams {
    /// Raw cell of config parameter `id`
    pub fn param(&self, id: u32) -> Option<&Arc<Cell>> {
        self.config.get(&id).map(|param| param.0.cell())
    }
}

tlb_struct! {
    /// `_ fees:CurrencyCollection create:CurrencyCollection = ShardFeeCreated;`
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct ShardFeeCreated {
        pub fees: CurrencyCollection,
        pub create: CurrencyCollection,
    }
}

impl AugExtra for ShardFeeCreated {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self> {
        Ok(Self {
            fees: left.fees.checked_add(&right.fees)?,
            create: left.create.checked_add(&right.create)?,
        })
    }
}

tlb_struct! {
    /// `sig_pair$_ node_id_short:bits256 sign:CryptoSignature = CryptoSignaturePair;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct CryptoSignaturePair {
        pub node_id_short: Bits256,
        pub sign: CryptoSignature,
    }
}

tlb_struct! {
    /// `ed25519_signature#5 R:bits256 s:bits256 = CryptoSignatureSimple;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct CryptoSignature: "ed25519_signature#5" {
        pub r: Bits256,
        pub s: Bits256,
    }
}

tlb_sum! {
    /// ```text
    /// fsm_none$0 = FutureSplitMerge;
    /// fsm_split$10 split_utime:uint32 interval:uint32 = FutureSplitMerge;
    /// fsm_merge$11 merge_utime:uint32 interval:uint32 = FutureSplitMerge;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum FutureSplitMerge {
        None: "fsm_none$0",
        Split: "fsm_split$10" { split_utime: u32, interval: u32 },
        Merge: "fsm_merge$11" { merge_utime: u32, interval: u32 },
    }
}

tlb_struct! {
    /// Fields shared by both shard description layouts
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct ShardDescInfo {
        pub seq_no: u32,
        pub reg_mc_seqno: u32,
        pub start_lt: u64,
        pub end_lt: u64,
        pub root_hash: Bits256,
        pub file_hash: Bits256,
        pub before_split: bool,
        pub before_merge: bool,
        pub want_split: bool,
        pub want_merge: bool,
        pub nx_cc_updated: bool,
        pub flags: Uint<3>,
        pub next_catchain_seqno: u32,
        pub next_validator_shard: u64,
        pub min_ref_mc_seqno: u32,
        pub gen_utime: u32,
        pub split_merge_at: FutureSplitMerge,
    }
}

tlb_struct! {
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct ShardDescFees {
        pub fees_collected: CurrencyCollection,
        pub funds_created: CurrencyCollection,
    }
}

tlb_sum! {
    /// ```text
    /// shard_descr#b seq_no:uint32 reg_mc_seqno:uint32 ... split_merge_at:FutureSplitMerge
    ///   fees_collected:CurrencyCollection funds_created:CurrencyCollection = ShardDescr;
    /// shard_descr_new#a seq_no:uint32 reg_mc_seqno:uint32 ... split_merge_at:FutureSplitMerge
    ///   ^[ fees_collected:CurrencyCollection funds_created:CurrencyCollection ] = ShardDescr;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum ShardDesc {
        Old: "shard_descr#b" { info: ShardDescInfo, fees: ShardDescFees },
        New: "shard_descr_new#a" { info: ShardDescInfo, fees: ShardDescFees => "^" },
    }
}

impl ShardDesc {
    pub fn info(&self) -> &ShardDescInfo {
        match self {
            ShardDesc::Old { info, .. } | ShardDesc::New { info, .. } => info,
        }
    }

    pub fn fees(&self) -> &ShardDescFees {
        match self {
            ShardDesc::Old { fees, .. } | ShardDesc::New { fees, .. } => fees,
        }
    }

    pub fn seq_no(&self) -> u32 {
        self.info().seq_no
    }

    /// Id of the described shard block
    pub fn to_block_id(&self, workchain: i32) -> FullBlockId {
        let info = self.info();
        FullBlockId {
            workchain,
            shard: info.next_validator_shard,
            seqno: info.seq_no,
            root_hash: info.root_hash,
            file_hash: info.file_hash,
        }
    }
}

tlb_struct! {
    /// `block_id_ext$_ shard_id:ShardIdent seq_no:uint32 root_hash:bits256 file_hash:bits256 = BlockIdExt;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct BlockIdExt {
        pub shard_id: ShardIdent,
        pub seq_no: u32,
        pub root_hash: Bits256,
        pub file_hash: Bits256,
    }
}

impl BlockIdExt {
    pub fn from_full_id(id: &FullBlockId) -> TlbResult<Self> {
        Ok(Self {
            shard_id: ShardIdent::from_shard(id.workchain, id.shard)?,
            seq_no: id.seqno,
            root_hash: id.root_hash,
            file_hash: id.file_hash,
        })
    }

    pub fn to_full_id(&self) -> FullBlockId {
        FullBlockId {
            workchain: self.shard_id.workchain_id,
            shard: self.shard_id.shard(),
            seqno: self.seq_no,
            root_hash: self.root_hash,
            file_hash: self.file_hash,
        }
    }
}
