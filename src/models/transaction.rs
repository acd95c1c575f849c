//! Transactions and their phases

use crate::cell::{Cell, CellBuilder, Slice, serialize_boc};
use crate::models::account::AccountStatus;
use crate::models::currency::CurrencyCollection;
use crate::models::message::Message;
use crate::tlb::bigint::{VarUInteger3, VarUInteger7};
use crate::tlb::{
    Any, Bits256, Decoder, Encoder, Grams, HashmapE, Ref, TlbDecode, TlbEncode, TlbResult, Uint,
    expect_magic, write_tag,
};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::sync::Arc;

const TRANSACTION_TAG: &str = "transaction$0111";

/// ```text
/// transaction$0111 account_addr:bits256 lt:uint64
///   prev_trans_hash:bits256 prev_trans_lt:uint64 now:uint32
///   outmsg_cnt:uint15
///   orig_status:AccountStatus end_status:AccountStatus
///   ^[ in_msg:(Maybe ^(Message Any)) out_msgs:(HashmapE 15 ^(Message Any)) ]
///   total_fees:CurrencyCollection state_update:^(HASH_UPDATE Account)
///   description:^TransactionDescr = Transaction;
/// ```
///
/// A decoded transaction remembers its hash and the cell it came from, so
/// the exact source bytes can be reproduced without re-encoding.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub account_addr: Bits256,
    pub lt: u64,
    pub prev_trans_hash: Bits256,
    pub prev_trans_lt: u64,
    pub now: u32,
    pub outmsg_cnt: Uint<15>,
    pub orig_status: AccountStatus,
    pub end_status: AccountStatus,
    pub msgs: TransactionMsgs,
    pub total_fees: CurrencyCollection,
    pub state_update: HashUpdate,
    pub description: TransactionDescr,
    #[serde(skip)]
    hash: Bits256,
    #[serde(skip)]
    source: Option<Arc<Cell>>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_addr: Bits256,
        lt: u64,
        prev_trans_hash: Bits256,
        prev_trans_lt: u64,
        now: u32,
        orig_status: AccountStatus,
        end_status: AccountStatus,
        msgs: TransactionMsgs,
        total_fees: CurrencyCollection,
        state_update: HashUpdate,
        description: TransactionDescr,
    ) -> Self {
        Self {
            account_addr,
            lt,
            prev_trans_hash,
            prev_trans_lt,
            now,
            outmsg_cnt: Uint(msgs.out_msgs.len() as u64),
            orig_status,
            end_status,
            msgs,
            total_fees,
            state_update,
            description,
            hash: Bits256::default(),
            source: None,
        }
    }

    pub fn hash(&self) -> Bits256 {
        self.hash
    }

    /// Bag of cells of the cell this transaction was decoded from
    pub fn source_boc(&self) -> Result<Vec<u8>> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| anyhow!("transaction was not decoded from a cell"))?;
        serialize_boc(source, false)
    }

    pub fn in_msg(&self) -> Option<&Message> {
        self.msgs.in_msg.as_ref()
    }

    pub fn out_msgs(&self) -> impl Iterator<Item = &Message> {
        self.msgs.out_msgs.values().map(|m| &m.0)
    }

    /// Whether the compute and action phases went through and nothing bounced.
    /// Only ordinary and tick-tock transactions are inspected.
    pub fn is_success(&self) -> bool {
        match &self.description {
            TransactionDescr::TransOrd {
                compute_ph,
                action,
                bounce,
                ..
            } => bounce.is_none() && phases_succeeded(compute_ph, action.as_ref()),
            TransactionDescr::TransTickTock {
                compute_ph, action, ..
            } => phases_succeeded(compute_ph, action.as_ref()),
            _ => true,
        }
    }
}

fn phases_succeeded(compute: &TrComputePhase, action: Option<&TrActionPhase>) -> bool {
    match compute {
        TrComputePhase::TrPhaseComputeSkipped { reason } => {
            if *reason != ComputeSkipReason::NoState {
                return false;
            }
        }
        TrComputePhase::TrPhaseComputeVm { success, vm, .. } => {
            if !success || (vm.exit_code != 0 && vm.exit_code != 1) {
                return false;
            }
        }
    }
    action.is_none_or(|action| action.success)
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.account_addr == other.account_addr
            && self.lt == other.lt
            && self.prev_trans_hash == other.prev_trans_hash
            && self.prev_trans_lt == other.prev_trans_lt
            && self.now == other.now
            && self.outmsg_cnt == other.outmsg_cnt
            && self.orig_status == other.orig_status
            && self.end_status == other.end_status
            && self.msgs == other.msgs
            && self.total_fees == other.total_fees
            && self.state_update == other.state_update
            && self.description == other.description
    }
}

impl TlbDecode for Transaction {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let source = slice.to_cell()?;
        let hash = Bits256(source.hash());
        expect_magic(slice, TRANSACTION_TAG)?;
        Ok(Self {
            account_addr: decoder.decode_field(slice, "account_addr", None)?,
            lt: decoder.decode_field(slice, "lt", None)?,
            prev_trans_hash: decoder.decode_field(slice, "prev_trans_hash", None)?,
            prev_trans_lt: decoder.decode_field(slice, "prev_trans_lt", None)?,
            now: decoder.decode_field(slice, "now", None)?,
            outmsg_cnt: decoder.decode_field(slice, "outmsg_cnt", None)?,
            orig_status: decoder.decode_field(slice, "orig_status", None)?,
            end_status: decoder.decode_field(slice, "end_status", None)?,
            msgs: decoder.decode_field(slice, "msgs", Some("^"))?,
            total_fees: decoder.decode_field(slice, "total_fees", None)?,
            state_update: decoder.decode_field(slice, "state_update", Some("^"))?,
            description: decoder.decode_field(slice, "description", Some("^"))?,
            hash,
            source: Some(source),
        })
    }
}

impl TlbEncode for Transaction {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        write_tag(builder, TRANSACTION_TAG)?;
        encoder.encode_field(builder, "account_addr", &self.account_addr, None)?;
        encoder.encode_field(builder, "lt", &self.lt, None)?;
        encoder.encode_field(builder, "prev_trans_hash", &self.prev_trans_hash, None)?;
        encoder.encode_field(builder, "prev_trans_lt", &self.prev_trans_lt, None)?;
        encoder.encode_field(builder, "now", &self.now, None)?;
        encoder.encode_field(builder, "outmsg_cnt", &self.outmsg_cnt, None)?;
        encoder.encode_field(builder, "orig_status", &self.orig_status, None)?;
        encoder.encode_field(builder, "end_status", &self.end_status, None)?;
        encoder.encode_field(builder, "msgs", &self.msgs, Some("^"))?;
        encoder.encode_field(builder, "total_fees", &self.total_fees, None)?;
        encoder.encode_field(builder, "state_update", &self.state_update, Some("^"))?;
        encoder.encode_field(builder, "description", &self.description, Some("^"))
    }
}

tlb_struct! {
    /// `^[ in_msg:(Maybe ^(Message Any)) out_msgs:(HashmapE 15 ^(Message Any)) ]`
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct TransactionMsgs {
        pub in_msg: Option<Message> => "maybe ^",
        pub out_msgs: HashmapE<Uint<15>, Ref<Message>>,
    }
}

tlb_struct! {
    /// `update_hashes#72 {X:Type} old_hash:bits256 new_hash:bits256 = HASH_UPDATE X;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct HashUpdate: "update_hashes#72" {
        pub old_hash: Bits256,
        pub new_hash: Bits256,
    }
}

tlb_sum! {
    /// ```text
    /// trans_ord$0000 credit_first:Bool storage_ph:(Maybe TrStoragePhase)
    ///   credit_ph:(Maybe TrCreditPhase) compute_ph:TrComputePhase
    ///   action:(Maybe ^TrActionPhase) aborted:Bool bounce:(Maybe TrBouncePhase)
    ///   destroyed:Bool = TransactionDescr;
    /// trans_storage$0001 storage_ph:TrStoragePhase = TransactionDescr;
    /// trans_tick_tock$001 is_tock:Bool storage_ph:TrStoragePhase
    ///   compute_ph:TrComputePhase action:(Maybe ^TrActionPhase)
    ///   aborted:Bool destroyed:Bool = TransactionDescr;
    /// trans_split_prepare$0100 split_info:SplitMergeInfo
    ///   storage_ph:(Maybe TrStoragePhase) compute_ph:TrComputePhase
    ///   action:(Maybe ^TrActionPhase) aborted:Bool destroyed:Bool = TransactionDescr;
    /// trans_split_install$0101 split_info:SplitMergeInfo
    ///   prepare_transaction:^Transaction installed:Bool = TransactionDescr;
    /// trans_merge_prepare$0110 split_info:SplitMergeInfo
    ///   storage_ph:TrStoragePhase aborted:Bool = TransactionDescr;
    /// trans_merge_install$0111 split_info:SplitMergeInfo
    ///   prepare_transaction:^Transaction storage_ph:(Maybe TrStoragePhase)
    ///   credit_ph:(Maybe TrCreditPhase) compute_ph:TrComputePhase
    ///   action:(Maybe ^TrActionPhase) aborted:Bool destroyed:Bool = TransactionDescr;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum TransactionDescr {
        TransOrd: "trans_ord$0000" {
            credit_first: bool,
            storage_ph: Option<TrStoragePhase> => "maybe",
            credit_ph: Option<TrCreditPhase> => "maybe",
            compute_ph: TrComputePhase,
            action: Option<TrActionPhase> => "maybe ^",
            aborted: bool,
            bounce: Option<TrBouncePhase> => "maybe",
            destroyed: bool,
        },
        TransStorage: "trans_storage$0001" {
            storage_ph: TrStoragePhase,
        },
        TransTickTock: "trans_tick_tock$001" {
            is_tock: bool,
            storage_ph: TrStoragePhase,
            compute_ph: TrComputePhase,
            action: Option<TrActionPhase> => "maybe ^",
            aborted: bool,
            destroyed: bool,
        },
        TransSplitPrepare: "trans_split_prepare$0100" {
            split_info: SplitMergeInfo,
            storage_ph: Option<TrStoragePhase> => "maybe",
            compute_ph: TrComputePhase,
            action: Option<TrActionPhase> => "maybe ^",
            aborted: bool,
            destroyed: bool,
        },
        TransSplitInstall: "trans_split_install$0101" {
            split_info: SplitMergeInfo,
            prepare_transaction: Any => "^",
            installed: bool,
        },
        TransMergePrepare: "trans_merge_prepare$0110" {
            split_info: SplitMergeInfo,
            storage_ph: TrStoragePhase,
            aborted: bool,
        },
        TransMergeInstall: "trans_merge_install$0111" {
            split_info: SplitMergeInfo,
            prepare_transaction: Any => "^",
            storage_ph: Option<TrStoragePhase> => "maybe",
            credit_ph: Option<TrCreditPhase> => "maybe",
            compute_ph: TrComputePhase,
            action: Option<TrActionPhase> => "maybe ^",
            aborted: bool,
            destroyed: bool,
        },
    }
}

tlb_struct! {
    /// ```text
    /// split_merge_info$_ cur_shard_pfx_len:(## 6) acc_split_depth:(## 6)
    ///   this_addr:bits256 sibling_addr:bits256 = SplitMergeInfo;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct SplitMergeInfo {
        pub cur_shard_pfx_len: Uint<6>,
        pub acc_split_depth: Uint<6>,
        pub this_addr: Bits256,
        pub sibling_addr: Bits256,
    }
}

tlb_struct! {
    /// ```text
    /// tr_phase_storage$_ storage_fees_collected:Grams
    ///   storage_fees_due:(Maybe Grams) status_change:AccStatusChange = TrStoragePhase;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct TrStoragePhase {
        pub storage_fees_collected: Grams,
        pub storage_fees_due: Option<Grams> => "maybe",
        pub status_change: AccStatusChange,
    }
}

tlb_sum! {
    /// ```text
    /// acst_unchanged$0 = AccStatusChange;  // x -> x
    /// acst_frozen$10 = AccStatusChange;    // init -> frozen
    /// acst_deleted$11 = AccStatusChange;   // frozen -> deleted
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccStatusChange {
        Unchanged: "acst_unchanged$0",
        Frozen: "acst_frozen$10",
        Deleted: "acst_deleted$11",
    }
}

tlb_struct! {
    /// `tr_phase_credit$_ due_fees_collected:(Maybe Grams) credit:CurrencyCollection = TrCreditPhase;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct TrCreditPhase {
        pub due_fees_collected: Option<Grams> => "maybe",
        pub credit: CurrencyCollection,
    }
}

tlb_sum! {
    /// ```text
    /// tr_phase_compute_skipped$0 reason:ComputeSkipReason = TrComputePhase;
    /// tr_phase_compute_vm$1 success:Bool msg_state_used:Bool
    ///   account_activated:Bool gas_fees:Grams ^[ ... ] = TrComputePhase;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum TrComputePhase {
        TrPhaseComputeSkipped: "tr_phase_compute_skipped$0" {
            reason: ComputeSkipReason,
        },
        TrPhaseComputeVm: "tr_phase_compute_vm$1" {
            success: bool,
            msg_state_used: bool,
            account_activated: bool,
            gas_fees: Grams,
            vm: ComputeVmDetails => "^",
        },
    }
}

tlb_struct! {
    /// ```text
    /// ^[ gas_used:(VarUInteger 7) gas_limit:(VarUInteger 7)
    ///   gas_credit:(Maybe (VarUInteger 3)) mode:int8 exit_code:int32
    ///   exit_arg:(Maybe int32) vm_steps:uint32
    ///   vm_init_state_hash:bits256 vm_final_state_hash:bits256 ]
    /// ```
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct ComputeVmDetails {
        pub gas_used: VarUInteger7,
        pub gas_limit: VarUInteger7,
        pub gas_credit: Option<VarUInteger3> => "maybe",
        pub mode: i8,
        pub exit_code: i32,
        pub exit_arg: Option<i32> => "maybe",
        pub vm_steps: u32,
        pub vm_init_state_hash: Bits256,
        pub vm_final_state_hash: Bits256,
    }
}

tlb_sum! {
    /// ```text
    /// cskip_no_state$00 = ComputeSkipReason;
    /// cskip_bad_state$01 = ComputeSkipReason;
    /// cskip_no_gas$10 = ComputeSkipReason;
    /// cskip_suspended$110 = ComputeSkipReason;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ComputeSkipReason {
        NoState: "cskip_no_state$00",
        BadState: "cskip_bad_state$01",
        NoGas: "cskip_no_gas$10",
        Suspended: "cskip_suspended$110",
    }
}

tlb_struct! {
    /// ```text
    /// tr_phase_action$_ success:Bool valid:Bool no_funds:Bool
    ///   status_change:AccStatusChange
    ///   total_fwd_fees:(Maybe Grams) total_action_fees:(Maybe Grams)
    ///   result_code:int32 result_arg:(Maybe int32) tot_actions:uint16
    ///   spec_actions:uint16 skipped_actions:uint16 msgs_created:uint16
    ///   action_list_hash:bits256 tot_msg_size:StorageUsed = TrActionPhase;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct TrActionPhase {
        pub success: bool,
        pub valid: bool,
        pub no_funds: bool,
        pub status_change: AccStatusChange,
        pub total_fwd_fees: Option<Grams> => "maybe",
        pub total_action_fees: Option<Grams> => "maybe",
        pub result_code: i32,
        pub result_arg: Option<i32> => "maybe",
        pub tot_actions: u16,
        pub spec_actions: u16,
        pub skipped_actions: u16,
        pub msgs_created: u16,
        pub action_list_hash: Bits256,
        pub tot_msg_size: StorageUsed,
    }
}

tlb_struct! {
    /// `storage_used$_ cells:(VarUInteger 7) bits:(VarUInteger 7) = StorageUsed;`
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
    pub struct StorageUsed {
        pub cells: VarUInteger7,
        pub bits: VarUInteger7,
    }
}

tlb_sum! {
    /// ```text
    /// tr_phase_bounce_negfunds$00 = TrBouncePhase;
    /// tr_phase_bounce_nofunds$01 msg_size:StorageUsed req_fwd_fees:Grams = TrBouncePhase;
    /// tr_phase_bounce_ok$1 msg_size:StorageUsed msg_fees:Grams fwd_fees:Grams = TrBouncePhase;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum TrBouncePhase {
        TrPhaseBounceNegfunds: "tr_phase_bounce_negfunds$00",
        TrPhaseBounceNofunds: "tr_phase_bounce_nofunds$01" {
            msg_size: StorageUsed,
            req_fwd_fees: Grams,
        },
        TrPhaseBounceOk: "tr_phase_bounce_ok$1" {
            msg_size: StorageUsed,
            msg_fees: Grams,
            fwd_fees: Grams,
        },
    }
}
