//! Messages, envelopes and the in/out message descriptors of a block

use crate::cell::{CellBuilder, Slice};
use crate::models::address::MsgAddress;
use crate::models::currency::CurrencyCollection;
use crate::models::transaction::Transaction;
use crate::tlb::{
    Any, AugExtra, Bits96, Bits256, Bits352, Decoder, EitherRef, Encoder, Grams, HashmapAugE,
    HashmapE, Maybe, TlbDecode, TlbEncode, TlbResult, Uint,
};
use serde::Serialize;

/// ```text
/// message$_ {X:Type} info:CommonMsgInfo
///   init:(Maybe (Either StateInit ^StateInit))
///   body:(Either X ^X) = Message X;
/// ```
///
/// Keeps the hash of the cell it was decoded from.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub info: CommonMsgInfo,
    pub init: Maybe<EitherRef<StateInit>>,
    pub body: EitherRef<Any>,
    #[serde(skip)]
    hash: Bits256,
}

impl Message {
    pub fn new(info: CommonMsgInfo, init: Option<EitherRef<StateInit>>, body: EitherRef<Any>) -> Self {
        Self {
            info,
            init: Maybe(init),
            body,
            hash: Bits256::default(),
        }
    }

    /// Representation hash of the source cell, zero for messages built in code
    pub fn hash(&self) -> Bits256 {
        self.hash
    }

    /// Hash that does not depend on the fields an external message sender
    /// can change without changing its meaning. Other messages keep their
    /// representation hash.
    pub fn normalized_hash(&self) -> TlbResult<Bits256> {
        let CommonMsgInfo::ExtInMsgInfo { dest, .. } = &self.info else {
            return Ok(self.hash);
        };
        let mut encoder = Encoder::new();
        let mut builder = CellBuilder::new();
        // ext_in_msg_info$10 with addr_none source and zero import fee
        builder.store_uint(0b10, 2)?;
        builder.store_uint(0b00, 2)?;
        dest.encode_tlb(&mut builder, &mut encoder)?;
        builder.store_uint(0, 4)?;
        // no init, body always behind a reference
        builder.store_bit(false)?;
        builder.store_bit(true)?;
        builder.store_reference(self.body.value().cell().clone())?;
        Ok(Bits256(builder.build()?.hash()))
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.init == other.init && self.body == other.body
    }
}

impl TlbDecode for Message {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        let hash = Bits256(slice.to_cell()?.hash());
        let info = decoder.decode_field(slice, "info", None)?;
        let init = decoder.decode_field(slice, "init", None)?;
        let body = decoder.decode_field(slice, "body", None)?;
        Ok(Self {
            info,
            init,
            body,
            hash,
        })
    }
}

impl TlbEncode for Message {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        encoder.encode_field(builder, "info", &self.info, None)?;
        encoder.encode_field(builder, "init", &self.init, None)?;
        encoder.encode_field(builder, "body", &self.body, None)
    }
}

tlb_sum! {
    /// ```text
    /// int_msg_info$0 ihr_disabled:Bool bounce:Bool bounced:Bool
    ///   src:MsgAddressInt dest:MsgAddressInt
    ///   value:CurrencyCollection ihr_fee:Grams fwd_fee:Grams
    ///   created_lt:uint64 created_at:uint32 = CommonMsgInfo;
    /// ext_in_msg_info$10 src:MsgAddressExt dest:MsgAddressInt
    ///   import_fee:Grams = CommonMsgInfo;
    /// ext_out_msg_info$11 src:MsgAddressInt dest:MsgAddressExt
    ///   created_lt:uint64 created_at:uint32 = CommonMsgInfo;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum CommonMsgInfo {
        IntMsgInfo: "int_msg_info$0" {
            ihr_disabled: bool,
            bounce: bool,
            bounced: bool,
            src: MsgAddress,
            dest: MsgAddress,
            value: CurrencyCollection,
            ihr_fee: Grams,
            fwd_fee: Grams,
            created_lt: u64,
            created_at: u32,
        },
        ExtInMsgInfo: "ext_in_msg_info$10" {
            src: MsgAddress,
            dest: MsgAddress,
            import_fee: Grams,
        },
        ExtOutMsgInfo: "ext_out_msg_info$11" {
            src: MsgAddress,
            dest: MsgAddress,
            created_lt: u64,
            created_at: u32,
        },
    }
}

impl CommonMsgInfo {
    pub fn src(&self) -> &MsgAddress {
        match self {
            CommonMsgInfo::IntMsgInfo { src, .. }
            | CommonMsgInfo::ExtInMsgInfo { src, .. }
            | CommonMsgInfo::ExtOutMsgInfo { src, .. } => src,
        }
    }

    pub fn dest(&self) -> &MsgAddress {
        match self {
            CommonMsgInfo::IntMsgInfo { dest, .. }
            | CommonMsgInfo::ExtInMsgInfo { dest, .. }
            | CommonMsgInfo::ExtOutMsgInfo { dest, .. } => dest,
        }
    }
}

tlb_struct! {
    /// ```text
    /// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
    ///   code:(Maybe ^Cell) data:(Maybe ^Cell)
    ///   library:(HashmapE 256 SimpleLib) = StateInit;
    /// ```
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct StateInit {
        pub split_depth: Option<Uint<5>> => "maybe",
        pub special: Option<TickTock> => "maybe",
        pub code: Option<Any> => "maybe ^",
        pub data: Option<Any> => "maybe ^",
        pub library: HashmapE<Bits256, SimpleLib>,
    }
}

tlb_struct! {
    /// `tick_tock$_ tick:Bool tock:Bool = TickTock;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct TickTock {
        pub tick: bool,
        pub tock: bool,
    }
}

tlb_struct! {
    /// `simple_lib$_ public:Bool root:^Cell = SimpleLib;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct SimpleLib {
        pub public: bool,
        pub root: Any => "^",
    }
}

tlb_sum! {
    /// ```text
    /// msg_envelope#4 cur_addr:IntermediateAddress
    ///   next_addr:IntermediateAddress fwd_fee_remaining:Grams
    ///   msg:^(Message Any) = MsgEnvelope;
    /// msg_envelope_v2#5 cur_addr:IntermediateAddress
    ///   next_addr:IntermediateAddress fwd_fee_remaining:Grams
    ///   msg:^(Message Any) emitted_lt:(Maybe uint64)
    ///   metadata:(Maybe MsgMetadata) = MsgEnvelope;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum MsgEnvelope {
        V1: "msg_envelope#4" {
            cur_addr: IntermediateAddress,
            next_addr: IntermediateAddress,
            fwd_fee_remaining: Grams,
            msg: Message => "^",
        },
        V2: "msg_envelope_v2#5" {
            cur_addr: IntermediateAddress,
            next_addr: IntermediateAddress,
            fwd_fee_remaining: Grams,
            msg: Message => "^",
            emitted_lt: Option<u64> => "maybe",
            metadata: Option<MsgMetadata> => "maybe",
        },
    }
}

impl MsgEnvelope {
    pub fn message(&self) -> &Message {
        match self {
            MsgEnvelope::V1 { msg, .. } | MsgEnvelope::V2 { msg, .. } => msg,
        }
    }
}

tlb_struct! {
    /// `msg_metadata#0 depth:uint32 initiator_addr:MsgAddressInt initiator_lt:uint64 = MsgMetadata;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct MsgMetadata: "msg_metadata#0" {
        pub depth: u32,
        pub initiator_addr: MsgAddress,
        pub initiator_lt: u64,
    }
}

tlb_sum! {
    /// ```text
    /// interm_addr_regular$0 use_dest_bits:(#<= 96) = IntermediateAddress;
    /// interm_addr_simple$10 workchain_id:int8 addr_pfx:uint64 = IntermediateAddress;
    /// interm_addr_ext$11 workchain_id:int32 addr_pfx:uint64 = IntermediateAddress;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum IntermediateAddress {
        Regular: "interm_addr_regular$0" { use_dest_bits: Uint<7> },
        Simple: "interm_addr_simple$10" { workchain_id: i8, addr_pfx: u64 },
        Ext: "interm_addr_ext$11" { workchain_id: i32, addr_pfx: u64 },
    }
}

tlb_sum! {
    /// ```text
    /// msg_import_ext$000 msg:^(Message Any) transaction:^Transaction = InMsg;
    /// msg_import_ihr$010 msg:^(Message Any) transaction:^Transaction
    ///   ihr_fee:Grams proof_created:^Cell = InMsg;
    /// msg_import_imm$011 in_msg:^MsgEnvelope transaction:^Transaction fwd_fee:Grams = InMsg;
    /// msg_import_fin$100 in_msg:^MsgEnvelope transaction:^Transaction fwd_fee:Grams = InMsg;
    /// msg_import_tr$101 in_msg:^MsgEnvelope out_msg:^MsgEnvelope transit_fee:Grams = InMsg;
    /// msg_discard_fin$110 in_msg:^MsgEnvelope transaction_id:uint64 fwd_fee:Grams = InMsg;
    /// msg_discard_tr$111 in_msg:^MsgEnvelope transaction_id:uint64
    ///   fwd_fee:Grams proof_delivered:^Cell = InMsg;
    /// msg_import_deferred_fin$00100 in_msg:^MsgEnvelope
    ///   transaction:^Transaction fwd_fee:Grams = InMsg;
    /// msg_import_deferred_tr$00101 in_msg:^MsgEnvelope out_msg:^MsgEnvelope = InMsg;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum InMsg {
        MsgImportDeferredFin: "msg_import_deferred_fin$00100" {
            in_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
            fwd_fee: Grams,
        },
        MsgImportDeferredTr: "msg_import_deferred_tr$00101" {
            in_msg: Box<MsgEnvelope> => "^",
            out_msg: Box<MsgEnvelope> => "^",
        },
        MsgImportExt: "msg_import_ext$000" {
            msg: Box<Message> => "^",
            transaction: Box<Transaction> => "^",
        },
        MsgImportIhr: "msg_import_ihr$010" {
            msg: Box<Message> => "^",
            transaction: Box<Transaction> => "^",
            ihr_fee: Grams,
            proof_created: Any => "^",
        },
        MsgImportImm: "msg_import_imm$011" {
            in_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
            fwd_fee: Grams,
        },
        MsgImportFin: "msg_import_fin$100" {
            in_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
            fwd_fee: Grams,
        },
        MsgImportTr: "msg_import_tr$101" {
            in_msg: Box<MsgEnvelope> => "^",
            out_msg: Box<MsgEnvelope> => "^",
            transit_fee: Grams,
        },
        MsgDiscardFin: "msg_discard_fin$110" {
            in_msg: Box<MsgEnvelope> => "^",
            transaction_id: u64,
            fwd_fee: Grams,
        },
        MsgDiscardTr: "msg_discard_tr$111" {
            in_msg: Box<MsgEnvelope> => "^",
            transaction_id: u64,
            fwd_fee: Grams,
            proof_delivered: Any => "^",
        },
    }
}

impl InMsg {
    /// The transaction that processed the message, if the variant carries one
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            InMsg::MsgImportDeferredFin { transaction, .. }
            | InMsg::MsgImportExt { transaction, .. }
            | InMsg::MsgImportIhr { transaction, .. }
            | InMsg::MsgImportImm { transaction, .. }
            | InMsg::MsgImportFin { transaction, .. } => Some(transaction),
            _ => None,
        }
    }
}

tlb_sum! {
    /// ```text
    /// msg_export_ext$000 msg:^(Message Any) transaction:^Transaction = OutMsg;
    /// msg_export_imm$010 out_msg:^MsgEnvelope transaction:^Transaction reimport:^InMsg = OutMsg;
    /// msg_export_new$001 out_msg:^MsgEnvelope transaction:^Transaction = OutMsg;
    /// msg_export_tr$011 out_msg:^MsgEnvelope imported:^InMsg = OutMsg;
    /// msg_export_deq$1100 out_msg:^MsgEnvelope import_block_lt:uint63 = OutMsg;
    /// msg_export_deq_short$1101 msg_env_hash:bits256 next_workchain:int32
    ///   next_addr_pfx:uint64 import_block_lt:uint64 = OutMsg;
    /// msg_export_tr_req$111 out_msg:^MsgEnvelope imported:^InMsg = OutMsg;
    /// msg_export_deq_imm$100 out_msg:^MsgEnvelope reimport:^InMsg = OutMsg;
    /// msg_export_new_defer$10100 out_msg:^MsgEnvelope transaction:^Transaction = OutMsg;
    /// msg_export_deferred_tr$10101 out_msg:^MsgEnvelope imported:^InMsg = OutMsg;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum OutMsg {
        MsgExportExt: "msg_export_ext$000" {
            msg: Box<Message> => "^",
            transaction: Box<Transaction> => "^",
        },
        MsgExportImm: "msg_export_imm$010" {
            out_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
            reimport: Box<InMsg> => "^",
        },
        MsgExportNew: "msg_export_new$001" {
            out_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
        },
        MsgExportTr: "msg_export_tr$011" {
            out_msg: Box<MsgEnvelope> => "^",
            imported: Box<InMsg> => "^",
        },
        MsgExportDeq: "msg_export_deq$1100" {
            out_msg: Box<MsgEnvelope> => "^",
            import_block_lt: Uint<63>,
        },
        MsgExportDeqShort: "msg_export_deq_short$1101" {
            msg_env_hash: Bits256,
            next_workchain: i32,
            next_addr_pfx: u64,
            import_block_lt: u64,
        },
        MsgExportTrReq: "msg_export_tr_req$111" {
            out_msg: Box<MsgEnvelope> => "^",
            imported: Box<InMsg> => "^",
        },
        MsgExportDeqImm: "msg_export_deq_imm$100" {
            out_msg: Box<MsgEnvelope> => "^",
            reimport: Box<InMsg> => "^",
        },
        MsgExportNewDefer: "msg_export_new_defer$10100" {
            out_msg: Box<MsgEnvelope> => "^",
            transaction: Box<Transaction> => "^",
        },
        MsgExportDeferredTr: "msg_export_deferred_tr$10101" {
            out_msg: Box<MsgEnvelope> => "^",
            imported: Box<InMsg> => "^",
        },
    }
}

impl OutMsg {
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            OutMsg::MsgExportExt { transaction, .. }
            | OutMsg::MsgExportImm { transaction, .. }
            | OutMsg::MsgExportNew { transaction, .. }
            | OutMsg::MsgExportNewDefer { transaction, .. } => Some(transaction),
            _ => None,
        }
    }
}

tlb_struct! {
    /// `import_fees$_ fees_collected:Grams value_imported:CurrencyCollection = ImportFees;`
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct ImportFees {
        pub fees_collected: Grams,
        pub value_imported: CurrencyCollection,
    }
}

impl AugExtra for ImportFees {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self> {
        Ok(Self {
            fees_collected: left.fees_collected.checked_add(right.fees_collected)?,
            value_imported: left.value_imported.checked_add(&right.value_imported)?,
        })
    }
}

tlb_struct! {
    /// `_ enqueued_lt:uint64 out_msg:^MsgEnvelope = EnqueuedMsg;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct EnqueuedMsg {
        pub enqueued_lt: u64,
        pub out_msg: MsgEnvelope => "^",
    }
}

tlb_struct! {
    /// `processed_upto$_ last_msg_lt:uint64 last_msg_hash:bits256 = ProcessedUpto;`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct ProcessedUpto {
        pub last_msg_lt: u64,
        pub last_msg_hash: Bits256,
    }
}

tlb_struct! {
    /// `_ messages:(HashmapE 64 EnqueuedMsg) count:uint48 = AccountDispatchQueue;`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct AccountDispatchQueue {
        pub messages: HashmapE<u64, EnqueuedMsg>,
        pub count: Uint<48>,
    }
}

tlb_struct! {
    /// ```text
    /// out_msg_queue_extra#0 dispatch_queue:DispatchQueue
    ///   out_queue_size:(Maybe uint48) = OutMsgQueueExtra;
    /// ```
    ///
    /// The dispatch queue is keyed by sender and augmented with the minimal
    /// creation lt.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct OutMsgQueueExtra: "out_msg_queue_extra#0" {
        pub dispatch_queue: HashmapAugE<Bits256, AccountDispatchQueue, u64>,
        pub out_queue_size: Option<Uint<48>> => "maybe",
    }
}

tlb_struct! {
    /// ```text
    /// _ out_queue:OutMsgQueue proc_info:ProcessedInfo
    ///   extra:(Maybe OutMsgQueueExtra) = OutMsgQueueInfo;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct OutMsgQueueInfo {
        pub out_queue: HashmapAugE<Bits352, EnqueuedMsg, u64>,
        pub proc_info: HashmapE<Bits96, ProcessedUpto>,
        pub extra: Option<OutMsgQueueExtra> => "maybe",
    }
}
