//! Block and shard domain model on top of the TL-B codec
//!
//! - addresses, currencies, messages, transactions and accounts
//! - blocks with their info, value flow, extra and masterchain extra
//! - shard arithmetic and block ids
//! - validator set shuffling PRNG
//! - jetton transfer bodies and forward payloads

pub mod account;
pub mod address;
pub mod block;
pub mod currency;
pub mod jetton;
pub mod message;
pub mod prng;
pub mod shard;
pub mod transaction;
#[cfg(test)]
mod tests;

pub use account::{
    Account, AccountState, AccountStatus, AccountStorage, DepthBalanceInfo, ShardAccount,
    ShardAccounts, StorageExtraInfo, StorageInfo,
};
pub use address::{AccountId, AddressFlags, Anycast, MsgAddress};
pub use block::{
    AccountBlock, BlkMasterInfo, BlkPrevInfo, Block, BlockExtra, BlockIdExt, BlockInfo,
    ConfigParams, CryptoSignature, CryptoSignaturePair, ExtBlkRef, FutureSplitMerge,
    GlobalVersion, InMsgDescr, McBlockExtra, McExtraOther, OutMsgDescr, ShardAccountBlocks,
    ShardDesc, ShardDescFees, ShardDescInfo, ShardFeeCreated, ShardFees, ShardHashes, ValueFlow,
};
pub use currency::CurrencyCollection;
pub use jetton::{
    EncryptedTextCommentPayload, JettonPayload, JettonTransferMsgBody, TextCommentPayload,
};
pub use message::{
    AccountDispatchQueue, CommonMsgInfo, EnqueuedMsg, ImportFees, InMsg, IntermediateAddress,
    Message, MsgEnvelope, MsgMetadata, OutMsg, OutMsgQueueExtra, OutMsgQueueInfo, ProcessedUpto,
    SimpleLib, StateInit, TickTock,
};
pub use prng::ValidatorPrng;
pub use shard::{
    BlockId, FullBlockId, SHARD_FULL, ShardId, ShardIdent, get_parents, shard_child,
    shard_ids, shard_parent,
};
pub use transaction::{
    AccStatusChange, ComputeSkipReason, ComputeVmDetails, HashUpdate, SplitMergeInfo,
    StorageUsed, TrActionPhase, TrBouncePhase, TrComputePhase, TrCreditPhase, TrStoragePhase,
    Transaction, TransactionDescr, TransactionMsgs,
};
