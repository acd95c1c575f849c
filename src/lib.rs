//! TL-B serialization for TON cells and the block/shard data model
//!
//! - [`cell`]: cells, builders, slices and bags of cells
//! - [`tlb`]: the codec traits, schema macros and TL-B containers
//! - [`models`]: addresses, messages, transactions, accounts, blocks and shards
//! - [`crc`]: checksums used by bags of cells and friendly addresses
//! - [`utils`]: logging setup and codec configuration

pub mod cell;
pub mod crc;
#[macro_use]
pub mod tlb;
pub mod models;
pub mod utils;
