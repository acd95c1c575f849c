//! Cell layer: the bit-level containers every TL-B value is stored in
//!
//! This module provides:
//! - Cell: immutable node of up to 1023 bits and 4 references, with its hash computed on build
//! - CellBuilder: append-only writer producing cells
//! - Slice: a reader for sequentially accessing cell data
//! - BitString: owned bit sequences for keys, labels and odd-width fields
//! - BoC: Bag of Cells serialization format for encoding cells into byte arrays

pub mod bits;
pub mod boc;
#[allow(clippy::module_inception)]
pub mod cell;
pub mod error;
pub mod slice;

pub use bits::{BitString, bits_for};
pub use boc::{
    base64_to_boc, boc_to_base64, boc_to_hex, deserialize_boc, deserialize_boc_roots, hex_to_boc,
    serialize_boc, serialize_boc_roots,
};
pub use cell::{
    Cell, CellBuilder, CellType, LIBRARY_CELL_BITS, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_LEVEL,
    MAX_CELL_REFS, PRUNED_BRANCH_BITS,
};
pub use error::{CellError, CellResult};
pub use slice::Slice;
