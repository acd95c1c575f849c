use crate::cell::CellError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlbError {
    /// Not enough bits or refs, or a cell overflow while writing
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error("cannot decode sum type {type_name}")]
    SumTypeMismatch { type_name: &'static str },
    #[error("magic prefix {expected} not found, got {found:#x}")]
    MagicMismatch { expected: String, found: u64 },
    #[error("integer overflow: {0}")]
    IntOverflow(String),
    #[error("grams overflow: {bytes} bytes do not fit into u64")]
    GramsOverflow { bytes: usize },
    #[error("invalid tag {tag:?}")]
    InvalidTag { tag: String },
    #[error("library cell {hash} found but no library resolver is configured")]
    LibraryResolverMissing { hash: String },
    #[error("library {hash} not found")]
    LibraryNotFound { hash: String },
    #[error("pruned branch cell cannot be decoded as {type_name}")]
    PrunedBranch { type_name: &'static str },
    #[error("bin tree must hold at least one value")]
    EmptyBinTree,
    #[error("sum type {type_name} has no encodable variant set")]
    UnsetSumType { type_name: &'static str },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("{path}: {source}")]
    Path {
        path: String,
        source: Box<TlbError>,
    },
}

impl TlbError {
    /// The error with any field path stripped
    pub fn root_cause(&self) -> &TlbError {
        match self {
            TlbError::Path { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Dotted field path where the error happened, if paths were recorded
    pub fn path(&self) -> Option<&str> {
        match self {
            TlbError::Path { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type TlbResult<T> = Result<T, TlbError>;
