use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("not enough bits: requested {requested}, available {available}")]
    NotEnoughBits { requested: usize, available: usize },
    #[error("not enough refs: requested {requested}, available {available}")]
    NotEnoughRefs { requested: usize, available: usize },
    #[error("cell overflow: cannot store {requested} more bits, {available} available")]
    BitsOverflow { requested: usize, available: usize },
    #[error("cell overflow: maximum {max} references allowed")]
    RefsOverflow { max: usize },
    #[error("value does not fit into {bits} bits")]
    IntOverflow { bits: usize },
    #[error("invalid exotic cell: {0}")]
    InvalidExotic(String),
    #[error("invalid cell data: {0}")]
    InvalidData(String),
}

pub type CellResult<T> = Result<T, CellError>;
