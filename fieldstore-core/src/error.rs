use std::io;

/// The error type shared by every layer of the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corruption detected: {0}")]
    Corruption(String),

    #[error("unknown field id: {0}")]
    UnknownField(u8),

    #[error("entry too large: {size} bytes exceeds the {limit} byte limit")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("operation {op_id} was never registered")]
    UnregisteredOperation { op_id: u32 },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
