use thiserror::Error;

#[derive(Error, Debug)]
pub enum LimoncelloError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid database format: {0}")]
    InvalidFormat(String),

    #[error("Database version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Checksum mismatch at offset {offset}: data may be corrupted")]
    ChecksumMismatch { offset: u64 },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

pub type Result<T> = std::result::Result<T, LimoncelloError>;

impl From<bincode::Error> for LimoncelloError {
    fn from(err: bincode::Error) -> Self {
        LimoncelloError::Serialization(err.to_string())
    }
}
