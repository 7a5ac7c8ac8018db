use thiserror::Error;

#[derive(Debug, Error)]
pub enum IbfError {
    /// Invalid construction option, or a supplied buffer of the wrong length.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// An identifier or key-hash output that violates the filter's shape.
    #[error("Argument: {0}")]
    Argument(String),

    #[error("Config mismatch: {field} differs ({ours} vs {theirs})")]
    ConfigMismatch {
        field: &'static str,
        ours: usize,
        theirs: usize,
    },

    /// Peeling stalled before every cell was drained.
    #[error(
        "Decode failed at cell {index}: count={count} id_sum={} hash_sum={}",
        hex::encode(.id_sum),
        hex::encode(.hash_sum)
    )]
    DecodeFailure {
        index: usize,
        count: i32,
        id_sum: Vec<u8>,
        hash_sum: Vec<u8>,
    },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Bad magic or version")]
    BadHeader,

    #[error("Corrupt payload")]
    Corrupt,
}

pub type Result<T> = std::result::Result<T, IbfError>;
