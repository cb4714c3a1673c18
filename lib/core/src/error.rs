use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Dataset is empty!")]
    EmptyIndex,

    #[error("Index was built by `{index}` but the pipeline is `{pipeline}`; rebuild the index")]
    IncompatibleIndex { index: String, pipeline: String },

    #[error("Item already indexed: {0}")]
    DuplicateItem(String),

    #[error("Feature extraction failed: {0}")]
    Extraction(String),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Query cancelled")]
    Cancelled,

    #[error("An index rebuild is already in progress")]
    RebuildInProgress,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
