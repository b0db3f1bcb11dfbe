//! Error types for the geochrome index engine.

use geochrome_types::TypesError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index, storage and framing operations.
#[derive(Error, Debug)]
pub enum GeochromeError {
    /// A file or directory could not be opened or created
    #[error("cannot access {path}: {source}")]
    IoAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from a scale file failed
    #[error("read failed at offset {offset}: {source}")]
    IoRead {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Writing to a scale file failed
    #[error("write failed at offset {offset}: {source}")]
    IoWrite {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Positioning inside a scale file failed
    #[error("seek to offset {offset} failed: {source}")]
    IoSeek {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// A socket transfer kept stalling beyond the retry budget
    #[error("{operation} stalled after {retries} retries ({transferred} of {expected} bytes)")]
    RetryExhausted {
        operation: &'static str,
        retries: usize,
        transferred: usize,
        expected: usize,
    },

    /// The peer closed the connection on a frame boundary
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Buffer reservation failed
    #[error("cannot reserve {requested} bytes")]
    Memory { requested: usize },

    /// Configuration is malformed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Tree depth outside `(0, MAX_DEPTH)`
    #[error("tree depth {0} out of range")]
    InvalidDepth(i64),

    /// Time bucket width not positive
    #[error("time bucket width {0} must be positive")]
    InvalidBucketWidth(i64),

    /// Offset, link or count beyond the representable range
    #[error("value {value} exceeds representable limit {limit}")]
    Overflow { value: u64, limit: u64 },

    /// A frame announced more bytes than allowed
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: u64, max: usize },

    /// Caller supplied inconsistent arguments
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Stored or received bytes do not follow the expected layout
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Wire type decoding failed
    #[error(transparent)]
    Types(#[from] TypesError),

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for geochrome operations.
pub type Result<T> = std::result::Result<T, GeochromeError>;
