use geochrome::GeochromeError;
use geochrome_types::{Handshake, TypesError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),
    #[error("Server rejected {0:?}")]
    Rejected(Handshake),
    #[error("Unexpected authorization {actual:#06x}, expected {expected:#06x}")]
    Authorization { expected: u32, actual: u32 },
    #[error("Frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: u64, max: usize },
    #[error("Server closed the connection before answering")]
    Closed,
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Decoding error: {0}")]
    Types(#[from] TypesError),
    #[error("Payload error: {0}")]
    Payload(#[from] GeochromeError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
