use thiserror::Error;

/// Decoding failures of the shared wire types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("address buffer too short: expected {expected} bytes, got {actual}")]
    TruncatedAddress { expected: usize, actual: usize },

    #[error("address size {size} with span {span} exceeds maximum depth {max}")]
    AddressTooDeep { size: usize, span: usize, max: usize },

    #[error("digit {digit} at scale {scale} is outside the branching range")]
    InvalidDigit { scale: usize, digit: u8 },

    #[error("record slice has {actual} bytes, expected {expected}")]
    InvalidRecordLength { expected: usize, actual: usize },

    #[error("unknown handshake mode {0:#04x}")]
    UnknownMode(u8),

    #[error("unknown payload format {0:#04x}")]
    UnknownFormat(u8),
}
