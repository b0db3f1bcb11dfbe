//! Handshake and framing constants.
//!
//! A connection starts with a 4-byte little-endian handshake word sent by
//! the client: the low byte is the [`Mode`], the next byte the payload
//! [`Format`]. The server answers with the authorization word (the mode
//! with [`AUTHORIZED`] set, same format) or closes the connection.
//!
//! Every payload afterwards is framed as
//! `[payload length: 8 LE][mode byte: 1][payload]`.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 11027;

/// Length of the handshake word.
pub const HANDSHAKE_LEN: usize = 4;

/// Bit set in the mode byte of an authorization word.
pub const AUTHORIZED: u8 = 0x80;

/// Length of the frame length prefix.
pub const FRAME_LENGTH_LEN: usize = 8;

/// Length prefix plus mode byte.
pub const FRAME_HEADER_LEN: usize = FRAME_LENGTH_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    Inject = 0x01,
    Query = 0x02,
    Times = 0x03,
    Config = 0x04,
}

impl TryFrom<u8> for Mode {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Mode::Inject),
            0x02 => Ok(Mode::Query),
            0x03 => Ok(Mode::Times),
            0x04 => Ok(Mode::Config),
            other => Err(TypesError::UnknownMode(other)),
        }
    }
}

/// Encoding of record payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Format {
    /// Records packed back to back.
    #[default]
    Raw = 0x00,
    /// Records passed through the UF3 delta codec.
    Delta = 0x01,
}

impl TryFrom<u8> for Format {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Format::Raw),
            0x01 => Ok(Format::Delta),
            other => Err(TypesError::UnknownFormat(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handshake {
    pub mode: Mode,
    pub format: Format,
}

impl Handshake {
    pub fn new(mode: Mode, format: Format) -> Self {
        Self { mode, format }
    }

    pub fn to_word(self) -> u32 {
        u32::from(self.mode as u8) | u32::from(self.format as u8) << 8
    }

    pub fn from_word(word: u32) -> Result<Self, TypesError> {
        let mode = Mode::try_from((word & 0xff) as u8)?;
        let format = Format::try_from(((word >> 8) & 0xff) as u8)?;
        Ok(Self { mode, format })
    }

    /// Word the server answers when it accepts this handshake.
    pub fn authorization(self) -> u32 {
        u32::from(self.mode as u8 | AUTHORIZED) | u32::from(self.format as u8) << 8
    }

    /// Time enumeration and configuration only answer raw payloads.
    pub fn is_supported(self) -> bool {
        match self.mode {
            Mode::Inject | Mode::Query => true,
            Mode::Times | Mode::Config => self.format == Format::Raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_word() {
        let handshake = Handshake::new(Mode::Query, Format::Delta);
        assert_eq!(handshake.to_word(), 0x0102);
        assert_eq!(handshake.authorization(), 0x0182);
        assert_eq!(Handshake::from_word(0x0102).unwrap(), handshake);
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(Handshake::from_word(0x09), Err(TypesError::UnknownMode(0x09)));
        assert_eq!(
            Handshake::from_word(0x0701),
            Err(TypesError::UnknownFormat(0x07))
        );
    }

    #[test]
    fn test_supported_pairs() {
        assert!(Handshake::new(Mode::Inject, Format::Delta).is_supported());
        assert!(Handshake::new(Mode::Times, Format::Raw).is_supported());
        assert!(!Handshake::new(Mode::Times, Format::Delta).is_supported());
        assert!(!Handshake::new(Mode::Config, Format::Delta).is_supported());
    }
}
