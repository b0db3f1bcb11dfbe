//! Frame codec: `[payload length: u64 LE][mode: u8][payload]`.

use crate::error::ClientError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use geochrome::buffer::MAX_FRAME_SIZE;
use geochrome_types::wire::{FRAME_HEADER_LEN, FRAME_LENGTH_LEN};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub mode: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(mode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            mode,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let mut buf = std::io::Cursor::new(&src[..]);
        let len = buf.get_u64_le();
        let mode = buf.get_u8();

        if len > self.max_frame_size as u64 {
            return Err(ClientError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        let len = len as usize;

        if src.len() < FRAME_HEADER_LEN + len {
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        let payload = src.split_to(len).freeze();

        Ok(Some(Frame { mode, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ClientError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_frame_size {
            return Err(ClientError::FrameTooLarge {
                size: item.payload.len() as u64,
                max: self.max_frame_size,
            });
        }

        dst.reserve(FRAME_LENGTH_LEN + 1 + item.payload.len());
        dst.put_u64_le(item.payload.len() as u64);
        dst.put_u8(item.mode);
        dst.put_slice(&item.payload);

        Ok(())
    }
}
