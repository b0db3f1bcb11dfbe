//! Growable byte buffer and socket framing.
//!
//! A [`Buffer`] keeps a logical length separate from its zero-filled
//! physical storage. Storage only grows, to the next power of two and by at
//! least [`MIN_STEP`] bytes, so a buffer reused across frames settles at the
//! size of the largest frame.
//!
//! Frames are `[payload length: 8 LE][mode: 1][payload]`. Socket transfers
//! tolerate a bounded number of consecutive stalls (zero-length transfers,
//! timeouts, interrupts) before giving up.

use crate::error::{GeochromeError, Result};
use geochrome_types::Record;
use geochrome_types::record::RECORD_LEN;
use geochrome_types::wire::{FRAME_HEADER_LEN, FRAME_LENGTH_LEN};
use std::io::{ErrorKind, Read, Write};

/// Smallest growth step.
pub const MIN_STEP: usize = 4096;

/// Largest frame payload accepted by default.
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

/// Consecutive stalls tolerated by default.
pub const DEFAULT_RETRIES: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct Buffer {
    bytes: Vec<u8>,
    len: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.reserve(capacity)?;
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Physical size of the storage.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    /// Ensures room for `additional` bytes past the logical length. On
    /// failure the buffer is left untouched.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(GeochromeError::Memory {
                requested: usize::MAX,
            })?;
        if needed <= self.bytes.len() {
            return Ok(());
        }

        let target = needed
            .max(self.bytes.len() + MIN_STEP)
            .checked_next_power_of_two()
            .ok_or(GeochromeError::Memory { requested: needed })?;
        self.bytes
            .try_reserve_exact(target - self.bytes.len())
            .map_err(|_| GeochromeError::Memory { requested: target })?;
        self.bytes.resize(target, 0);
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    pub fn push_record(&mut self, record: &Record) -> Result<()> {
        self.reserve(RECORD_LEN)?;
        record.write_into(&mut self.bytes[self.len..self.len + RECORD_LEN]);
        self.len += RECORD_LEN;
        Ok(())
    }

    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.len)
            .ok_or_else(|| {
                GeochromeError::InvalidInput(format!(
                    "read of {} bytes at {} past buffer length {}",
                    len, offset, self.len
                ))
            })?;
        Ok(&self.bytes[offset..end])
    }

    /// Moves the logical length without touching the content.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.len {
            self.reserve(len - self.len)?;
        }
        self.len = len;
        Ok(())
    }

    /// Empties the buffer, keeping its storage.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Sends the content as one frame.
    pub fn write_to<W: Write>(&self, sink: &mut W, mode: u8, retries: usize) -> Result<()> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        header[..FRAME_LENGTH_LEN].copy_from_slice(&(self.len as u64).to_le_bytes());
        header[FRAME_LENGTH_LEN] = mode;

        write_all_retry(sink, &header, retries)?;
        write_all_retry(sink, self.as_slice(), retries)?;
        sink.flush()?;
        Ok(())
    }

    /// Replaces the content with the next frame and returns its mode byte.
    ///
    /// A stream that ends before the first header byte yields
    /// [`GeochromeError::ConnectionClosed`].
    pub fn read_from<R: Read>(
        &mut self,
        source: &mut R,
        retries: usize,
        max_frame: usize,
    ) -> Result<u8> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        read_exact_retry(source, &mut header, retries)?;

        let mut raw = [0u8; FRAME_LENGTH_LEN];
        raw.copy_from_slice(&header[..FRAME_LENGTH_LEN]);
        let size = u64::from_le_bytes(raw);
        if size > max_frame as u64 {
            return Err(GeochromeError::FrameTooLarge {
                size,
                max: max_frame,
            });
        }

        self.reset();
        self.set_len(size as usize)?;
        if size > 0 {
            let read = read_exact_retry(source, self.as_mut_slice(), retries);
            if read.is_err() {
                self.reset();
            }
            read.map_err(|e| match e {
                GeochromeError::ConnectionClosed => GeochromeError::RetryExhausted {
                    operation: "frame read",
                    retries,
                    transferred: 0,
                    expected: size as usize,
                },
                other => other,
            })?;
        }
        Ok(header[FRAME_LENGTH_LEN])
    }
}

fn is_stall(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Writes all of `bytes`, counting zero-length writes and transient errors
/// as stalls. Progress resets the count.
pub fn write_all_retry<W: Write>(sink: &mut W, bytes: &[u8], retries: usize) -> Result<()> {
    let mut written = 0;
    let mut stalls = 0;

    while written < bytes.len() {
        match sink.write(&bytes[written..]) {
            Ok(0) => stalls += 1,
            Ok(n) => {
                written += n;
                stalls = 0;
            }
            Err(e) if is_stall(&e) => stalls += 1,
            Err(e) => return Err(GeochromeError::Io(e)),
        }

        if stalls >= retries.max(1) {
            return Err(GeochromeError::RetryExhausted {
                operation: "write",
                retries,
                transferred: written,
                expected: bytes.len(),
            });
        }
    }
    Ok(())
}

/// Fills `bytes`, counting transient errors and end of stream as stalls.
/// End of stream before any byte arrived is a closed connection.
pub fn read_exact_retry<R: Read>(source: &mut R, bytes: &mut [u8], retries: usize) -> Result<()> {
    let mut filled = 0;
    let mut stalls = 0;

    while filled < bytes.len() {
        match source.read(&mut bytes[filled..]) {
            Ok(0) if filled == 0 => return Err(GeochromeError::ConnectionClosed),
            Ok(0) => stalls += 1,
            Ok(n) => {
                filled += n;
                stalls = 0;
            }
            Err(e) if is_stall(&e) => stalls += 1,
            Err(e) => return Err(GeochromeError::Io(e)),
        }

        if stalls >= retries.max(1) {
            return Err(GeochromeError::RetryExhausted {
                operation: "read",
                retries,
                transferred: filled,
                expected: bytes.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader yielding at most `chunk` bytes per call, with a stall between
    /// chunks.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        stalled: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            if !self.stalled {
                self.stalled = true;
                return Err(ErrorKind::WouldBlock.into());
            }
            self.stalled = false;
            let n = self.chunk.min(out.len()).min(self.data.len() - self.pos);
            out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_growth_one_byte_at_a_time() {
        let mut buffer = Buffer::new();
        for i in 0..20_000u32 {
            buffer.append(&[(i % 251) as u8]).unwrap();
            assert_eq!(buffer.len(), i as usize + 1);
            assert!(buffer.capacity() >= buffer.len());
            assert!(buffer.capacity().is_power_of_two());
        }
        for (i, byte) in buffer.as_slice().iter().enumerate() {
            assert_eq!(*byte, (i % 251) as u8);
        }
        assert_eq!(buffer.capacity(), 32_768);
    }

    #[test]
    fn test_growth_min_step() {
        let mut buffer = Buffer::new();
        buffer.append(&[1]).unwrap();
        assert_eq!(buffer.capacity(), MIN_STEP);

        buffer.reserve(MIN_STEP).unwrap();
        assert_eq!(buffer.capacity(), 2 * MIN_STEP);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut buffer = Buffer::new();
        buffer.append(&[7u8; 10_000]).unwrap();
        let capacity = buffer.capacity();

        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn test_read_at_bounds() {
        let mut buffer = Buffer::new();
        buffer.append(b"geochrome").unwrap();

        assert_eq!(buffer.read_at(3, 6).unwrap(), b"chrome");
        assert!(buffer.read_at(3, 7).is_err());
        assert!(buffer.read_at(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_failed_reserve_keeps_content() {
        let mut buffer = Buffer::new();
        buffer.append(b"octree").unwrap();
        let capacity = buffer.capacity();

        assert!(matches!(
            buffer.reserve(usize::MAX),
            Err(GeochromeError::Memory { .. })
        ));
        assert!(matches!(
            buffer.reserve(usize::MAX / 2 + 1),
            Err(GeochromeError::Memory { .. })
        ));
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.as_slice(), b"octree");
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn test_set_len() {
        let mut buffer = Buffer::new();
        buffer.append(b"abcdef").unwrap();
        buffer.set_len(3).unwrap();
        assert_eq!(buffer.as_slice(), b"abc");

        buffer.set_len(6).unwrap();
        assert_eq!(buffer.as_slice(), b"abcdef");

        buffer.set_len(10_000).unwrap();
        assert_eq!(buffer.len(), 10_000);
    }

    #[test]
    fn test_frame_layout() {
        let mut buffer = Buffer::new();
        buffer.append(b"xyz").unwrap();

        let mut wire = Vec::new();
        buffer.write_to(&mut wire, 0x02, DEFAULT_RETRIES).unwrap();
        assert_eq!(&wire[..8], &3u64.to_le_bytes());
        assert_eq!(wire[8], 0x02);
        assert_eq!(&wire[9..], b"xyz");

        let mut received = Buffer::new();
        let mode = received
            .read_from(&mut Cursor::new(wire), DEFAULT_RETRIES, MAX_FRAME_SIZE)
            .unwrap();
        assert_eq!(mode, 0x02);
        assert_eq!(received.as_slice(), b"xyz");
    }

    #[test]
    fn test_empty_frame() {
        let mut wire = Vec::new();
        Buffer::new().write_to(&mut wire, 0x00, 3).unwrap();
        assert_eq!(wire.len(), FRAME_HEADER_LEN);

        let mut received = Buffer::new();
        received.append(b"stale").unwrap();
        received
            .read_from(&mut Cursor::new(wire), 3, MAX_FRAME_SIZE)
            .unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn test_end_of_stream_is_closed() {
        let mut buffer = Buffer::new();
        let result = buffer.read_from(&mut Cursor::new(Vec::new()), 3, MAX_FRAME_SIZE);
        assert!(matches!(result, Err(GeochromeError::ConnectionClosed)));
    }

    #[test]
    fn test_truncated_frame_exhausts_retries() {
        let mut buffer = Buffer::new();

        let result = buffer.read_from(&mut Cursor::new(vec![5u8, 0, 0]), 3, MAX_FRAME_SIZE);
        assert!(matches!(
            result,
            Err(GeochromeError::RetryExhausted {
                transferred: 3,
                expected: 9,
                ..
            })
        ));

        let mut wire = 5u64.to_le_bytes().to_vec();
        wire.push(0);
        wire.extend_from_slice(b"ab");
        let result = buffer.read_from(&mut Cursor::new(wire), 3, MAX_FRAME_SIZE);
        assert!(matches!(result, Err(GeochromeError::RetryExhausted { .. })));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_frame() {
        let mut wire = 1_000u64.to_le_bytes().to_vec();
        wire.push(0);
        let mut buffer = Buffer::new();
        let result = buffer.read_from(&mut Cursor::new(wire), 3, 999);
        assert!(matches!(
            result,
            Err(GeochromeError::FrameTooLarge { size: 1000, .. })
        ));
        assert_eq!(buffer.capacity(), 0);
    }

    #[test]
    fn test_stalls_between_progress_are_tolerated() {
        let mut wire = Vec::new();
        let mut payload = Buffer::new();
        payload.append(&[9u8; 100]).unwrap();
        payload.write_to(&mut wire, 0x01, 3).unwrap();

        let mut source = Trickle {
            data: wire,
            pos: 0,
            chunk: 7,
            stalled: false,
        };
        let mut buffer = Buffer::new();
        assert_eq!(buffer.read_from(&mut source, 2, MAX_FRAME_SIZE).unwrap(), 0x01);
        assert_eq!(buffer.as_slice(), &[9u8; 100]);
    }

    #[test]
    fn test_push_record() {
        let record = Record::new([1.0, 2.0, 3.0], 42, [4, 5, 6]);
        let mut buffer = Buffer::new();
        buffer.push_record(&record).unwrap();
        buffer.push_record(&record).unwrap();

        assert_eq!(buffer.len(), 2 * RECORD_LEN);
        assert_eq!(
            Record::from_slice(buffer.read_at(RECORD_LEN, RECORD_LEN).unwrap()).unwrap(),
            record
        );
    }
}
