//! Geochrome Client
//!
//! Async Rust client for the geochrome server. Every call opens its own
//! connection, since the server fixes the session mode at the handshake.
//!
//! # Example
//!
//! ```ignore
//! use geochrome_client::GeochromeClient;
//! use geochrome_types::{Address, Format, Record};
//!
//! let client = GeochromeClient::new(addr);
//! client.inject(&records, Format::Delta).await?;
//! let (snapped, cells) = client.query(&Address::from_pose(pose, 12), Format::Raw).await?;
//! ```

pub mod codec;
pub mod error;

pub use codec::{Frame, FrameCodec};
pub use error::{ClientError, Result};

use futures::{SinkExt, StreamExt};
use geochrome::Buffer;
use geochrome::codec::DeltaLayout;
use geochrome_types::record::RECORD_LEN;
use geochrome_types::wire::HANDSHAKE_LEN;
use geochrome_types::{Address, Format, Handshake, Mode, Record};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

#[derive(Debug, Clone)]
pub struct GeochromeClient {
    addr: SocketAddr,
    codec: FrameCodec,
}

impl GeochromeClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            codec: FrameCodec::default(),
        }
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.codec = FrameCodec::new(size);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connects and performs the handshake.
    pub async fn connect(&self, mode: Mode, format: Format) -> Result<Framed<TcpStream, FrameCodec>> {
        let handshake = Handshake::new(mode, format);
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        stream.write_all(&handshake.to_word().to_le_bytes()).await?;

        let mut word = [0u8; HANDSHAKE_LEN];
        match stream.read_exact(&mut word).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ClientError::Rejected(handshake));
            }
            Err(e) => return Err(e.into()),
        }

        let actual = u32::from_le_bytes(word);
        if actual != handshake.authorization() {
            return Err(ClientError::Authorization {
                expected: handshake.authorization(),
                actual,
            });
        }

        Ok(Framed::new(stream, self.codec))
    }

    /// Sends records and waits until the server has stored them. Records
    /// are split over as many frames as the frame size limit requires.
    pub async fn inject(&self, records: &[Record], format: Format) -> Result<()> {
        let mut framed = self.connect(Mode::Inject, format).await?;
        for chunk in records.chunks(records_per_frame(self.codec.max_frame_size(), format)) {
            let packed = Record::pack_all(chunk);
            framed.feed(Frame::new(format as u8, encode(&packed, format)?)).await?;
        }
        SinkExt::flush(&mut framed).await?;

        // the server answers end of stream by closing once everything is flushed
        framed.get_mut().shutdown().await?;
        match framed.next().await {
            None => Ok(()),
            Some(Err(ClientError::Connection(e))) if e.kind() == ErrorKind::ConnectionReset => {
                Ok(())
            }
            Some(Err(e)) => Err(e),
            Some(Ok(frame)) => Err(ClientError::Protocol(format!(
                "unexpected frame of {} bytes during inject",
                frame.payload.len()
            ))),
        }
    }

    /// Runs one query. Returns the address with the times the server
    /// snapped it to, and the representatives as records.
    pub async fn query(&self, address: &Address, format: Format) -> Result<(Address, Vec<Record>)> {
        let mut framed = self.connect(Mode::Query, format).await?;
        framed
            .send(Frame::new(Format::Raw as u8, address.encode()))
            .await?;

        let snapped = Address::decode(&next_frame(&mut framed).await?.payload)?;
        let frame = next_frame(&mut framed).await?;
        let records = decode(&frame.payload, Format::try_from(frame.mode)?)?;

        Ok((snapped, Record::parse_all(&records)?))
    }

    /// Start times of every time bucket, ascending.
    pub async fn times(&self) -> Result<Vec<i64>> {
        let mut framed = self.connect(Mode::Times, Format::Raw).await?;
        let frame = next_frame(&mut framed).await?;

        if frame.payload.len() % 8 != 0 {
            return Err(ClientError::Protocol(format!(
                "time list of {} bytes",
                frame.payload.len()
            )));
        }
        Ok(frame
            .payload
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                i64::from_le_bytes(raw)
            })
            .collect())
    }

    /// Tree depth and time bucket width of the index.
    pub async fn config(&self) -> Result<(u64, i64)> {
        let mut framed = self.connect(Mode::Config, Format::Raw).await?;
        let frame = next_frame(&mut framed).await?;

        if frame.payload.len() != 16 {
            return Err(ClientError::Protocol(format!(
                "configuration of {} bytes",
                frame.payload.len()
            )));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&frame.payload[..8]);
        let depth = u64::from_le_bytes(raw);
        raw.copy_from_slice(&frame.payload[8..]);
        let width = i64::from_le_bytes(raw);
        Ok((depth, width))
    }
}

/// Records that fit one frame of `max_frame_size` bytes, whatever their
/// content. A delta record costs at most its mask on top of its raw size.
fn records_per_frame(max_frame_size: usize, format: Format) -> usize {
    let worst = match format {
        Format::Raw => RECORD_LEN,
        Format::Delta => RECORD_LEN + DeltaLayout::RECORD.mask_len(),
    };
    (max_frame_size / worst).max(1)
}

async fn next_frame(framed: &mut Framed<TcpStream, FrameCodec>) -> Result<Frame> {
    framed.next().await.unwrap_or(Err(ClientError::Closed))
}

fn encode(packed: &[u8], format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Raw => Ok(packed.to_vec()),
        Format::Delta => {
            let mut out = Buffer::new();
            geochrome::codec::encode(DeltaLayout::RECORD, packed, &mut out)?;
            Ok(out.as_slice().to_vec())
        }
    }
}

fn decode(payload: &[u8], format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Raw => Ok(payload.to_vec()),
        Format::Delta => {
            let mut out = Buffer::new();
            geochrome::codec::decode(DeltaLayout::RECORD, payload, &mut out)?;
            Ok(out.as_slice().to_vec())
        }
    }
}
