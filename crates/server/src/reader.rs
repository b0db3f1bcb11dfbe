//! Query, time enumeration and configuration sessions.

use geochrome::codec::{self, DeltaLayout};
use geochrome::{Buffer, GeochromeError, Index, Result, ServerConfig};
use geochrome_types::{Address, Format};
use std::io::{Read, Write};
use tracing::{debug, warn};

pub struct Reader<'a> {
    index: &'a Index,
    config: &'a ServerConfig,
}

impl<'a> Reader<'a> {
    pub fn new(index: &'a Index, config: &'a ServerConfig) -> Self {
        Self { index, config }
    }

    /// Answers address frames until the client closes.
    ///
    /// Each request gets two frames back: the address with its times
    /// snapped to existing buckets (raw), then the gathered records in
    /// `format`. An address that does not decode gets an empty reply.
    pub fn query<S: Read + Write>(&self, stream: &mut S, format: Format) -> Result<()> {
        let retries = self.config.retry_budget;
        let mut session = self.index.session();
        let mut request = Buffer::new();
        let mut records = Buffer::new();
        let mut encoded = Buffer::new();
        let mut reply = Buffer::new();

        loop {
            match request.read_from(stream, retries, self.config.max_frame_size) {
                Ok(_) => {}
                Err(GeochromeError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            }

            let mut address = match Address::decode(request.as_slice()) {
                Ok(address) => address,
                Err(e) => {
                    warn!("Malformed query address: {}", e);
                    reply.reset();
                    reply.write_to(stream, Format::Raw as u8, retries)?;
                    reply.write_to(stream, format as u8, retries)?;
                    continue;
                }
            };

            records.reset();
            let found = session.query(&mut address, &mut records)?;
            debug!(
                "Query of size {} span {} gathered {} cells",
                address.size(),
                address.span(),
                found
            );

            reply.reset();
            reply.append(&address.encode())?;
            reply.write_to(stream, Format::Raw as u8, retries)?;

            let payload = match format {
                Format::Raw => &records,
                Format::Delta => {
                    codec::encode(DeltaLayout::RECORD, records.as_slice(), &mut encoded)?;
                    &encoded
                }
            };
            payload.write_to(stream, format as u8, retries)?;
        }
    }

    /// Sends the start time of every bucket, ascending.
    pub fn times<W: Write>(&self, stream: &mut W) -> Result<()> {
        let times = self.index.times()?;
        let mut reply = Buffer::with_capacity(times.len() * 8)?;
        for time in &times {
            reply.append(&time.to_le_bytes())?;
        }
        reply.write_to(stream, Format::Raw as u8, self.config.retry_budget)
    }

    /// Sends the tree depth and the bucket width.
    pub fn config<W: Write>(&self, stream: &mut W) -> Result<()> {
        let config = self.index.config();
        let mut reply = Buffer::new();
        reply.append(&(config.depth() as u64).to_le_bytes())?;
        reply.append(&config.bucket_width().to_le_bytes())?;
        reply.write_to(stream, Format::Raw as u8, self.config.retry_budget)
    }
}
