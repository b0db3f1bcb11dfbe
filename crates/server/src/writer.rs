//! Inject sessions.

use geochrome::codec::{self, DeltaLayout};
use geochrome::{Buffer, GeochromeError, Index, Result, ServerConfig};
use geochrome_types::Format;
use geochrome_types::Record;
use geochrome_types::record::RECORD_LEN;
use std::io::Read;
use tracing::{debug, info};

/// Stores every record received on a connection.
pub struct Writer<'a> {
    index: &'a Index,
    config: &'a ServerConfig,
}

impl<'a> Writer<'a> {
    pub fn new(index: &'a Index, config: &'a ServerConfig) -> Self {
        Self { index, config }
    }

    /// Reads frames until the client closes. The mode byte of each frame
    /// is the format of its payload and must match the negotiated `format`.
    pub fn run<S: Read>(&self, stream: &mut S, format: Format) -> Result<()> {
        let mut session = self.index.session();
        let mut frame = Buffer::new();
        let mut decoded = Buffer::new();
        let mut stored = 0usize;

        loop {
            let mode = match frame.read_from(
                stream,
                self.config.retry_budget,
                self.config.max_frame_size,
            ) {
                Ok(mode) => mode,
                Err(GeochromeError::ConnectionClosed) => break,
                Err(e) => {
                    // keep what was stored so far
                    session.flush()?;
                    return Err(e);
                }
            };

            let framed = Format::try_from(mode)?;
            if framed != format {
                session.flush()?;
                return Err(GeochromeError::InvalidInput(format!(
                    "{:?} frame in a {:?} inject session",
                    framed, format
                )));
            }

            let payload = match framed {
                Format::Raw => frame.as_slice(),
                Format::Delta => {
                    codec::decode(DeltaLayout::RECORD, frame.as_slice(), &mut decoded)?;
                    decoded.as_slice()
                }
            };

            if payload.len() % RECORD_LEN != 0 {
                return Err(GeochromeError::InvalidInput(format!(
                    "inject payload of {} bytes is not a whole number of records",
                    payload.len()
                )));
            }
            for chunk in payload.chunks_exact(RECORD_LEN) {
                session.insert_record(&Record::from_slice(chunk)?)?;
            }
            stored += payload.len() / RECORD_LEN;
            debug!("Stored frame of {} records", payload.len() / RECORD_LEN);
        }

        session.flush()?;
        info!("Inject session stored {} records", stored);
        Ok(())
    }
}
