//! Per-connection handshake and dispatch.

use crate::reader::Reader;
use crate::writer::Writer;
use geochrome::buffer::{read_exact_retry, write_all_retry};
use geochrome::{Index, Result, ServerConfig};
use geochrome_types::wire::HANDSHAKE_LEN;
use geochrome_types::{Handshake, Mode};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Handler {
    index: Arc<Index>,
    config: Arc<ServerConfig>,
}

impl Handler {
    pub fn new(index: Arc<Index>, config: ServerConfig) -> Self {
        Self {
            index,
            config: Arc::new(config),
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs one session on a blocking stream. Returns once the session is
    /// over; the connection closes when `stream` is dropped.
    pub fn serve(&self, mut stream: TcpStream) -> Result<()> {
        let retries = self.config.retry_budget;

        let mut word = [0u8; HANDSHAKE_LEN];
        read_exact_retry(&mut stream, &mut word, retries)?;
        let word = u32::from_le_bytes(word);

        let handshake = match Handshake::from_word(word) {
            Ok(handshake) if handshake.is_supported() => handshake,
            Ok(handshake) => {
                warn!(
                    "Rejected handshake {:#06x}: {:?} does not accept {:?} payloads",
                    word, handshake.mode, handshake.format
                );
                return Ok(());
            }
            Err(e) => {
                warn!("Rejected handshake {:#06x}: {}", word, e);
                return Ok(());
            }
        };

        write_all_retry(&mut stream, &handshake.authorization().to_le_bytes(), retries)?;
        debug!("Authorized {:?} session ({:?})", handshake.mode, handshake.format);

        let reader = Reader::new(&self.index, &self.config);
        match handshake.mode {
            Mode::Inject => {
                Writer::new(&self.index, &self.config).run(&mut stream, handshake.format)
            }
            Mode::Query => reader.query(&mut stream, handshake.format),
            Mode::Times => reader.times(&mut stream),
            Mode::Config => reader.config(&mut stream),
        }
    }
}
