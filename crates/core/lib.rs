//! Time-bucketed octree index for colorimetric point data.
//!
//! ## Features
//! - **Incremental aggregation**: every point is folded into one node per
//!   scale, keeping a running mean color and a sample counter
//! - **Append-only storage**: one file per scale, nodes addressed by 40-bit
//!   offsets
//! - **Time buckets**: a directory per coarse time, snapped to on query
//! - **UF3 delta codec**: byte-level delta encoding of record streams
//! - **Framing**: length-prefixed frames with bounded retries for sockets
//!
//! ```rust
//! use geochrome::prelude::*;
//!
//! let dir = tempfile::tempdir()?;
//! let index = Index::create(dir.path(), SystemConfig::new(3, 3600)?)?;
//! let mut session = index.session();
//!
//! let pose = [0.1, 0.2, 10.0];
//! session.insert_record(&Record::new(pose, 100, [10, 20, 30]))?;
//! session.insert_record(&Record::new(pose, 100, [50, 60, 70]))?;
//!
//! let mut address = Address::from_pose(pose, 2).with_time(0, 100);
//! let mut found = Vec::new();
//! session.query(&mut address, &mut found)?;
//!
//! assert_eq!(found[0].to_record().map(|r| r.color), Some([30, 40, 50]));
//! # Ok::<(), geochrome::GeochromeError>(())
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod node;
pub mod storage;

pub use buffer::Buffer;
pub use codec::DeltaLayout;
pub use config::{ServerConfig, SystemConfig};
pub use error::{GeochromeError, Result};
pub use index::{Gather, Index, Representative, Session};
pub use node::{Node, NodeKind, Offset, Payload, Sample};
pub use storage::{MemoryScales, ScaleFileSet, ScaleStore};

pub use geochrome_types::{Address, Format, Handshake, Mode, Record};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeochromeError, Index, Result, Session, SystemConfig};

    pub use crate::{Gather, Representative};

    pub use crate::{NodeKind, Payload, Sample};

    pub use crate::{Address, Record};

    pub use crate::{Buffer, DeltaLayout};
}
