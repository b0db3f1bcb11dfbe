//! # geochrome-types
//!
//! Types shared by the geochrome index engine, its server and its client:
//!
//! - **Address**: per-scale digit sequence of a geographic cell, with the
//!   span, mode and time fields a query carries
//! - **Record**: the fixed-stride point record (position, time, color)
//! - **Wire**: handshake modes, payload formats and frame constants
//!
//! ## Examples
//!
//! ```rust
//! use geochrome_types::address::Address;
//! use geochrome_types::record::Record;
//!
//! let record = Record::new([6.1432, 46.2044, 375.0], 1_600_000_000, [200, 180, 90]);
//! let address = Address::from_pose(record.pose, 12);
//! assert_eq!(address.size(), 12);
//!
//! let bytes = record.to_bytes();
//! assert_eq!(Record::from_bytes(&bytes), record);
//! ```

pub mod address;
pub mod error;
pub mod record;
pub mod wire;

pub use address::Address;
pub use error::TypesError;
pub use record::Record;
pub use wire::{Format, Handshake, Mode};
