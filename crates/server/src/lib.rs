//! Geochrome Server
//!
//! TCP front end of a geochrome index.
//!
//! A client opens one connection per session and starts it with a
//! handshake naming the session mode and payload format:
//!
//! - **inject**: record frames, each record stored in its own time bucket
//! - **query**: address frames, each answered by the snapped address and
//!   the matching records
//! - **times**: the start time of every bucket
//! - **config**: tree depth and bucket width
//!
//! # Example
//!
//! ```ignore
//! use geochrome_server::run_server;
//!
//! run_server(listener, index, config, shutdown).await?;
//! ```

pub mod handler;
pub mod reader;
pub mod transport;
pub mod writer;

pub use handler::Handler;

pub use transport::tcp::run_server;
