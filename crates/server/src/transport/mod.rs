//! Transport layer for geochrome server
//!
//! Available transports:
//! - `tcp` - tokio accept loop handing each connection to a blocking worker

pub mod tcp;
