//! TCP transport for geochrome server
//!
//! Connections are accepted on the async runtime, then converted to
//! blocking sockets and served on the blocking pool: the index does
//! synchronous file I/O for every record.

use futures::prelude::*;
use geochrome::{GeochromeError, Index, ServerConfig};

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::handler::Handler;

/// Run the TCP server until `shutdown` resolves
pub async fn run_server(
    listener: tokio::net::TcpListener,
    index: Arc<Index>,
    config: ServerConfig,
    mut shutdown: impl Future<Output = ()> + Unpin + Send + 'static,
) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid server configuration: {}", e);
    }
    let handler = Handler::new(index, config);

    info!("Geochrome server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((socket, peer)) => {
                        let stream = match into_blocking(socket, handler.config()) {
                            Ok(stream) => stream,
                            Err(e) => {
                                error!("Cannot prepare connection from {}: {}", peer, e);
                                continue;
                            }
                        };

                        let server = handler.clone();
                        tokio::task::spawn_blocking(move || {
                            debug!("Connection from {}", peer);
                            report(peer, server.serve(stream));
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping server...");
                break;
            }
        }
    }

    Ok(())
}

fn into_blocking(
    socket: tokio::net::TcpStream,
    config: &ServerConfig,
) -> std::io::Result<std::net::TcpStream> {
    let stream = socket.into_std()?;
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(config.socket_timeout()))?;
    stream.set_write_timeout(Some(config.socket_timeout()))?;
    Ok(stream)
}

fn report(peer: SocketAddr, result: geochrome::Result<()>) {
    match result {
        Ok(()) | Err(GeochromeError::ConnectionClosed) => {
            debug!("Connection from {} closed", peer);
        }
        Err(e @ GeochromeError::RetryExhausted { .. }) => {
            warn!("Connection from {} stalled: {}", peer, e);
        }
        Err(e) => {
            error!("Connection from {} failed: {}", peer, e);
        }
    }
}
