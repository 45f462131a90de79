// Server module entry point
// Listener setup, connection handling and the accept loop

pub mod bridge;
pub mod connection;
pub mod listener;

use std::sync::Arc;
use tokio::net::TcpListener;

pub use bridge::{Application, Bridge};
pub use listener::create_reusable_listener;

use crate::logger;

/// Accept connections until Ctrl-C
///
/// Must run inside a `LocalSet`; each connection is served on a local task.
pub async fn run(listener: TcpListener, bridge: Arc<Bridge>) -> std::io::Result<()> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        connection::handle_connection(stream, peer_addr, Arc::clone(&bridge));
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            signal = &mut shutdown => {
                signal?;
                logger::log_shutdown();
                return Ok(());
            }
        }
    }
}
