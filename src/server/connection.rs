// Connection handling module
// Serves a single TCP connection with hyper HTTP/1.1

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;

use super::bridge::Bridge;
use crate::logger;

/// Handle a single connection in a spawned local task.
///
/// Every request on the connection goes through the shared [`Bridge`].
/// Keep-alive is on, so one connection may carry several requests.
pub fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    bridge: Arc<Bridge>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.keep_alive(true);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let bridge = Arc::clone(&bridge);
                async move { bridge.handle(req, peer_addr).await }
            }),
        );

        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }
    });
}
