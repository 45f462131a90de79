//! Hyper request bridge
//!
//! Translates each hyper request into the chosen gateway's protocol and the
//! gateway's output back into a streamed hyper response. Both gateways feed
//! the same body type: a channel of frames, so a failed chunk surfaces as a
//! body error and hyper drops the connection instead of finishing the
//! message.

use crate::error::{Error, Result};
use crate::event::{InboundEvent, ResponseEvent, Scope};
use crate::gateway::blocking::{BlockingApp, Environ};
use crate::gateway::events::EventApp;
use crate::http::{headers, HeaderPairs};
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// Streamed response body
pub type BridgeBody = StreamBody<ReceiverStream<Result<Frame<Bytes>>>>;

/// Frames buffered between the producer and hyper
const CHANNEL_CAPACITY: usize = 16;

/// The application behind the listener
#[derive(Clone)]
pub enum Application {
    Events(Arc<dyn EventApp>),
    Blocking(Arc<dyn BlockingApp>),
}

/// Per-server request handler shared by all connections
pub struct Bridge {
    app: Application,
    /// Access log format, `None` when access logging is off
    access_log: Option<String>,
}

impl Bridge {
    pub const fn new(app: Application, access_log: Option<String>) -> Self {
        Self { app, access_log }
    }

    /// Serve one hyper request
    pub async fn handle(
        &self,
        req: Request<Incoming>,
        peer_addr: SocketAddr,
    ) -> Result<Response<BridgeBody>, Infallible> {
        let started = Instant::now();
        let access = self
            .access_log
            .as_ref()
            .map(|_| access_entry(&req, peer_addr));

        let response = match &self.app {
            Application::Events(app) => handle_events(Arc::clone(app), req).await,
            Application::Blocking(app) => handle_blocking(Arc::clone(app), req).await,
        };

        let response = response.unwrap_or_else(|e| {
            logger::log_error(&format!("Request failed before response start: {e}"));
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        });

        if let (Some(mut entry), Some(format)) = (access, self.access_log.as_deref()) {
            finish_entry(&mut entry, &response, started);
            logger::log_access(&entry, format);
        }
        Ok(response)
    }
}

async fn handle_events(app: Arc<dyn EventApp>, req: Request<Incoming>) -> Result<Response<BridgeBody>> {
    let (parts, body) = req.into_parts();
    let scope = Scope::http(
        parts.method,
        decode_path(parts.uri.path()),
        header_pairs(&parts.headers),
    );

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundEvent>(CHANNEL_CAPACITY);
    tokio::spawn(forward_request_body(body, inbound_tx));

    let (mut outbound_tx, mut outbound_rx) = mpsc::channel::<ResponseEvent>(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        if let Err(e) = app.call(scope, &mut inbound_rx, &mut outbound_tx).await {
            logger::log_error(&format!("Application error: {e}"));
        }
    });

    let (status, response_headers) = match outbound_rx.recv().await {
        Some(ResponseEvent::Start { status, headers }) => (status, headers::to_text_pairs(&headers)),
        Some(ResponseEvent::Body { .. }) => {
            return Err(Error::Protocol(
                "body event before response start".to_string(),
            ))
        }
        None => return Err(Error::ChannelClosed),
    };
    let status = StatusCode::from_u16(status)
        .map_err(|_| Error::Protocol(format!("invalid status {status}")))?;

    let (frame_tx, frame_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(forward_response_body(outbound_rx, frame_tx));
    Ok(build_response(status, &response_headers, frame_rx))
}

/// Push request body frames as `http.request` events, then a final empty one
async fn forward_request_body(mut body: Incoming, inbound: mpsc::Sender<InboundEvent>) {
    loop {
        let event = match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => InboundEvent::Request {
                    body: data,
                    more_body: true,
                },
                Err(_) => continue,
            },
            Some(Err(_)) => InboundEvent::Disconnect,
            None => InboundEvent::empty_request(),
        };
        let last = !matches!(event, InboundEvent::Request { more_body: true, .. });
        if inbound.send(event).await.is_err() || last {
            return;
        }
    }
}

/// Relay `http.response.body` events into hyper frames
///
/// A closed event channel before the terminal event aborts the body.
async fn forward_response_body(
    mut outbound: mpsc::Receiver<ResponseEvent>,
    frames: mpsc::Sender<Result<Frame<Bytes>>>,
) {
    loop {
        let failure = match outbound.recv().await {
            Some(ResponseEvent::Body { body, more_body }) => {
                if !body.is_empty() && frames.send(Ok(Frame::data(body))).await.is_err() {
                    return;
                }
                if more_body {
                    continue;
                }
                return;
            }
            Some(ResponseEvent::Start { .. }) => {
                Error::Protocol("response start sent twice".to_string())
            }
            None => Error::ChannelClosed,
        };
        logger::log_error(&format!("Response aborted: {failure}"));
        let _ = frames.send(Err(failure)).await;
        return;
    }
}

async fn handle_blocking(
    app: Arc<dyn BlockingApp>,
    req: Request<Incoming>,
) -> Result<Response<BridgeBody>> {
    let environ = environ_for(&req);
    // The blocking gateway never reads request bodies
    drop(req);

    let (start_tx, start_rx) = oneshot::channel();
    let (frame_tx, frame_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || run_blocking(app.as_ref(), &environ, start_tx, &frame_tx));

    let (status_line, response_headers) = start_rx.await.map_err(|_| Error::ChannelClosed)??;
    let status = parse_status_line(&status_line)?;
    Ok(build_response(status, &response_headers, frame_rx))
}

/// Call the blocking application and pump its body into `frames`
///
/// Stops early when hyper hangs up; dropping the body iterator closes the
/// file it holds.
fn run_blocking(
    app: &dyn BlockingApp,
    environ: &Environ,
    start_tx: oneshot::Sender<Result<(String, HeaderPairs)>>,
    frames: &mpsc::Sender<Result<Frame<Bytes>>>,
) {
    let mut start = None;
    let body = app.call(environ, &mut |status: &str, headers: HeaderPairs| {
        start = Some((status.to_string(), headers));
    });
    let body = match (body, start) {
        (Ok(body), Some(start)) => {
            let _ = start_tx.send(Ok(start));
            body
        }
        (Ok(_), None) => {
            let _ = start_tx.send(Err(Error::Protocol(
                "start_response was not called".to_string(),
            )));
            return;
        }
        (Err(e), _) => {
            let _ = start_tx.send(Err(e));
            return;
        }
    };

    for chunk in body {
        let frame = match chunk {
            Ok(chunk) => Ok(Frame::data(chunk)),
            Err(e) => {
                logger::log_error(&format!("Response aborted: {e}"));
                let _ = frames.blocking_send(Err(e));
                return;
            }
        };
        if frames.blocking_send(frame).is_err() {
            return;
        }
    }
}

fn environ_for(req: &Request<Incoming>) -> Environ {
    let mut environ = headers::to_environ(req.headers());
    environ.insert("REQUEST_METHOD".to_string(), req.method().to_string());
    environ.insert("PATH_INFO".to_string(), decode_path(req.uri().path()));
    environ.insert(
        "QUERY_STRING".to_string(),
        req.uri().query().unwrap_or_default().to_string(),
    );
    environ.insert(
        "SERVER_PROTOCOL".to_string(),
        format!("{:?}", req.version()),
    );
    environ
}

fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

fn header_pairs(map: &HeaderMap) -> Vec<(Bytes, Bytes)> {
    map.iter()
        .map(|(name, value)| {
            (
                Bytes::copy_from_slice(name.as_str().as_bytes()),
                Bytes::copy_from_slice(value.as_bytes()),
            )
        })
        .collect()
}

/// `"206 Partial Content"` to its status code
fn parse_status_line(line: &str) -> Result<StatusCode> {
    line.split_once(' ')
        .map_or(line, |(code, _)| code)
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| Error::Protocol(format!("invalid status line '{line}'")))
}

fn build_response(
    status: StatusCode,
    response_headers: &[(String, String)],
    frames: mpsc::Receiver<Result<Frame<Bytes>>>,
) -> Response<BridgeBody> {
    let mut response = Response::new(StreamBody::new(ReceiverStream::new(frames)));
    *response.status_mut() = status;
    let map = response.headers_mut();
    for (name, value) in response_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => logger::log_warning(&format!("Dropping invalid response header '{name}'")),
        }
    }
    response
}

fn empty_response(status: StatusCode) -> Response<BridgeBody> {
    // Sender dropped at once, so the body ends immediately
    let (_, frames) = mpsc::channel(1);
    build_response(status, &[], frames)
}

fn access_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(str::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header(hyper::header::REFERER);
    entry.user_agent = header(hyper::header::USER_AGENT);
    entry
}

fn finish_entry(entry: &mut AccessLogEntry, response: &Response<BridgeBody>, started: Instant) {
    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    entry.status = response.status().as_u16();
    entry.body_bytes = header(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.content_encoding = header(hyper::header::CONTENT_ENCODING);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
}
