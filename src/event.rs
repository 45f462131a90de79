//! Event vocabulary of the asynchronous protocol
//!
//! Requests arrive as a stream of [`InboundEvent`]s and responses leave as a
//! stream of [`ResponseEvent`]s. The two channel traits are the only points
//! where an event-driven responder suspends; they are implemented for tokio
//! `mpsc` channels and for plain in-memory queues.

use crate::error::{Error, Result};
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::Method;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Kind of connection a scope describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Http,
    Websocket,
}

/// Request metadata handed to an event application
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub method: Method,
    /// Percent-decoded request path
    pub path: String,
    pub headers: Vec<(Bytes, Bytes)>,
}

impl Scope {
    pub fn http(method: Method, path: impl Into<String>, headers: Vec<(Bytes, Bytes)>) -> Self {
        Self {
            kind: ScopeKind::Http,
            method,
            path: path.into(),
            headers,
        }
    }
}

/// Event received from the client side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `http.request`: a piece of the request body
    Request { body: Bytes, more_body: bool },
    /// `http.disconnect`: the client went away
    Disconnect,
    /// Any other event type
    Unknown(String),
}

impl InboundEvent {
    /// Final request event with no body
    pub const fn empty_request() -> Self {
        Self::Request {
            body: Bytes::new(),
            more_body: false,
        }
    }
}

/// Event sent back to the client side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// `http.response.start`
    Start {
        status: u16,
        headers: Vec<(Bytes, Bytes)>,
    },
    /// `http.response.body`; the final one has `more_body == false`
    Body { body: Bytes, more_body: bool },
}

impl ResponseEvent {
    /// Terminal body event with no content
    pub const fn end() -> Self {
        Self::Body {
            body: Bytes::new(),
            more_body: false,
        }
    }
}

/// Awaitable source of inbound events
#[async_trait]
pub trait EventSource: Send {
    /// Next inbound event, or `None` once the inbound side is closed
    async fn receive(&mut self) -> Option<InboundEvent>;
}

/// Awaitable sink for response events
#[async_trait]
pub trait EventSink: Send {
    async fn send(&mut self, event: ResponseEvent) -> Result<()>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<InboundEvent> {
    async fn receive(&mut self) -> Option<InboundEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSink for mpsc::Sender<ResponseEvent> {
    async fn send(&mut self, event: ResponseEvent) -> Result<()> {
        mpsc::Sender::send(self, event)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

#[async_trait]
impl EventSource for VecDeque<InboundEvent> {
    async fn receive(&mut self) -> Option<InboundEvent> {
        self.pop_front()
    }
}

#[async_trait]
impl EventSink for Vec<ResponseEvent> {
    async fn send(&mut self, event: ResponseEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
