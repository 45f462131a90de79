//! Event gateway
//!
//! Asynchronous protocol: the application receives a [`Scope`] plus an event
//! source and sink, drains the request and sends `http.response.start`
//! followed by `http.response.body` events.

use super::{NotFound, NOT_FOUND_BODY};
use crate::error::Result;
use crate::event::{EventSink, EventSource, ResponseEvent, Scope, ScopeKind};
use crate::http::headers;
use crate::registry::FileRegistry;
use crate::responder;
use async_trait::async_trait;
use hyper::body::Bytes;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Asynchronous application
#[async_trait]
pub trait EventApp: Send + Sync {
    async fn call(
        &self,
        scope: Scope,
        source: &mut dyn EventSource,
        sink: &mut dyn EventSink,
    ) -> Result<()>;
}

#[async_trait]
impl EventApp for NotFound {
    async fn call(
        &self,
        _scope: Scope,
        source: &mut dyn EventSource,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        responder::drain_request(source).await?;
        sink.send(ResponseEvent::Start {
            status: 404,
            headers: vec![
                (
                    Bytes::from_static(b"content-type"),
                    Bytes::from_static(b"text/plain"),
                ),
                (
                    Bytes::from_static(b"content-length"),
                    Bytes::from(NOT_FOUND_BODY.len().to_string()),
                ),
            ],
        })
        .await?;
        sink.send(ResponseEvent::Body {
            body: Bytes::from_static(NOT_FOUND_BODY.as_bytes()),
            more_body: false,
        })
        .await
    }
}

/// Serves registered files and forwards other scopes to `app`
pub struct StaticFiles<A> {
    files: Arc<FileRegistry>,
    app: A,
    block_size: NonZeroUsize,
}

impl<A: EventApp> StaticFiles<A> {
    pub const fn new(files: Arc<FileRegistry>, app: A, block_size: NonZeroUsize) -> Self {
        Self {
            files,
            app,
            block_size,
        }
    }
}

#[async_trait]
impl<A: EventApp> EventApp for StaticFiles<A> {
    async fn call(
        &self,
        scope: Scope,
        source: &mut dyn EventSource,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let file = match scope.kind {
            ScopeKind::Http => self.files.get(&scope.path),
            ScopeKind::Websocket => None,
        };
        let Some(file) = file else {
            return self.app.call(scope, source, sink).await;
        };

        let request_headers = headers::from_pairs(&scope.headers);
        responder::drain_request(source).await?;
        responder::serve(
            sink,
            &file,
            &scope.method,
            &request_headers,
            self.block_size,
        )
        .await
    }
}
