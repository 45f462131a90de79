//! Responder state machine
//!
//! Turns one request against a [`StaticFile`] into an ordered sequence of
//! protocol-agnostic [`Event`]s:
//!
//! ```text
//! Deciding -> {NotModified, FullContent, PartialContent, MethodNotAllowed}
//!          -> StreamingBody (0..n chunks) -> Complete
//! ```
//!
//! [`ResponseEvents`] is a plain iterator, so the blocking gateway can hand it
//! to a caller that pulls chunks after the call returns, while [`serve`] drives
//! the same iterator through an awaitable [`EventSink`].

use crate::error::{Error, Result};
use crate::event::{EventSink, EventSource, InboundEvent, ResponseEvent};
use crate::file::{Representation, StaticFile};
use crate::http::blocks::{read_blocks, BlockReader};
use crate::http::headers::to_byte_pairs;
use crate::http::range::{parse_range_header, RangeParseResult};
use crate::http::{cache, HeaderPairs};
use crate::logger;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, ACCEPT_ENCODING, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use hyper::{Method, StatusCode};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Extra headers that survive into a 304 response
const NOT_MODIFIED_HEADERS: [&str; 3] = ["Cache-Control", "Content-Location", "Expires"];

/// Result of the decision phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotModified,
    FullContent,
    PartialContent,
    MethodNotAllowed,
}

impl Outcome {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotModified => StatusCode::NOT_MODIFIED,
            Self::FullContent => StatusCode::OK,
            Self::PartialContent => StatusCode::PARTIAL_CONTENT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// Bytes of a representation to stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySpan {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
}

/// Everything decided about a response before any byte is read
#[derive(Debug, Clone)]
pub struct Response {
    pub outcome: Outcome,
    pub headers: HeaderPairs,
    /// `None` for HEAD, 304 and 405
    pub body: Option<BodySpan>,
}

impl Response {
    pub const fn status(&self) -> StatusCode {
        self.outcome.status()
    }
}

/// 405 with `Allow: GET, HEAD` and no body
pub fn method_not_allowed() -> Response {
    Response {
        outcome: Outcome::MethodNotAllowed,
        headers: vec![("Allow".to_string(), "GET, HEAD".to_string())],
        body: None,
    }
}

/// Decide how to answer `method` with `request_headers` for `file`
pub fn respond(file: &StaticFile, method: &Method, request_headers: &HeaderMap) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return method_not_allowed();
    }

    let header = |name: HeaderName| request_headers.get(name).and_then(|v| v.to_str().ok());
    // List-valued headers may arrive split over several lines
    let list_header = |name: HeaderName| {
        let values: Vec<&str> = request_headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    };

    if cache::is_not_modified(
        list_header(IF_NONE_MATCH).as_deref(),
        header(IF_MODIFIED_SINCE),
        file.etag(),
        file.last_modified(),
    ) {
        return not_modified(file);
    }

    let selected = file.select(list_header(ACCEPT_ENCODING).as_deref());
    let mut response_headers = validators(file);

    // Invalid or unsatisfiable ranges fall back to the full representation
    let (outcome, start, length, content_range) =
        match parse_range_header(header(RANGE), selected.size) {
            RangeParseResult::Valid(range) => (
                Outcome::PartialContent,
                range.start,
                range.content_length(),
                Some(range.content_range(selected.size)),
            ),
            RangeParseResult::NotSatisfiable | RangeParseResult::None => {
                (Outcome::FullContent, 0, selected.size, None)
            }
        };

    response_headers.push(("Content-Length".to_string(), length.to_string()));
    push_encoding_headers(&mut response_headers, file, selected);
    if let Some(content_range) = content_range {
        response_headers.push(("Content-Range".to_string(), content_range));
    }
    response_headers.extend(file.headers().iter().cloned());

    let body = (method == Method::GET).then(|| BodySpan {
        path: selected.path.clone(),
        start,
        length,
    });

    Response {
        outcome,
        headers: response_headers,
        body,
    }
}

fn validators(file: &StaticFile) -> HeaderPairs {
    vec![
        (
            "Last-Modified".to_string(),
            file.last_modified_header().to_string(),
        ),
        ("ETag".to_string(), file.etag().to_string()),
    ]
}

fn push_encoding_headers(
    response_headers: &mut HeaderPairs,
    file: &StaticFile,
    selected: &Representation,
) {
    if let Some(encoding) = selected.encoding {
        response_headers.push(("Content-Encoding".to_string(), encoding.token().to_string()));
    }
    if !file.alternatives().is_empty() {
        response_headers.push(("Vary".to_string(), "Accept-Encoding".to_string()));
    }
}

fn not_modified(file: &StaticFile) -> Response {
    let mut response_headers = validators(file);
    if !file.alternatives().is_empty() {
        response_headers.push(("Vary".to_string(), "Accept-Encoding".to_string()));
    }
    response_headers.extend(
        file.headers()
            .iter()
            .filter(|(name, _)| {
                NOT_MODIFIED_HEADERS
                    .iter()
                    .any(|kept| name.eq_ignore_ascii_case(kept))
            })
            .cloned(),
    );
    Response {
        outcome: Outcome::NotModified,
        headers: response_headers,
        body: None,
    }
}

/// One step of a response, independent of the protocol carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start {
        status: StatusCode,
        headers: HeaderPairs,
    },
    /// A body chunk; more events follow
    Body(Bytes),
    /// Terminal event, always emitted exactly once
    End,
}

enum State {
    /// Decision made, start event not yet emitted
    Deciding(Response),
    /// Start emitted, representation not yet opened
    Opening(BodySpan),
    StreamingBody(BlockReader<File>),
    Finishing,
    Complete,
}

/// Lazy event sequence for one response
///
/// Yields exactly one [`Event::Start`], zero or more [`Event::Body`] chunks in
/// byte order, then one [`Event::End`]. The representation is opened only
/// when the first chunk is requested and is closed as soon as the body is
/// complete, an error occurs, or the iterator is dropped. After an error the
/// iterator is exhausted; `End` is not emitted for an aborted body.
pub struct ResponseEvents {
    state: State,
    block_size: NonZeroUsize,
}

impl ResponseEvents {
    pub const fn new(response: Response, block_size: NonZeroUsize) -> Self {
        Self {
            state: State::Deciding(response),
            block_size,
        }
    }

    /// Whether the terminal event has already been produced (or the stream aborted)
    pub const fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete)
    }

    fn open(&self, span: &BodySpan) -> Result<BlockReader<File>> {
        let mut source = File::open(&span.path)?;
        source.seek(SeekFrom::Start(span.start))?;
        Ok(read_blocks(source, span.length, self.block_size))
    }
}

impl Iterator for ResponseEvents {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Complete) {
                State::Deciding(response) => {
                    let status = response.status();
                    self.state = match response.body {
                        Some(span) => State::Opening(span),
                        None => State::Finishing,
                    };
                    return Some(Ok(Event::Start {
                        status,
                        headers: response.headers,
                    }));
                }
                State::Opening(span) => match self.open(&span) {
                    Ok(reader) => self.state = State::StreamingBody(reader),
                    Err(e) => {
                        logger::log_error(&format!(
                            "Failed to open '{}': {e}",
                            span.path.display()
                        ));
                        return Some(Err(e));
                    }
                },
                State::StreamingBody(mut reader) => match reader.next() {
                    Some(Ok(chunk)) => {
                        self.state = State::StreamingBody(reader);
                        return Some(Ok(Event::Body(chunk)));
                    }
                    Some(Err(e)) => {
                        if let Error::TruncatedContent { expected, read } = &e {
                            logger::log_truncated(*expected, *read);
                        }
                        return Some(Err(e));
                    }
                    None => self.state = State::Finishing,
                },
                State::Finishing => return Some(Ok(Event::End)),
                State::Complete => return None,
            }
        }
    }
}

/// Build the event sequence for a request in one step
pub fn response_events(
    file: &StaticFile,
    method: &Method,
    request_headers: &HeaderMap,
    block_size: NonZeroUsize,
) -> ResponseEvents {
    ResponseEvents::new(respond(file, method, request_headers), block_size)
}

/// Consume the request body until the client signals completion
///
/// `http.disconnect` or a closed channel also end the drain; any event type
/// outside the request vocabulary is a [`Error::Protocol`] violation.
pub async fn drain_request<S>(source: &mut S) -> Result<()>
where
    S: EventSource + ?Sized,
{
    loop {
        match source.receive().await {
            Some(InboundEvent::Request { more_body: true, .. }) => {}
            Some(InboundEvent::Request { more_body: false, .. } | InboundEvent::Disconnect)
            | None => return Ok(()),
            Some(InboundEvent::Unknown(event_type)) => {
                return Err(Error::Protocol(event_type));
            }
        }
    }
}

/// Send the full response for `file` through an event sink
///
/// Completes once the terminal body event has been sent. Errors abort the
/// response without a terminal event; the open representation is closed on
/// every path.
pub async fn serve<S>(
    sink: &mut S,
    file: &StaticFile,
    method: &Method,
    request_headers: &HeaderMap,
    block_size: NonZeroUsize,
) -> Result<()>
where
    S: EventSink + ?Sized,
{
    for event in response_events(file, method, request_headers, block_size) {
        let event = match event? {
            Event::Start { status, headers } => ResponseEvent::Start {
                status: status.as_u16(),
                headers: to_byte_pairs(&headers),
            },
            Event::Body(body) => ResponseEvent::Body {
                body,
                more_body: true,
            },
            Event::End => ResponseEvent::end(),
        };
        sink.send(event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Encoding, FileStat, StatCache};
    use hyper::header::HeaderValue;
    use std::collections::VecDeque;
    use std::io::Write;
    use tempfile::TempDir;

    const CONTENT: &[u8] = b"01234567890123456789";
    const EPOCH: i64 = 1_000_000_000;
    const MODIFIED: &str = "Sun, 09 Sep 2001 01:46:40 GMT";

    struct Sample {
        _dir: TempDir,
        file: StaticFile,
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    fn stat(size: usize) -> FileStat {
        FileStat {
            size: size as u64,
            mtime: EPOCH,
            is_file: true,
        }
    }

    fn sample_with(content: &[u8], gzip: Option<&[u8]>) -> Sample {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sample.js", content);
        let mut cache = StatCache::from([(path.clone(), stat(content.len()))]);
        let mut encodings = Vec::new();
        if let Some(gz) = gzip {
            let gz_path = write(&dir, "sample.js.gz", gz);
            cache.insert(gz_path.clone(), stat(gz.len()));
            encodings.push((Encoding::Gzip, gz_path));
        }
        let file = StaticFile::new(path, &encodings, Vec::new(), &cache).unwrap();
        Sample { _dir: dir, file }
    }

    fn sample() -> Sample {
        sample_with(CONTENT, None)
    }

    fn block(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn request(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(Bytes, Bytes)> {
        items
            .iter()
            .map(|(n, v)| (Bytes::from(n.to_string()), Bytes::from(v.to_string())))
            .collect()
    }

    async fn serve_to_vec(
        file: &StaticFile,
        method: &Method,
        headers: &HeaderMap,
        block_size: usize,
    ) -> Vec<ResponseEvent> {
        let mut sent = Vec::new();
        serve(&mut sent, file, method, headers, block(block_size))
            .await
            .unwrap();
        sent
    }

    fn body_of(events: &[ResponseEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                ResponseEvent::Body { body, .. } => Some(body.to_vec()),
                ResponseEvent::Start { .. } => None,
            })
            .flatten()
            .collect()
    }

    #[tokio::test]
    async fn test_serve_get_in_blocks() {
        let sample = sample();
        let etag = sample.file.etag().to_string();
        for block_size in [10, 20] {
            let events = serve_to_vec(&sample.file, &Method::GET, &HeaderMap::new(), block_size).await;

            let mut expected = vec![ResponseEvent::Start {
                status: 200,
                headers: pairs(&[
                    ("last-modified", MODIFIED),
                    ("etag", etag.as_str()),
                    ("content-length", "20"),
                ]),
            }];
            for chunk in CONTENT.chunks(block_size) {
                expected.push(ResponseEvent::Body {
                    body: Bytes::copy_from_slice(chunk),
                    more_body: true,
                });
            }
            expected.push(ResponseEvent::end());
            assert_eq!(events, expected);
        }
    }

    #[tokio::test]
    async fn test_head_matches_get_headers_without_body() {
        let sample = sample();
        let get = serve_to_vec(&sample.file, &Method::GET, &HeaderMap::new(), 10).await;
        let head = serve_to_vec(&sample.file, &Method::HEAD, &HeaderMap::new(), 10).await;
        assert_eq!(head, vec![get[0].clone(), ResponseEvent::end()]);
    }

    #[tokio::test]
    async fn test_if_none_match_short_circuits() {
        let sample = sample();
        let etag = sample.file.etag().to_string();
        let headers = request(&[("if-none-match", etag.as_str()), ("range", "bytes=2-4")]);
        let events = serve_to_vec(&sample.file, &Method::GET, &headers, 10).await;
        assert_eq!(
            events,
            vec![
                ResponseEvent::Start {
                    status: 304,
                    headers: pairs(&[("last-modified", MODIFIED), ("etag", etag.as_str())]),
                },
                ResponseEvent::end(),
            ]
        );
    }

    #[test]
    fn test_if_modified_since() {
        let sample = sample();
        let fresh = request(&[("if-modified-since", MODIFIED)]);
        assert_eq!(
            respond(&sample.file, &Method::GET, &fresh).outcome,
            Outcome::NotModified
        );
        let stale = request(&[("if-modified-since", "Sat, 08 Sep 2001 00:00:00 GMT")]);
        assert_eq!(
            respond(&sample.file, &Method::GET, &stale).outcome,
            Outcome::FullContent
        );
        let mismatched = request(&[("if-none-match", "\"other\""), ("if-modified-since", MODIFIED)]);
        assert_eq!(
            respond(&sample.file, &Method::GET, &mismatched).outcome,
            Outcome::FullContent
        );
    }

    #[tokio::test]
    async fn test_range_request() {
        let sample = sample_with(b"0123456789", None);
        let headers = request(&[("range", "bytes=2-4")]);
        let events = serve_to_vec(&sample.file, &Method::GET, &headers, 2).await;
        let ResponseEvent::Start { status, headers } = &events[0] else {
            panic!("expected start event");
        };
        assert_eq!(*status, 206);
        assert!(headers.contains(&(Bytes::from("content-range"), Bytes::from("bytes 2-4/10"))));
        assert!(headers.contains(&(Bytes::from("content-length"), Bytes::from("3"))));
        assert_eq!(body_of(&events), b"234");
        assert_eq!(events.last(), Some(&ResponseEvent::end()));
    }

    #[test]
    fn test_suffix_and_open_ranges() {
        let sample = sample_with(b"0123456789", None);
        let suffix = respond(&sample.file, &Method::GET, &request(&[("range", "bytes=-3")]));
        assert_eq!(suffix.outcome, Outcome::PartialContent);
        assert_eq!(suffix.body.map(|b| (b.start, b.length)), Some((7, 3)));

        let open = respond(&sample.file, &Method::GET, &request(&[("range", "bytes=6-")]));
        assert_eq!(open.body.map(|b| (b.start, b.length)), Some((6, 4)));
    }

    #[test]
    fn test_bad_ranges_serve_full_content() {
        let sample = sample_with(b"0123456789", None);
        for range in ["bytes=20-30", "bytes=5-2", "bytes=0-1,4-5", "lines=1-2", "bytes=x-"] {
            let response = respond(&sample.file, &Method::GET, &request(&[("range", range)]));
            assert_eq!(response.outcome, Outcome::FullContent, "{range}");
            assert_eq!(response.body.map(|b| b.length), Some(10));
            assert!(response.headers.iter().all(|(n, _)| n != "Content-Range"));
        }
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let sample = sample();
        let events = serve_to_vec(&sample.file, &Method::POST, &HeaderMap::new(), 10).await;
        assert_eq!(
            events,
            vec![
                ResponseEvent::Start {
                    status: 405,
                    headers: pairs(&[("allow", "GET, HEAD")]),
                },
                ResponseEvent::end(),
            ]
        );
    }

    #[tokio::test]
    async fn test_encoded_variant_keeps_primary_validators() {
        let sample = sample_with(CONTENT, Some(b"gzipped"));
        let etag = sample.file.etag().to_string();
        let headers = request(&[("accept-encoding", "gzip, deflate")]);
        let events = serve_to_vec(&sample.file, &Method::GET, &headers, 4).await;
        assert_eq!(
            events[0],
            ResponseEvent::Start {
                status: 200,
                headers: pairs(&[
                    ("last-modified", MODIFIED),
                    ("etag", etag.as_str()),
                    ("content-length", "7"),
                    ("content-encoding", "gzip"),
                    ("vary", "Accept-Encoding"),
                ]),
            }
        );
        assert_eq!(body_of(&events), b"gzipped");

        let plain = respond(&sample.file, &Method::GET, &HeaderMap::new());
        assert!(plain
            .headers
            .contains(&("Vary".to_string(), "Accept-Encoding".to_string())));
        assert!(plain.headers.iter().all(|(n, _)| n != "Content-Encoding"));
    }

    #[tokio::test]
    async fn test_empty_file_still_terminates() {
        let sample = sample_with(b"", None);
        let events = serve_to_vec(&sample.file, &Method::GET, &HeaderMap::new(), 10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ResponseEvent::end());
    }

    #[test]
    fn test_truncated_file_aborts_stream() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "short.txt", b"0123");
        let cache = StatCache::from([(path.clone(), stat(10))]);
        let file = StaticFile::new(path, &[], Vec::new(), &cache).unwrap();

        let mut events = response_events(&file, &Method::GET, &HeaderMap::new(), block(3));
        assert!(matches!(events.next(), Some(Ok(Event::Start { .. }))));
        assert_eq!(events.next().unwrap().unwrap(), Event::Body(Bytes::from("012")));
        assert!(matches!(
            events.next(),
            Some(Err(Error::TruncatedContent { expected: 10, read: 4 }))
        ));
        assert!(events.is_complete());
        assert!(events.next().is_none());
    }

    #[tokio::test]
    async fn test_drain_request_body() {
        let mut source = VecDeque::from([
            InboundEvent::Request {
                body: Bytes::from("content"),
                more_body: true,
            },
            InboundEvent::Request {
                body: Bytes::from("more content"),
                more_body: true,
            },
            InboundEvent::empty_request(),
        ]);
        drain_request(&mut source).await.unwrap();
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_drain_stops_on_disconnect_or_close() {
        let mut source = VecDeque::from([InboundEvent::Disconnect, InboundEvent::empty_request()]);
        drain_request(&mut source).await.unwrap();
        assert_eq!(source.len(), 1);

        let mut closed: VecDeque<InboundEvent> = VecDeque::new();
        drain_request(&mut closed).await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_rejects_unknown_event() {
        let mut source = VecDeque::from([InboundEvent::Unknown("http.weirdstuff".to_string())]);
        let err = drain_request(&mut source).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref t) if t == "http.weirdstuff"));
    }
}
