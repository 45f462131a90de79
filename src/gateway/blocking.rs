//! Blocking gateway
//!
//! Synchronous call-and-return protocol: the application receives an environ
//! map and a start-response callback, calls the callback once, and returns a
//! lazy body iterator. For static files the iterator owns the open file, so
//! the handle lives exactly as long as the caller keeps iterating.

use super::{status_line, NotFound, NOT_FOUND_BODY};
use crate::error::Result;
use crate::http::{headers, HeaderPairs};
use crate::registry::FileRegistry;
use crate::responder::{self, Event, ResponseEvents};
use hyper::body::Bytes;
use hyper::Method;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Request metadata: `REQUEST_METHOD`, `PATH_INFO`, `HTTP_*` headers
pub type Environ = HashMap<String, String>;

/// Response body chunks, pulled by the caller after `call` returns
pub type Body = Box<dyn Iterator<Item = Result<Bytes>> + Send>;

/// Start-response callback: status line and header pairs
pub type StartResponse<'a> = dyn FnMut(&str, HeaderPairs) + 'a;

/// Synchronous application
pub trait BlockingApp: Send + Sync {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse<'_>) -> Result<Body>;
}

impl BlockingApp for NotFound {
    fn call(&self, _environ: &Environ, start_response: &mut StartResponse<'_>) -> Result<Body> {
        start_response(
            "404 Not Found",
            vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                (
                    "Content-Length".to_string(),
                    NOT_FOUND_BODY.len().to_string(),
                ),
            ],
        );
        Ok(Box::new(std::iter::once(Ok(Bytes::from_static(
            NOT_FOUND_BODY.as_bytes(),
        )))))
    }
}

/// Serves registered files and forwards other paths to `app`
pub struct StaticFiles<A> {
    files: Arc<FileRegistry>,
    app: A,
    block_size: NonZeroUsize,
}

impl<A: BlockingApp> StaticFiles<A> {
    pub const fn new(files: Arc<FileRegistry>, app: A, block_size: NonZeroUsize) -> Self {
        Self {
            files,
            app,
            block_size,
        }
    }
}

impl<A: BlockingApp> BlockingApp for StaticFiles<A> {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse<'_>) -> Result<Body> {
        let path = environ.get("PATH_INFO").map_or("/", String::as_str);
        let Some(file) = self.files.get(path) else {
            return self.app.call(environ, start_response);
        };

        let method = environ
            .get("REQUEST_METHOD")
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok());
        let response = match method {
            Some(method) => responder::respond(&file, &method, &headers::from_environ(environ)),
            None => responder::method_not_allowed(),
        };
        start_response(&status_line(response.status()), response.headers.clone());

        // The start event was already delivered through the callback
        let body = ResponseEvents::new(response, self.block_size)
            .skip(1)
            .filter_map(|event| match event {
                Ok(Event::Body(chunk)) => Some(Ok(chunk)),
                Ok(Event::Start { .. } | Event::End) => None,
                Err(e) => Some(Err(e)),
            });
        Ok(Box::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::error::Error;
    use std::fs;

    struct Captured {
        status: String,
        headers: HeaderPairs,
    }

    fn call(app: &dyn BlockingApp, environ: &Environ) -> (Captured, Vec<Result<Bytes>>) {
        let mut captured = None;
        let body = app
            .call(environ, &mut |status: &str, headers: HeaderPairs| {
                captured = Some(Captured {
                    status: status.to_string(),
                    headers,
                });
            })
            .unwrap();
        let chunks = body.collect();
        (captured.expect("start_response not called"), chunks)
    }

    fn environ(method: &str, path: &str, extra: &[(&str, &str)]) -> Environ {
        let mut environ = Environ::from([
            ("REQUEST_METHOD".to_string(), method.to_string()),
            ("PATH_INFO".to_string(), path.to_string()),
        ]);
        for (k, v) in extra {
            environ.insert((*k).to_string(), (*v).to_string());
        }
        environ
    }

    fn app(root: &std::path::Path) -> StaticFiles<NotFound> {
        let config = StaticConfig {
            max_age: None,
            allow_all_origins: false,
            ..StaticConfig::default()
        };
        let mut files = FileRegistry::new(&config);
        files.add_files(root, "/").unwrap();
        StaticFiles::new(Arc::new(files), NotFound, NonZeroUsize::new(4).unwrap())
    }

    #[test]
    fn test_get_streams_in_blocks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello, world").unwrap();
        let app = app(dir.path());

        let (start, chunks) = call(&app, &environ("GET", "/hello.txt", &[]));
        assert_eq!(start.status, "200 OK");
        assert_eq!(start.headers[2], ("Content-Length".to_string(), "12".to_string()));
        let chunks: Vec<Bytes> = chunks.into_iter().collect::<Result<_>>().unwrap();
        assert_eq!(chunks, vec!["hell", "o, w", "orld"]);
    }

    #[test]
    fn test_head_and_range() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("digits.txt"), "0123456789").unwrap();
        let app = app(dir.path());

        let (head, chunks) = call(&app, &environ("HEAD", "/digits.txt", &[]));
        assert_eq!(head.status, "200 OK");
        assert!(chunks.is_empty());

        let (partial, chunks) = call(
            &app,
            &environ("GET", "/digits.txt", &[("HTTP_RANGE", "bytes=2-4")]),
        );
        assert_eq!(partial.status, "206 Partial Content");
        assert!(partial
            .headers
            .contains(&("Content-Range".to_string(), "bytes 2-4/10".to_string())));
        let body: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect();
        assert_eq!(body, b"234");
    }

    #[test]
    fn test_conditional_request() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.css"), "body{}").unwrap();
        let app = app(dir.path());
        let etag = app.files.get("/a.css").unwrap().etag().to_string();

        let (start, chunks) = call(
            &app,
            &environ("GET", "/a.css", &[("HTTP_IF_NONE_MATCH", etag.as_str())]),
        );
        assert_eq!(start.status, "304 Not Modified");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_missing_method_is_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.css"), "body{}").unwrap();
        let app = app(dir.path());

        let mut no_method = environ("GET", "/a.css", &[]);
        no_method.remove("REQUEST_METHOD");
        let garbage = environ("G E T", "/a.css", &[]);
        for environ in [no_method, garbage] {
            let (start, chunks) = call(&app, &environ);
            assert_eq!(start.status, "405 Method Not Allowed");
            assert_eq!(
                start.headers,
                vec![("Allow".to_string(), "GET, HEAD".to_string())]
            );
            assert!(chunks.is_empty());
        }
    }

    #[test]
    fn test_unknown_path_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (start, chunks) = call(&app, &environ("GET", "/missing", &[]));
        assert_eq!(start.status, "404 Not Found");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_file_removed_after_start_fails_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        fs::write(&path, "soon gone").unwrap();
        let app = app(dir.path());

        let mut captured = None;
        let mut body = app
            .call(&environ("GET", "/gone.txt", &[]), &mut |status: &str, _| {
                captured = Some(status.to_string());
            })
            .unwrap();
        assert_eq!(captured.as_deref(), Some("200 OK"));

        fs::remove_file(&path).unwrap();
        assert!(matches!(body.next(), Some(Err(Error::Io(_)))));
        assert!(body.next().is_none());
    }
}
