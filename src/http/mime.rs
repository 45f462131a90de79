//! MIME type detection module
//!
//! Maps a file name to its `Content-Type`, with configured overrides taking
//! precedence over the built-in table.

use std::collections::HashMap;
use std::path::Path;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type lookup with per-suffix overrides
#[derive(Debug, Clone, Default)]
pub struct MimeTypes {
    /// Suffix (`.foobar`, or a full file name like `apple-app-site-association`) to type
    overrides: HashMap<String, String>,
}

impl MimeTypes {
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(suffix, mime)| (suffix.to_ascii_lowercase(), mime.clone()))
                .collect(),
        }
    }

    /// Resolve the `Content-Type` for a path
    ///
    /// # Examples
    /// ```
    /// use static_responder::http::mime::MimeTypes;
    /// let types = MimeTypes::default();
    /// assert_eq!(types.content_type("css/site.css".as_ref()), "text/css; charset=utf-8");
    /// assert_eq!(types.content_type("video.mp4".as_ref()), "video/mp4");
    /// assert_eq!(types.content_type("LICENSE".as_ref()), "application/octet-stream");
    /// ```
    pub fn content_type(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if let Some(mime) = self.overrides.get(&name) {
            return mime.clone();
        }

        let extension = name.rsplit_once('.').map(|(_, ext)| ext);
        if let Some(mime) = extension.and_then(|ext| self.overrides.get(&format!(".{ext}"))) {
            return mime.clone();
        }

        let mime = builtin_type(extension);
        if mime.starts_with("text/") || mime == "application/javascript" {
            format!("{mime}; charset=utf-8")
        } else {
            mime.to_string()
        }
    }
}

/// Built-in extension table
fn builtin_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",

        // JavaScript/WASM
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",

        // Video
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv") => "video/ogg",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",

        _ => DEFAULT_CONTENT_TYPE,
    }
}
