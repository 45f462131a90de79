//! File registry
//!
//! Scans a directory once at startup and maps URL paths to shared
//! [`StaticFile`] entities. Pre-compressed siblings (`app.js.gz`,
//! `app.js.br`) are registered as variants of their source file rather than
//! as files of their own.

use crate::config::{CacheMode, StaticConfig};
use crate::error::Result;
use crate::file::{Encoding, FileStat, StatCache, StaticFile};
use crate::http::cache::CachePolicy;
use crate::http::mime::MimeTypes;
use crate::http::HeaderPairs;
use crate::logger;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// URL path to servable file
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: HashMap<String, Arc<StaticFile>>,
    mimetypes: MimeTypes,
    cache_policy: Option<CachePolicy>,
    allow_all_origins: bool,
    index_file: Option<String>,
}

impl FileRegistry {
    pub fn new(config: &StaticConfig) -> Self {
        Self {
            files: HashMap::new(),
            mimetypes: MimeTypes::new(&config.mimetypes),
            cache_policy: cache_policy(config.cache, config.max_age),
            allow_all_origins: config.allow_all_origins,
            index_file: config.index_file.clone(),
        }
    }

    /// Register every regular file under `root`, mounted at URL `prefix`
    ///
    /// Returns the number of files registered (variants not counted).
    pub fn add_files(&mut self, root: &Path, prefix: &str) -> Result<usize> {
        let mut paths = Vec::new();
        collect_files(root, &mut paths)?;
        paths.sort();

        let mut stat_cache = StatCache::new();
        for path in &paths {
            stat_cache.insert(path.clone(), FileStat::read(path)?);
        }

        let prefix = normalize_prefix(prefix);
        let mut registered = 0;
        for path in &paths {
            if is_variant(path, &stat_cache) {
                continue;
            }
            let encodings: Vec<(Encoding, PathBuf)> = Encoding::ALL
                .iter()
                .map(|&encoding| (encoding, with_suffix(path, encoding.suffix())))
                .filter(|(_, variant)| stat_cache.contains_key(variant))
                .collect();

            let file = Arc::new(StaticFile::new(
                path.clone(),
                &encodings,
                self.headers_for(path),
                &stat_cache,
            )?);

            let Some(url) = url_for(root, path, &prefix) else {
                continue;
            };
            if let Some(index_url) = self.index_url(&url) {
                self.files.insert(index_url, Arc::clone(&file));
            }
            self.files.insert(url, file);
            registered += 1;
        }

        logger::log_files_registered(registered, root);
        Ok(registered)
    }

    /// Look a decoded request path up
    pub fn get(&self, path: &str) -> Option<Arc<StaticFile>> {
        self.files.get(path).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Directory URL (ending in `/`) served by an index file URL
    fn index_url(&self, url: &str) -> Option<String> {
        let index_file = self.index_file.as_deref()?;
        let dir = url.strip_suffix(index_file)?;
        dir.ends_with('/').then(|| dir.to_string())
    }

    fn headers_for(&self, path: &Path) -> HeaderPairs {
        let mut headers = vec![(
            "Content-Type".to_string(),
            self.mimetypes.content_type(path),
        )];
        if let Some(policy) = self.cache_policy {
            headers.push(("Cache-Control".to_string(), policy.to_header_value()));
        }
        if self.allow_all_origins {
            headers.push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));
        }
        headers
    }
}

fn cache_policy(mode: CacheMode, max_age: Option<u32>) -> Option<CachePolicy> {
    match mode {
        CacheMode::NoCache => Some(CachePolicy::NoCache),
        CacheMode::Public => max_age.map(CachePolicy::Public),
        CacheMode::Private => max_age.map(CachePolicy::Private),
    }
}

/// Symlinked files are served; symlinked directories are never entered
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            out.push(path);
        }
    }
    Ok(())
}

/// `app.js.gz` is a variant when `app.js` exists next to it
fn is_variant(path: &Path, stat_cache: &StatCache) -> bool {
    let Some(name) = path.to_str() else {
        return false;
    };
    Encoding::ALL.iter().any(|encoding| {
        name.strip_suffix(encoding.suffix())
            .is_some_and(|source| stat_cache.contains_key(Path::new(source)))
    })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn url_for(root: &Path, path: &Path, prefix: &str) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{prefix}{}", parts.join("/")))
}
