//! Static file entity
//!
//! A [`StaticFile`] describes one servable file: where its bytes live, its
//! validators, and any pre-encoded variants registered alongside it. It is
//! built from a metadata snapshot ([`StatCache`]) and never touches the
//! filesystem metadata itself, so it can be shared read-only across requests.

use crate::error::{Error, Result};
use crate::http::cache;
use crate::http::HeaderPairs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Metadata snapshot of one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// Modification time in epoch seconds
    pub mtime: i64,
    pub is_file: bool,
}

impl FileStat {
    /// Take a snapshot from the filesystem
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        Ok(Self {
            size: metadata.len(),
            mtime,
            is_file: metadata.is_file(),
        })
    }
}

/// Metadata snapshots indexed by path
pub type StatCache = HashMap<PathBuf, FileStat>;

/// Content codings a file may be pre-encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Brotli,
    Gzip,
}

impl Encoding {
    pub const ALL: [Self; 2] = [Self::Brotli, Self::Gzip];

    /// `Accept-Encoding` / `Content-Encoding` token
    pub const fn token(self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
        }
    }

    /// File name suffix of the encoded variant
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Brotli => ".br",
            Self::Gzip => ".gz",
        }
    }
}

/// One concrete byte source for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub path: PathBuf,
    pub size: u64,
    /// `None` for the primary, uncompressed bytes
    pub encoding: Option<Encoding>,
}

/// A servable file and its registered variants
#[derive(Debug, Clone)]
pub struct StaticFile {
    primary: Representation,
    /// Sorted by size, smallest first
    alternatives: Vec<Representation>,
    last_modified: i64,
    last_modified_header: String,
    etag: String,
    headers: HeaderPairs,
}

impl StaticFile {
    /// Build an entity from cached metadata
    ///
    /// `encodings` lists the variants to offer; each must have a snapshot in
    /// `stat_cache` just like the primary path.
    pub fn new(
        path: impl Into<PathBuf>,
        encodings: &[(Encoding, PathBuf)],
        headers: HeaderPairs,
        stat_cache: &StatCache,
    ) -> Result<Self> {
        let path = path.into();
        let stat = regular_file_stat(&path, stat_cache)?;

        let mut alternatives = encodings
            .iter()
            .map(|(encoding, alt_path)| {
                regular_file_stat(alt_path, stat_cache).map(|alt| Representation {
                    path: alt_path.clone(),
                    size: alt.size,
                    encoding: Some(*encoding),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        alternatives.sort_by_key(|alt| alt.size);

        Ok(Self {
            primary: Representation {
                path,
                size: stat.size,
                encoding: None,
            },
            alternatives,
            last_modified: stat.mtime,
            last_modified_header: cache::format_http_date(stat.mtime),
            etag: cache::generate_etag(stat.mtime, stat.size),
            headers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.primary.path
    }

    /// Size of the primary representation
    pub const fn size(&self) -> u64 {
        self.primary.size
    }

    /// Modification time in epoch seconds
    pub const fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Modification time as an HTTP-date
    pub fn last_modified_header(&self) -> &str {
        &self.last_modified_header
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn alternatives(&self) -> &[Representation] {
        &self.alternatives
    }

    /// Extra response headers supplied when the entity was built
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Pick the representation to serve for an `Accept-Encoding` value
    ///
    /// The smallest registered variant the client accepts wins; a bare `*`
    /// selects nothing, and `q=0` rejects a coding.
    pub fn select(&self, accept_encoding: Option<&str>) -> &Representation {
        let accept_encoding = accept_encoding.unwrap_or_default().trim();
        if accept_encoding.is_empty() || accept_encoding == "*" {
            return &self.primary;
        }
        self.alternatives
            .iter()
            .find(|alt| {
                alt.encoding
                    .is_some_and(|e| accepts_coding(accept_encoding, e.token()))
            })
            .unwrap_or(&self.primary)
    }
}

fn regular_file_stat(path: &Path, stat_cache: &StatCache) -> Result<FileStat> {
    let stat = stat_cache
        .get(path)
        .ok_or_else(|| Error::MissingFile(path.to_path_buf()))?;
    if !stat.is_file {
        return Err(Error::NotARegularFile(path.to_path_buf()));
    }
    Ok(*stat)
}

/// Whether an `Accept-Encoding` value admits `token`
fn accepts_coding(accept_encoding: &str, token: &str) -> bool {
    accept_encoding.split(',').any(|entry| {
        let mut params = entry.split(';');
        let coding = params.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case(token) {
            return false;
        }
        !params.any(|p| {
            p.trim()
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: i64 = 1_000_000_000;

    fn stat(size: u64) -> FileStat {
        FileStat {
            size,
            mtime: EPOCH,
            is_file: true,
        }
    }

    fn sample_cache() -> StatCache {
        StatCache::from([
            (PathBuf::from("/srv/app.js"), stat(20)),
            (PathBuf::from("/srv/app.js.gz"), stat(12)),
            (PathBuf::from("/srv/app.js.br"), stat(9)),
            (
                PathBuf::from("/srv/dir"),
                FileStat {
                    size: 4096,
                    mtime: EPOCH,
                    is_file: false,
                },
            ),
        ])
    }

    fn compressed() -> StaticFile {
        StaticFile::new(
            "/srv/app.js",
            &[
                (Encoding::Gzip, PathBuf::from("/srv/app.js.gz")),
                (Encoding::Brotli, PathBuf::from("/srv/app.js.br")),
            ],
            Vec::new(),
            &sample_cache(),
        )
        .unwrap()
    }

    #[test]
    fn test_validators() {
        let file = StaticFile::new("/srv/app.js", &[], Vec::new(), &sample_cache()).unwrap();
        assert_eq!(file.size(), 20);
        assert_eq!(file.last_modified(), EPOCH);
        assert_eq!(file.last_modified_header(), "Sun, 09 Sep 2001 01:46:40 GMT");
        assert_eq!(file.etag(), "\"3b9aca00-14\"");
        assert!(file.alternatives().is_empty());
    }

    #[test]
    fn test_same_metadata_same_etag() {
        let a = StaticFile::new("/srv/app.js", &[], Vec::new(), &sample_cache()).unwrap();
        let b = StaticFile::new("/srv/app.js", &[], Vec::new(), &sample_cache()).unwrap();
        assert_eq!(a.etag(), b.etag());

        let mut touched = sample_cache();
        touched.insert(
            PathBuf::from("/srv/app.js"),
            FileStat {
                mtime: EPOCH + 1,
                ..stat(20)
            },
        );
        let c = StaticFile::new("/srv/app.js", &[], Vec::new(), &touched).unwrap();
        assert_ne!(a.etag(), c.etag());
    }

    #[test]
    fn test_missing_and_irregular() {
        let cache = sample_cache();
        assert!(matches!(
            StaticFile::new("/srv/nope.js", &[], Vec::new(), &cache),
            Err(Error::MissingFile(_))
        ));
        assert!(matches!(
            StaticFile::new("/srv/dir", &[], Vec::new(), &cache),
            Err(Error::NotARegularFile(_))
        ));
    }

    #[test]
    fn test_select_smallest_accepted() {
        let file = compressed();
        assert_eq!(file.select(Some("gzip, br")).encoding, Some(Encoding::Brotli));
        assert_eq!(file.select(Some("gzip")).encoding, Some(Encoding::Gzip));
        assert_eq!(file.select(Some("br;q=0, gzip")).encoding, Some(Encoding::Gzip));
        assert_eq!(file.select(Some("GZIP;q=0.5")).encoding, Some(Encoding::Gzip));
    }

    #[test]
    fn test_select_primary() {
        let file = compressed();
        for accept in [None, Some(""), Some("*"), Some("identity"), Some("gzip;q=0, br;q=0")] {
            let chosen = file.select(accept);
            assert_eq!(chosen.encoding, None, "{accept:?}");
            assert_eq!(chosen.size, 20);
        }
    }

    #[test]
    fn test_variants_are_not_guessed() {
        let file = StaticFile::new("/srv/app.js", &[], Vec::new(), &sample_cache()).unwrap();
        assert_eq!(file.select(Some("gzip, br")).path, Path::new("/srv/app.js"));
    }
}
