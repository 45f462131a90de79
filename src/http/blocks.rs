//! Block reader
//!
//! Streams a declared number of bytes from a reader in fixed-size chunks,
//! without ever holding more than one block in memory.

use crate::error::{Error, Result};
use hyper::body::Bytes;
use std::io::Read;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;

/// Lazy, single-pass sequence of chunks covering exactly `content_length` bytes
///
/// Every chunk is `block_size` bytes long except the last, which holds the
/// remainder. A source that runs dry early yields [`Error::TruncatedContent`]
/// at the chunk that cannot be filled, after which the reader is exhausted.
#[derive(Debug)]
pub struct BlockReader<R> {
    source: R,
    block_size: NonZeroUsize,
    content_length: u64,
    produced: u64,
}

/// Read `content_length` bytes from the current position of `source`
///
/// # Examples
/// ```
/// use std::io::{Cursor, Seek, SeekFrom};
/// use std::num::NonZeroUsize;
/// use static_responder::http::blocks::read_blocks;
///
/// let mut content = Cursor::new(b"0123456789".to_vec());
/// content.seek(SeekFrom::Start(4)).unwrap();
/// let blocks: Vec<_> = read_blocks(content, 5, NonZeroUsize::new(2).unwrap())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(blocks, vec![&b"45"[..], &b"67"[..], &b"8"[..]]);
/// ```
pub const fn read_blocks<R: Read>(
    source: R,
    content_length: u64,
    block_size: NonZeroUsize,
) -> BlockReader<R> {
    BlockReader {
        source,
        block_size,
        content_length,
        produced: 0,
    }
}

impl<R> BlockReader<R> {
    /// Bytes still owed to the consumer
    pub const fn remaining(&self) -> u64 {
        self.content_length - self.produced
    }

    fn next_block_len(&self) -> usize {
        usize::try_from(self.remaining())
            .map_or(self.block_size.get(), |r| r.min(self.block_size.get()))
    }

    /// Stop producing; later calls to `next` return `None`
    fn exhaust(&mut self) {
        self.produced = self.content_length;
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }

        let want = self.next_block_len();
        let mut block = Vec::with_capacity(want);
        let filled = match (&mut self.source)
            .take(want as u64)
            .read_to_end(&mut block)
        {
            Ok(n) => n,
            Err(e) => {
                self.exhaust();
                return Some(Err(Error::Io(e)));
            }
        };

        if filled < want {
            let read = self.produced + filled as u64;
            let expected = self.content_length;
            self.exhaust();
            return Some(Err(Error::TruncatedContent { expected, read }));
        }

        self.produced += filled as u64;
        Some(Ok(Bytes::from(block)))
    }
}

impl<R: Read> FusedIterator for BlockReader<R> {}
