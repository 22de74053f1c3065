//! Response-body producers and the collaborator contracts behind them.
//!
//! A dispatcher answers a request by choosing a status code and, usually,
//! installing an [`Output`]: the value that knows how to produce the rest
//! of the response body. The writer drains it variant by variant; every
//! resource a producer holds (file handle, cache reference, attachment
//! handle, feed source) is released when the connection is dropped.

use crate::cache::MapRef;
use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::fs::File;

/// Scratch-buffer size for the refill-then-write producers.
pub const SCRATCH_SIZE: usize = 4096;

/// Paged reader over a stored attachment blob.
pub trait AttachmentSource: Send {
    /// Total blob length, used for Content-Length.
    fn len(&self) -> u64;

    /// Reads up to `buf.len()` bytes at `offset`; returns the number of
    /// bytes produced. Zero means the blob is exhausted.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Incremental source for a chunked comet feed.
pub trait FeedSource: Send {
    /// Fills `buf` from the feed at `offset`. Returns the bytes produced
    /// and whether the feed may produce more later. `(0, false)` ends the
    /// feed; a single `b"\n"` is a heartbeat.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<(usize, bool)>;
}

/// How the remaining response body is produced.
pub enum Output {
    /// Nothing installed; a default body is synthesized before writing.
    None,
    /// A complete body held in memory.
    Buffer { bytes: Bytes },
    /// A file streamed through a scratch buffer.
    File { file: File, len: u64 },
    /// A slice of a memory-mapped cache entry.
    Map { map: MapRef },
    /// An attachment blob read page by page.
    Blob { source: Box<dyn AttachmentSource> },
    /// A long-lived chunked feed with a heartbeat cadence.
    Feed {
        source: Box<dyn FeedSource>,
        heartbeat: Duration,
    },
}

impl Output {
    pub fn buffer(bytes: impl Into<Bytes>) -> Self {
        Output::Buffer {
            bytes: bytes.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Output::None)
    }

    /// Streaming producers use chunked transfer coding and keep the
    /// connection open on their own cadence.
    pub fn is_stream(&self) -> bool {
        matches!(self, Output::Feed { .. })
    }

    /// Body length for the Content-Length header; None for streaming
    /// producers, which advertise `Transfer-Encoding: chunked` instead.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Output::None => Some(0),
            Output::Buffer { bytes } => Some(bytes.len() as u64),
            Output::File { len, .. } => Some(*len),
            Output::Map { map } => Some(map.len()),
            Output::Blob { source } => Some(source.len()),
            Output::Feed { .. } => None,
        }
    }
}
