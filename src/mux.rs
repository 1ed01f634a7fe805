//! Stream multiplexer.
//!
//! Drains any number of async byte sources (a child's stdout and stderr) plus a
//! non-blocking key source without ever blocking on one source while another
//! has data. Each wait is bounded by the poll interval; a timeout surfaces as
//! `MuxEvent::Idle` so callers can animate and poll keys without busy-spinning.

use futures::StreamExt;
use futures::stream::{self, BoxStream, SelectAll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::Result;
use crate::presenter::{KeyCommand, KeySource};

/// Where a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Stdout,
    Stderr,
}

/// One unit read from a source: a full line including its newline, or the
/// trailing partial line at end of stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: SourceTag,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Text of the chunk without its line terminator.
    pub fn text(&self) -> String {
        let s = String::from_utf8_lossy(&self.data);
        s.trim_end_matches(['\n', '\r']).to_string()
    }
}

/// What a single wait produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    Chunk(Chunk),
    Key(KeyCommand),
    /// Poll interval elapsed with nothing ready
    Idle,
    /// Every byte source reached end of stream
    Drained,
}

/// A key source that never has anything to say.
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll_key(&mut self) -> Result<Option<KeyCommand>> {
        Ok(None)
    }
}

fn line_stream<R>(source: SourceTag, reader: R) -> BoxStream<'static, std::io::Result<Chunk>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let reader = BufReader::new(reader);
    stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(Chunk { source, data: buf }), Some(reader))),
            // surface the error once, then end this source
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

/// Multiplexes tagged byte sources against a key source.
pub struct StreamMultiplexer {
    sources: SelectAll<BoxStream<'static, std::io::Result<Chunk>>>,
    poll_interval: Duration,
}

impl StreamMultiplexer {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            sources: SelectAll::new(),
            poll_interval,
        }
    }

    /// Add a readable source to the wait set.
    pub fn add_source<R>(&mut self, tag: SourceTag, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.sources.push(line_stream(tag, reader));
    }

    /// True once every byte source has been removed.
    pub fn is_drained(&self) -> bool {
        self.sources.is_empty()
    }

    /// Drop all remaining sources, e.g. when a grandchild keeps a pipe open.
    pub fn close(&mut self) {
        self.sources.clear();
    }

    /// Wait for the next event: a key, a chunk, an idle tick, or drained.
    ///
    /// Keys are checked before every wait so they are never starved by a
    /// chatty source.
    pub async fn next_event<K>(&mut self, keys: &mut K) -> Result<MuxEvent>
    where
        K: KeySource + ?Sized,
    {
        if let Some(key) = keys.poll_key()? {
            return Ok(MuxEvent::Key(key));
        }
        if self.sources.is_empty() {
            return Ok(MuxEvent::Drained);
        }

        match tokio::time::timeout(self.poll_interval, self.sources.next()).await {
            Ok(Some(Ok(chunk))) => Ok(MuxEvent::Chunk(chunk)),
            Ok(Some(Err(e))) => {
                log::warn!("stream read error, dropping source: {}", e);
                Ok(MuxEvent::Idle)
            }
            Ok(None) => Ok(MuxEvent::Drained),
            Err(_) => Ok(MuxEvent::Idle),
        }
    }
}
