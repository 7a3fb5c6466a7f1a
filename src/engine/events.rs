//! Events emitted by the stream engine.

use std::sync::Arc;

use crate::error::ThinkstreamError;
use crate::types::{StreamChunk, StreamSummary};

/// Callback used for delivering stream events.
pub type StreamEventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// One event from an active stream.
///
/// Every stream ends with exactly one of `Completed`, `Failed`, or
/// `Cancelled`, and nothing is delivered after it.
#[derive(Debug)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    Completed(StreamSummary),
    Failed(ThinkstreamError),
    /// The caller aborted the stream. Not an error.
    Cancelled,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }
}
