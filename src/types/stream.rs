//! Streaming types.

use serde::{Deserialize, Serialize};

/// One parsed frame of the backend event stream.
///
/// Chunks are transient: the state machine consumes each one once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamChunk {
    /// Message the chunk belongs to.
    pub id: String,
    /// Incremental text to append.
    #[serde(default)]
    pub delta: String,
    /// Terminal marker.
    #[serde(default)]
    pub done: bool,
    /// Terminal error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            delta: delta.into(),
            done: false,
            error: None,
        }
    }

    pub fn done(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            delta: String::new(),
            done: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            delta: String::new(),
            done: false,
            error: Some(error.into()),
        }
    }

    /// Whether this chunk ends the stream, either normally or with an error.
    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Authoritative state of the in-flight assistant message.
///
/// `content` is the target text. It only grows until the stream ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamingState {
    pub message_id: Option<String>,
    pub content: String,
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamingState {
    /// A fresh streaming session for `message_id`.
    pub fn started(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            content: String::new(),
            is_streaming: true,
            error: None,
        }
    }
}

/// The text currently shown to the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayBuffer {
    pub display_text: String,
    pub is_typing: bool,
}

/// Per-stream counters reported when a stream ends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks handed to the consumer.
    pub chunks: u64,
    /// Frames that failed to parse and were skipped.
    pub dropped_frames: u64,
}
