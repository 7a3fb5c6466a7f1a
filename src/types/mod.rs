//! Core types for thinkstream.

pub mod stream;
pub mod thought;

pub use stream::*;
pub use thought::*;

use serde::{Deserialize, Serialize};

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub thinking: ThinkingSessionState,
    pub streaming: StreamingState,
    pub display: DisplayBuffer,
}
