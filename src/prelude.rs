//! Convenience re-exports for common use.

pub use crate::config::{RevealConfig, ThinkingConfig, ThinkstreamConfig};
pub use crate::engine::{StreamEngine, StreamEvent, StreamEventSink};
pub use crate::error::{Result, ThinkstreamError};
pub use crate::thinking::{AppendOutcome, ThinkingMachine, TurnControls};
pub use crate::transport::FrameMode;
pub use crate::turn::{StepCommand, TurnCommand, TurnDriver, TurnOutcome};
pub use crate::types::{
    DisplayBuffer, RenderSnapshot, StepId, StepMeta, StepStatus, StreamChunk, StreamingState,
    ThinkingSessionState, ThoughtStep, ToolKind,
};
pub use crate::typewriter::{DisplayReconciler, MotionPreference, TickOutcome};
