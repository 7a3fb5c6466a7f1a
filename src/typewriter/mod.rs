//! Display reconciliation: reveals streamed text at a bounded rate.
//!
//! The reconciler holds the authoritative *target* text and a *display*
//! prefix of it. Each [`DisplayReconciler::tick`] advances the display toward
//! the target, capped at one advance per frame budget, so bursty network
//! delivery still reads as steady typing.

pub mod motion;

pub use motion::MotionPreference;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RevealConfig;
use crate::error::{Result, ThinkstreamError};
use crate::types::DisplayBuffer;

/// Callback fired once per convergence.
pub type CompletionSink = Arc<dyn Fn() + Send + Sync>;

/// What a call to [`DisplayReconciler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to reveal.
    Idle,
    /// Frame budget not yet elapsed; nothing changed.
    Deferred,
    /// Revealed `revealed` characters, more remain.
    Advanced { revealed: usize },
    /// Display caught up with the target.
    Converged,
}

pub struct DisplayReconciler {
    target: String,
    /// Byte length of the displayed prefix. Always a char boundary.
    shown: usize,
    typing: bool,
    last_frame: Option<Instant>,
    completion_fired: bool,
    chars_per_second: f64,
    frame_budget: Duration,
    motion: MotionPreference,
    on_complete: Option<CompletionSink>,
}

impl std::fmt::Debug for DisplayReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayReconciler")
            .field("target_len", &self.target.len())
            .field("shown", &self.shown)
            .field("typing", &self.typing)
            .field("chars_per_second", &self.chars_per_second)
            .field("frame_budget", &self.frame_budget)
            .field("on_complete", &self.on_complete.as_ref().map(|_| ".."))
            .finish()
    }
}

impl DisplayReconciler {
    pub fn new(config: &RevealConfig, motion: MotionPreference) -> Self {
        Self {
            target: String::new(),
            shown: 0,
            typing: false,
            last_frame: None,
            completion_fired: true,
            chars_per_second: config.chars_per_second,
            frame_budget: config.frame_budget(),
            motion,
            on_complete: None,
        }
    }

    pub fn with_completion_sink(mut self, sink: CompletionSink) -> Self {
        self.on_complete = Some(sink);
        self
    }

    pub fn display_text(&self) -> &str {
        &self.target[..self.shown]
    }

    pub fn target_text(&self) -> &str {
        &self.target
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn buffer(&self) -> DisplayBuffer {
        DisplayBuffer {
            display_text: self.display_text().to_string(),
            is_typing: self.typing,
        }
    }

    /// Point the display at a new target.
    ///
    /// The target may only grow: text already on screen is never rewritten.
    pub fn set_target(&mut self, text: &str) -> Result<()> {
        if text == self.target {
            return Ok(());
        }
        let Some(added) = text.strip_prefix(self.target.as_str()) else {
            return Err(ThinkstreamError::InvalidState(
                "target text may only grow while a message is displayed".into(),
            ));
        };
        self.append_target(added);
        Ok(())
    }

    /// Extend the target by `delta`.
    pub fn append_target(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.target.push_str(delta);
        if !self.typing {
            self.typing = true;
            self.completion_fired = false;
            self.last_frame = None;
        }
        if self.motion.reduced() {
            self.converge();
        }
    }

    /// When the next frame should run, if one is wanted.
    pub fn next_frame_at(&self) -> Option<Instant> {
        if !self.typing {
            return None;
        }
        Some(
            self.last_frame
                .map(|last| last + self.frame_budget)
                .unwrap_or_else(Instant::now),
        )
    }

    /// Advance the display for a redraw at `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.typing {
            return TickOutcome::Idle;
        }
        if self.motion.reduced() {
            self.converge();
            return TickOutcome::Converged;
        }

        let elapsed = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => self.frame_budget,
        };
        if elapsed < self.frame_budget {
            return TickOutcome::Deferred;
        }

        let budget = (self.chars_per_second * elapsed.as_secs_f64()).floor();
        let count = if budget >= 1.0 { budget as usize } else { 1 };
        let revealed = self.reveal(count);
        self.last_frame = Some(now);

        if self.shown == self.target.len() {
            self.converge();
            TickOutcome::Converged
        } else {
            TickOutcome::Advanced { revealed }
        }
    }

    /// Show the whole target at once. Returns whether completion fired.
    pub fn skip_to_end(&mut self) -> bool {
        self.converge()
    }

    /// Clear both texts and drop any pending frame.
    pub fn reset(&mut self) {
        self.target.clear();
        self.shown = 0;
        self.typing = false;
        self.last_frame = None;
        self.completion_fired = true;
    }

    fn reveal(&mut self, count: usize) -> usize {
        let hidden = &self.target[self.shown..];
        let (advance, revealed) = match hidden.char_indices().nth(count) {
            Some((offset, _)) => (offset, count),
            None => (hidden.len(), hidden.chars().count()),
        };
        self.shown += advance;
        revealed
    }

    fn converge(&mut self) -> bool {
        self.shown = self.target.len();
        self.typing = false;
        self.last_frame = None;
        if self.completion_fired {
            return false;
        }
        self.completion_fired = true;
        if let Some(sink) = &self.on_complete {
            sink();
        }
        true
    }
}
