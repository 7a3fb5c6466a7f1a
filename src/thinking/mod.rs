//! Thought-step and streaming state machine for one assistant turn.
//!
//! All transitions are plain in-memory updates on `&mut self`. Delayed
//! effects (the debounced hide and the cancel affordance) are deadlines that
//! [`ThinkingMachine::poll`] applies once they pass; a driver can sleep until
//! [`ThinkingMachine::next_deadline`].

pub mod controls;

pub use controls::{ControlFn, TurnControls};

use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::config::ThinkingConfig;
use crate::types::{
    StepId, StepMeta, StepNote, StepStatus, StreamChunk, StreamingState, ThinkingSessionState,
    ThoughtStep,
};

/// Result of offering a chunk to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    /// The chunk belongs to a message other than the tracked one.
    Stale,
}

#[derive(Debug)]
pub struct ThinkingMachine {
    config: ThinkingConfig,
    controls: TurnControls,
    origin: Instant,
    state: ThinkingSessionState,
    streaming: StreamingState,
    shown_at: Option<Instant>,
    hide_at: Option<Instant>,
}

impl ThinkingMachine {
    pub fn new(config: ThinkingConfig, controls: TurnControls) -> Self {
        Self {
            config,
            controls,
            origin: Instant::now(),
            state: ThinkingSessionState::default(),
            streaming: StreamingState::default(),
            shown_at: None,
            hide_at: None,
        }
    }

    pub fn state(&self) -> &ThinkingSessionState {
        &self.state
    }

    pub fn streaming(&self) -> &StreamingState {
        &self.streaming
    }

    fn now_ms(&self) -> u64 {
        Instant::now().duration_since(self.origin).as_millis() as u64
    }

    // --------------------------------------------------------
    // Steps
    // --------------------------------------------------------

    /// Mark `id` active, creating it if needed.
    ///
    /// Without an explicit label the tool's label is used, then the step's.
    ///
    /// Other active steps are left alone; `id` becomes the tracked
    /// active step.
    pub fn start_step(&mut self, id: StepId, label: Option<&str>, meta: StepMeta) {
        let now = self.now_ms();
        let index = match self.state.steps.iter().position(|s| s.id == id) {
            Some(index) => index,
            None => {
                self.state.steps.push(ThoughtStep::pending(id));
                self.state.steps.len() - 1
            }
        };
        let step = &mut self.state.steps[index];
        step.status = StepStatus::Active;
        step.started_at = Some(now);
        step.ended_at = None;
        let fallback = meta.tool.map_or(id.default_label(), |tool| tool.meta().label);
        step.label = label.unwrap_or(fallback).to_string();
        step.tool = meta.tool;
        step.note = meta.note;
        self.state.active_step = Some(id);
        debug!(step = %id, "step started");
    }

    /// Mark `id` done. Returns `false` if the step is unknown or already ended.
    pub fn complete_step(&mut self, id: StepId) -> bool {
        let ended = self.end_step(id, StepStatus::Done, None);
        if ended {
            debug!(step = %id, "step completed");
        }
        ended
    }

    /// Mark `id` failed with an optional short note.
    pub fn fail_step(&mut self, id: StepId, note: Option<&str>) -> bool {
        let ended = self.end_step(id, StepStatus::Error, note.map(StepNote::new));
        if ended {
            debug!(step = %id, "step failed");
        }
        ended
    }

    fn end_step(&mut self, id: StepId, status: StepStatus, note: Option<StepNote>) -> bool {
        let now = self.now_ms();
        let Some(step) = self.state.steps.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        if matches!(step.status, StepStatus::Done | StepStatus::Error) {
            return false;
        }
        step.status = status;
        step.ended_at = Some(now);
        if note.is_some() {
            step.note = note;
        }
        if self.state.active_step == Some(id) {
            self.state.active_step = None;
        }
        true
    }

    // --------------------------------------------------------
    // Visibility
    // --------------------------------------------------------

    /// Show immediately, or hide after the configured delay.
    ///
    /// Showing cancels a pending hide, so a quick hide/show pair never
    /// flickers.
    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            self.hide_at = None;
            if !self.state.visible {
                self.state.visible = true;
                self.state.can_cancel = false;
                self.shown_at = Some(Instant::now());
            }
        } else {
            let delay = self.config.hide_delay();
            self.hide_after(delay);
        }
    }

    /// Schedule a hide `delay` from now, unless one is already due sooner.
    pub fn hide_after(&mut self, delay: Duration) {
        if !self.state.visible {
            return;
        }
        let at = Instant::now() + delay;
        self.hide_at = Some(self.hide_at.map_or(at, |existing| existing.min(at)));
    }

    pub fn hide_pending(&self) -> bool {
        self.hide_at.is_some()
    }

    /// Apply any deadline that has passed. Returns whether state changed.
    pub fn poll(&mut self) -> bool {
        let now = Instant::now();
        let mut changed = false;

        if self.hide_at.is_some_and(|at| now >= at) {
            debug!("thinking overlay hidden");
            self.reset_thinking();
            changed = true;
        }

        if self.state.visible && !self.state.can_cancel {
            if let Some(shown) = self.shown_at {
                if now >= shown + self.config.cancel_delay() {
                    self.state.can_cancel = true;
                    changed = true;
                }
            }
        }

        changed
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        let cancel_gate = match (self.state.visible && !self.state.can_cancel, self.shown_at) {
            (true, Some(shown)) => Some(shown + self.config.cancel_delay()),
            _ => None,
        };
        match (self.hide_at, cancel_gate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // --------------------------------------------------------
    // Streaming
    // --------------------------------------------------------

    /// Begin tracking `message_id`, discarding any previous content.
    pub fn start_streaming(&mut self, message_id: impl Into<String>) {
        let message_id = message_id.into();
        debug!(message_id = %message_id, "streaming started");
        self.streaming = StreamingState::started(message_id);
    }

    /// Apply a chunk to the tracked message.
    pub fn append_chunk(&mut self, chunk: &StreamChunk) -> AppendOutcome {
        if self.streaming.message_id.as_deref() != Some(chunk.id.as_str()) {
            debug!(chunk_id = %chunk.id, "ignoring stale chunk");
            return AppendOutcome::Stale;
        }
        self.streaming.content.push_str(&chunk.delta);
        self.streaming.is_streaming = !chunk.done;
        if let Some(error) = &chunk.error {
            self.streaming.error = Some(error.clone());
        }
        AppendOutcome::Accepted
    }

    pub fn finish_streaming(&mut self) {
        self.streaming.is_streaming = false;
    }

    /// Record a transport failure on the current message.
    ///
    /// An error already carried by a chunk is kept.
    pub fn set_stream_error(&mut self, message: impl Into<String>) {
        if self.streaming.error.is_none() {
            self.streaming.error = Some(message.into());
        }
        self.streaming.is_streaming = false;
    }

    // --------------------------------------------------------
    // Cancel / retry / reset
    // --------------------------------------------------------

    /// Invoke the cancel capability and reset everything.
    ///
    /// Returns `false`, without invoking the capability, when there is
    /// nothing left to cancel.
    pub fn cancel(&mut self) -> bool {
        if self.is_pristine() {
            return false;
        }
        self.controls.cancel();
        self.reset_thinking();
        self.reset_streaming();
        debug!("turn cancelled");
        true
    }

    /// Invoke the retry capability.
    pub fn retry(&self) {
        self.controls.retry();
    }

    pub fn reset_thinking(&mut self) {
        self.state = ThinkingSessionState::default();
        self.shown_at = None;
        self.hide_at = None;
    }

    pub fn reset_streaming(&mut self) {
        self.streaming = StreamingState::default();
    }

    fn is_pristine(&self) -> bool {
        self.state == ThinkingSessionState::default()
            && self.streaming == StreamingState::default()
            && self.hide_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolKind;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn machine() -> ThinkingMachine {
        ThinkingMachine::new(ThinkingConfig::default(), TurnControls::default())
    }

    fn counting_machine() -> (ThinkingMachine, Arc<AtomicUsize>) {
        let cancels = Arc::new(AtomicUsize::new(0));
        let counter = cancels.clone();
        let controls = TurnControls::default().with_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (
            ThinkingMachine::new(ThinkingConfig::default(), controls),
            cancels,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn understand_then_plan() {
        let mut m = machine();
        m.start_step(StepId::Understand, None, StepMeta::default());
        tokio::time::advance(Duration::from_millis(40)).await;
        m.complete_step(StepId::Understand);
        m.start_step(StepId::Plan, None, StepMeta::default());

        let state = m.state();
        let understand = state.step(StepId::Understand).unwrap();
        assert_eq!(understand.status, StepStatus::Done);
        assert!(understand.ended_at.is_some());
        assert_eq!(understand.duration_ms(), Some(40));
        assert_eq!(state.step(StepId::Plan).unwrap().status, StepStatus::Active);
        assert_eq!(state.active_step, Some(StepId::Plan));
        assert_eq!(state.headline(), Some("Planning the answer"));
    }

    #[test]
    fn steps_keep_first_start_order_and_upsert_by_id() {
        let mut m = machine();
        m.start_step(StepId::Retrieve, None, StepMeta::default());
        m.start_step(StepId::Tool, Some("Searching GitHub"), StepMeta::tool(ToolKind::GithubSearch));
        m.start_step(StepId::Retrieve, Some("Searching again"), StepMeta::default());

        let ids: Vec<_> = m.state().steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StepId::Retrieve, StepId::Tool]);
        // Concurrent actives are allowed; the last start is tracked.
        assert_eq!(m.state().step(StepId::Tool).unwrap().status, StepStatus::Active);
        assert_eq!(m.state().active_step, Some(StepId::Retrieve));
        assert_eq!(m.state().step(StepId::Retrieve).unwrap().label, "Searching again");
        assert_eq!(m.state().step(StepId::Tool).unwrap().icon(), "github");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_timestamps() {
        let mut m = machine();
        m.start_step(StepId::Compose, None, StepMeta::default());
        tokio::time::advance(Duration::from_millis(10)).await;
        m.fail_step(StepId::Compose, Some("timed out"));
        tokio::time::advance(Duration::from_millis(10)).await;
        m.start_step(StepId::Compose, None, StepMeta::default());

        let step = m.state().step(StepId::Compose).unwrap();
        assert_eq!(step.status, StepStatus::Active);
        assert_eq!(step.started_at, Some(20));
        assert_eq!(step.ended_at, None);
        assert_eq!(step.note, None);
    }

    #[test]
    fn completing_a_non_tracked_step_keeps_the_headline() {
        let mut m = machine();
        m.start_step(StepId::Retrieve, None, StepMeta::default());
        m.start_step(StepId::Tool, None, StepMeta::tool(ToolKind::WebSearch));
        assert!(m.complete_step(StepId::Retrieve));
        assert_eq!(m.state().active_step, Some(StepId::Tool));
    }

    #[test]
    fn fail_step_attaches_a_sanitized_note() {
        let mut m = machine();
        m.start_step(StepId::Tool, None, StepMeta::default());
        assert!(m.fail_step(StepId::Tool, Some("search failed:\n  503")));
        let step = m.state().step(StepId::Tool).unwrap();
        assert_eq!(step.status, StepStatus::Error);
        assert_eq!(step.note.as_ref().unwrap().as_str(), "search failed: 503");
        assert_eq!(m.state().active_step, None);
    }

    #[test]
    fn ended_steps_do_not_transition_again() {
        let mut m = machine();
        assert!(!m.complete_step(StepId::Plan));
        m.start_step(StepId::Plan, None, StepMeta::default());
        assert!(m.complete_step(StepId::Plan));
        assert!(!m.complete_step(StepId::Plan));
        assert!(!m.fail_step(StepId::Plan, Some("late")));
        assert_eq!(m.state().step(StepId::Plan).unwrap().status, StepStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn hide_is_debounced() {
        let mut m = machine();
        m.set_visible(true);
        m.start_step(StepId::Understand, None, StepMeta::default());
        m.set_visible(false);

        tokio::time::advance(Duration::from_millis(599)).await;
        m.poll();
        assert!(m.state().visible);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(m.poll());
        assert_eq!(m.state(), &ThinkingSessionState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn show_cancels_a_pending_hide() {
        let mut m = machine();
        m.set_visible(true);
        m.set_visible(false);
        m.set_visible(true);

        tokio::time::advance(Duration::from_secs(2)).await;
        m.poll();
        assert!(m.state().visible);
        assert!(!m.hide_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_affordance_waits_for_the_delay() {
        let mut m = machine();
        m.set_visible(true);
        assert!(!m.state().can_cancel);
        assert_eq!(m.next_deadline(), Some(Instant::now() + Duration::from_millis(800)));

        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(m.poll());
        assert!(m.state().can_cancel);
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn hiding_when_hidden_is_a_no_op() {
        let mut m = machine();
        m.set_visible(false);
        assert!(!m.hide_pending());
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn content_only_grows_for_the_tracked_message() {
        let mut m = machine();
        m.start_streaming("m1");
        let mut previous = String::new();
        for delta in ["The", " quick", "", " fox"] {
            assert_eq!(m.append_chunk(&StreamChunk::delta("m1", delta)), AppendOutcome::Accepted);
            assert!(m.streaming().content.starts_with(&previous));
            previous = m.streaming().content.clone();
        }
        assert_eq!(m.streaming().content, "The quick fox");
        assert!(m.streaming().is_streaming);
    }

    #[test]
    fn stale_chunks_leave_state_untouched() {
        let mut m = machine();
        m.start_streaming("A");
        m.append_chunk(&StreamChunk::delta("A", "kept"));
        let before = m.streaming().clone();

        assert_eq!(m.append_chunk(&StreamChunk::delta("B", "nope")), AppendOutcome::Stale);
        assert_eq!(m.append_chunk(&StreamChunk::done("B")), AppendOutcome::Stale);
        assert_eq!(m.streaming(), &before);
    }

    #[test]
    fn chunks_before_any_session_are_stale() {
        let mut m = machine();
        assert_eq!(m.append_chunk(&StreamChunk::delta("m1", "x")), AppendOutcome::Stale);
        assert_eq!(m.streaming(), &StreamingState::default());
    }

    #[test]
    fn done_and_error_chunks_end_streaming() {
        let mut m = machine();
        m.start_streaming("m1");
        m.append_chunk(&StreamChunk::delta("m1", "Hi"));
        m.append_chunk(&StreamChunk::done("m1"));
        assert!(!m.streaming().is_streaming);
        assert_eq!(m.streaming().content, "Hi");

        m.start_streaming("m2");
        assert_eq!(m.streaming().content, "");
        m.append_chunk(&StreamChunk::failed("m2", "overloaded"));
        assert_eq!(m.streaming().error.as_deref(), Some("overloaded"));
        assert!(m.streaming().is_streaming);
        m.finish_streaming();
        m.finish_streaming();
        assert!(!m.streaming().is_streaming);
    }

    #[test]
    fn cancel_mid_stream_resets_and_notifies_once() {
        let (mut m, cancels) = counting_machine();
        m.set_visible(true);
        m.start_step(StepId::Compose, None, StepMeta::default());
        m.start_streaming("m1");
        m.append_chunk(&StreamChunk::delta("m1", "Hel"));

        assert!(m.cancel());
        assert_eq!(
            m.streaming(),
            &StreamingState {
                message_id: None,
                content: String::new(),
                is_streaming: false,
                error: None,
            }
        );
        assert_eq!(m.state(), &ThinkingSessionState::default());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (mut m, cancels) = counting_machine();
        assert!(!m.cancel());
        m.start_streaming("m1");
        assert!(m.cancel());
        assert!(!m.cancel());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chunk_error_survives_the_transport_failure() {
        let mut m = ThinkingMachine::new(ThinkingConfig::default(), TurnControls::default());
        m.start_streaming("m1");
        m.append_chunk(&StreamChunk::failed("m1", "model overloaded"));
        m.set_stream_error("Stream error: model overloaded");
        assert_eq!(m.streaming().error.as_deref(), Some("model overloaded"));
        assert!(!m.streaming().is_streaming);

        m.start_streaming("m2");
        m.set_stream_error("connection reset");
        assert_eq!(m.streaming().error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn retry_invokes_the_capability() {
        let retries = Arc::new(AtomicUsize::new(0));
        let counter = retries.clone();
        let controls = TurnControls::default().with_retry(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let m = ThinkingMachine::new(ThinkingConfig::default(), controls);
        m.retry();
        assert_eq!(retries.load(Ordering::SeqCst), 1);
    }
}
