//! Drives one assistant turn from stream events to render snapshots.
//!
//! The driver owns the [`ThinkingMachine`] and the [`DisplayReconciler`] and
//! mutates them from a single task, so event order is preserved without
//! locking. After every change it publishes a [`RenderSnapshot`] on a watch
//! channel for the presentation layer.

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::config::ThinkstreamConfig;
use crate::engine::StreamEvent;
use crate::thinking::{AppendOutcome, ThinkingMachine, TurnControls};
use crate::typewriter::{DisplayReconciler, MotionPreference};
use crate::types::{RenderSnapshot, StepId, StepMeta, StepStatus, ThoughtStep};

/// Step transitions issued by the application while a turn runs.
#[derive(Debug, Clone)]
pub enum StepCommand {
    Start {
        id: StepId,
        label: Option<String>,
        meta: StepMeta,
    },
    Complete(StepId),
    Fail {
        id: StepId,
        note: Option<String>,
    },
}

/// Out-of-band requests to a running turn.
#[derive(Debug, Clone)]
pub enum TurnCommand {
    Step(StepCommand),
    /// Show the rest of the message without animation.
    SkipAnimation,
    Cancel,
    Retry,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub content: String,
    pub error: Option<String>,
    pub cancelled: bool,
    pub steps: Vec<ThoughtStep>,
}

pub struct TurnDriver {
    message_id: String,
    machine: ThinkingMachine,
    reconciler: DisplayReconciler,
    snapshots: watch::Sender<RenderSnapshot>,
    completion_delay: std::time::Duration,
    stream_ended: bool,
    cancelled: bool,
    steps: Vec<ThoughtStep>,
}

impl TurnDriver {
    pub fn new(
        message_id: impl Into<String>,
        config: &ThinkstreamConfig,
        motion: MotionPreference,
        controls: TurnControls,
    ) -> (Self, watch::Receiver<RenderSnapshot>) {
        let (snapshots, rx) = watch::channel(RenderSnapshot::default());
        let driver = Self {
            message_id: message_id.into(),
            machine: ThinkingMachine::new(config.thinking.clone(), controls),
            reconciler: DisplayReconciler::new(&config.reveal, motion),
            snapshots,
            completion_delay: config.thinking.completion_delay(),
            stream_ended: false,
            cancelled: false,
            steps: Vec::new(),
        };
        (driver, rx)
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            thinking: self.machine.state().clone(),
            streaming: self.machine.streaming().clone(),
            display: self.reconciler.buffer(),
        }
    }

    /// Run until the stream has ended, the text has caught up, and the
    /// overlay has been hidden, or until the turn is cancelled.
    pub async fn run<S>(
        mut self,
        events: S,
        mut commands: mpsc::UnboundedReceiver<TurnCommand>,
    ) -> TurnOutcome
    where
        S: Stream<Item = StreamEvent> + Unpin,
    {
        let mut events = events.fuse();
        let mut commands_open = true;

        self.machine.start_streaming(self.message_id.clone());
        self.machine.set_visible(true);
        self.machine.start_step(StepId::Understand, None, StepMeta::default());
        self.publish();

        loop {
            let now = Instant::now();
            let frame_at = self.reconciler.next_frame_at();
            let deadline = self.machine.next_deadline();

            tokio::select! {
                event = events.next(), if !self.stream_ended => match event {
                    Some(event) => self.on_event(event),
                    None => self.on_stream_closed(),
                },
                command = commands.recv(), if commands_open => match command {
                    Some(TurnCommand::Cancel) => {
                        self.machine.cancel();
                        self.abandon();
                    }
                    Some(command) => self.on_command(command),
                    None => commands_open = false,
                },
                _ = sleep_until(frame_at.unwrap_or(now)), if frame_at.is_some() => {
                    self.reconciler.tick(Instant::now());
                }
                _ = sleep_until(deadline.unwrap_or(now)), if deadline.is_some() => {
                    self.machine.poll();
                }
                else => return self.outcome(false),
            }

            self.publish();

            if self.cancelled {
                debug!(message_id = %self.message_id, "turn cancelled");
                return self.outcome(true);
            }
            if self.is_settled() {
                debug!(message_id = %self.message_id, "turn settled");
                return self.outcome(false);
            }
        }
    }

    fn on_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Chunk(chunk) => {
                if self.machine.append_chunk(&chunk) == AppendOutcome::Stale {
                    return;
                }
                if !chunk.delta.is_empty() && self.step_status(StepId::Compose).is_none() {
                    self.machine.complete_step(StepId::Understand);
                    self.machine.start_step(StepId::Compose, None, StepMeta::default());
                }
                let content = self.machine.streaming().content.clone();
                if let Err(error) = self.reconciler.set_target(&content) {
                    warn!(error = %error, "display target rejected");
                }
            }
            StreamEvent::Completed(summary) => {
                debug!(
                    chunks = summary.chunks,
                    dropped_frames = summary.dropped_frames,
                    "stream completed"
                );
                self.stream_ended = true;
                self.machine.finish_streaming();
                self.finish_steps();
                self.machine.hide_after(self.completion_delay);
            }
            StreamEvent::Failed(error) => {
                self.stream_ended = true;
                self.machine.set_stream_error(error.to_string());
                let message = self.machine.streaming().error.clone().unwrap_or_default();
                let failed = self
                    .machine
                    .state()
                    .active_step
                    .unwrap_or(StepId::Compose);
                if !self.machine.fail_step(failed, Some(&message)) {
                    self.machine.fail_step(StepId::Understand, Some(&message));
                }
                self.machine.hide_after(self.completion_delay);
            }
            // Aborted from outside the driver: the cancel capability has
            // already run, so only the visible state is cleared.
            StreamEvent::Cancelled => self.abandon(),
        }
    }

    /// Drop everything on screen and end the turn as cancelled.
    fn abandon(&mut self) {
        self.stream_ended = true;
        self.cancelled = true;
        self.machine.reset_thinking();
        self.machine.reset_streaming();
        self.reconciler.reset();
    }

    fn on_stream_closed(&mut self) {
        if self.stream_ended {
            return;
        }
        self.stream_ended = true;
        self.machine.finish_streaming();
        self.machine.hide_after(self.completion_delay);
    }

    fn on_command(&mut self, command: TurnCommand) {
        match command {
            TurnCommand::Step(StepCommand::Start { id, label, meta }) => {
                self.machine.start_step(id, label.as_deref(), meta);
            }
            TurnCommand::Step(StepCommand::Complete(id)) => {
                self.machine.complete_step(id);
            }
            TurnCommand::Step(StepCommand::Fail { id, note }) => {
                self.machine.fail_step(id, note.as_deref());
            }
            TurnCommand::SkipAnimation => {
                self.reconciler.skip_to_end();
            }
            TurnCommand::Retry => self.machine.retry(),
            TurnCommand::Cancel => {}
        }
    }

    /// Close out whatever is still running and mark the turn finalized.
    fn finish_steps(&mut self) {
        let running: Vec<StepId> = self
            .machine
            .state()
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Active && s.id != StepId::Finalize)
            .map(|s| s.id)
            .collect();
        for id in running {
            self.machine.complete_step(id);
        }
        self.machine.start_step(StepId::Finalize, None, StepMeta::default());
        self.machine.complete_step(StepId::Finalize);
    }

    fn step_status(&self, id: StepId) -> Option<StepStatus> {
        self.machine.state().step(id).map(|s| s.status)
    }

    fn is_settled(&self) -> bool {
        self.stream_ended
            && !self.reconciler.is_typing()
            && !self.machine.state().visible
            && !self.machine.hide_pending()
    }

    fn publish(&mut self) {
        if !self.machine.state().steps.is_empty() {
            self.steps = self.machine.state().steps.clone();
        }
        let snapshot = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn outcome(&self, cancelled: bool) -> TurnOutcome {
        let streaming = self.machine.streaming();
        TurnOutcome {
            content: if cancelled {
                String::new()
            } else {
                streaming.content.clone()
            },
            error: streaming.error.clone(),
            cancelled,
            steps: self.steps.clone(),
        }
    }
}
