//! Stream ingestion engine: one cancellable event-stream request at a time.

pub mod decode;
pub mod events;

pub use decode::decode_body;
pub use events::{StreamEvent, StreamEventSink};

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::config::ThinkstreamConfig;
use crate::error::{Result, ThinkstreamError};
use crate::transport::{shared_client, FrameMode};

/// Identifier of one stream started by an engine.
pub type StreamId = Uuid;

struct ActiveStream {
    id: StreamId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one in-flight stream and its cancellation token.
///
/// Events for a stream are delivered to its sink in arrival order, ending
/// with exactly one terminal event. The engine never retries.
pub struct StreamEngine {
    client: reqwest::Client,
    mode: FrameMode,
    api_key: Option<String>,
    active: Option<ActiveStream>,
}

impl StreamEngine {
    pub fn new(mode: FrameMode) -> Self {
        Self {
            client: shared_client().clone(),
            mode,
            api_key: None,
            active: None,
        }
    }

    pub fn from_config(config: &ThinkstreamConfig) -> Self {
        let mut engine = Self::new(config.frame_mode);
        engine.api_key = config.api_key.clone();
        engine
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Whether a stream is still running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    pub fn active_stream_id(&self) -> Option<StreamId> {
        self.active
            .as_ref()
            .filter(|active| !active.task.is_finished())
            .map(|active| active.id)
    }

    /// Token of the current stream, for callers that cancel from elsewhere.
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|active| active.cancel.clone())
    }

    /// POST `payload` to `endpoint` and deliver events to `sink`.
    ///
    /// Fails with [`ThinkstreamError::InvalidState`] while another stream is
    /// active. Must be called from within a tokio runtime.
    pub fn start_stream(
        &mut self,
        endpoint: impl Into<String>,
        payload: serde_json::Value,
        sink: StreamEventSink,
    ) -> Result<StreamId> {
        if self.is_active() {
            return Err(ThinkstreamError::InvalidState(
                "a stream is already active on this engine".into(),
            ));
        }

        let endpoint = endpoint.into();
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let events = decode::open_stream(
            self.client.clone(),
            endpoint.clone(),
            payload,
            self.api_key.clone(),
            self.mode,
            cancel.clone(),
        );

        debug!(stream_id = %id, endpoint = %endpoint, mode = %self.mode, "starting stream");
        let span = tracing::debug_span!("stream", stream_id = %id);
        let task = tokio::spawn(
            async move {
                let mut events = std::pin::pin!(events);
                while let Some(event) = events.next().await {
                    sink(event);
                }
            }
            .instrument(span),
        );

        self.active = Some(ActiveStream { id, cancel, task });
        Ok(id)
    }

    /// Like [`start_stream`](Self::start_stream), but events arrive on a stream.
    pub fn start_channel(
        &mut self,
        endpoint: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<UnboundedReceiverStream<StreamEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: StreamEventSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        self.start_stream(endpoint, payload, sink)?;
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Replace any running stream with a new one.
    ///
    /// The previous stream is cancelled and its task awaited, so its
    /// transport has observed the abort before the new request is sent.
    pub async fn restart_stream(
        &mut self,
        endpoint: impl Into<String>,
        payload: serde_json::Value,
        sink: StreamEventSink,
    ) -> Result<StreamId> {
        self.stop_stream().await;
        self.start_stream(endpoint, payload, sink)
    }

    /// Cancel the current stream and wait for it to wind down.
    ///
    /// Returns `false` when there was nothing to stop. Safe to call repeatedly.
    pub async fn stop_stream(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let was_running = !active.task.is_finished();
        active.cancel.cancel();
        if let Err(error) = active.task.await {
            debug!(stream_id = %active.id, error = %error, "stream task ended abnormally");
        }
        debug!(stream_id = %active.id, was_running, "stream stopped");
        was_running
    }

    /// Signal cancellation without waiting.
    pub fn cancel(&self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}
