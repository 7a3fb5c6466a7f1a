//! Cancel and retry capabilities supplied by the caller.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// A capability the machine invokes at a defined transition.
pub type ControlFn = Arc<dyn Fn() + Send + Sync>;

/// Caller-supplied strategies for cancelling and retrying a turn.
#[derive(Clone, Default)]
pub struct TurnControls {
    cancel: Option<ControlFn>,
    retry: Option<ControlFn>,
}

impl fmt::Debug for TurnControls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnControls")
            .field("cancel", &self.cancel.as_ref().map(|_| ".."))
            .field("retry", &self.retry.as_ref().map(|_| ".."))
            .finish()
    }
}

impl TurnControls {
    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    pub fn with_retry<F>(mut self, retry: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.retry = Some(Arc::new(retry));
        self
    }

    /// Cancel by tripping a stream's cancellation token.
    pub fn cancel_token(self, token: CancellationToken) -> Self {
        self.with_cancel(move || token.cancel())
    }

    pub(crate) fn cancel(&self) {
        if let Some(cancel) = &self.cancel {
            cancel();
        }
    }

    pub(crate) fn retry(&self) {
        if let Some(retry) = &self.retry {
            retry();
        }
    }
}
