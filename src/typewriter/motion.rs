//! Reduced-motion preference.

use tokio::sync::watch;

/// Runtime-observable "reduce motion" flag.
///
/// The reconciler reads the current value on every step, so flipping the
/// preference mid-animation takes effect on the next tick.
#[derive(Debug, Clone)]
pub struct MotionPreference {
    rx: watch::Receiver<bool>,
}

impl MotionPreference {
    /// A preference that never changes.
    pub fn fixed(reduced: bool) -> Self {
        let (_tx, rx) = watch::channel(reduced);
        Self { rx }
    }

    /// A preference controlled through the returned sender.
    pub fn channel(reduced: bool) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(reduced);
        (tx, Self { rx })
    }

    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn reduced(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for MotionPreference {
    fn default() -> Self {
        Self::fixed(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_preference_outlives_its_sender() {
        assert!(MotionPreference::fixed(true).reduced());
        assert!(!MotionPreference::default().reduced());
    }

    #[test]
    fn channel_updates_are_visible() {
        let (tx, motion) = MotionPreference::channel(false);
        assert!(!motion.reduced());
        tx.send_replace(true);
        assert!(motion.reduced());
    }
}
