//! Framebuffer resize notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-bit flag raised by the window layer and consumed by the scheduler.
///
/// Clones share the same flag, so the event handler can hold one while the
/// scheduler holds another.
#[derive(Debug, Clone, Default)]
pub struct ResizeSignal {
    raised: Arc<AtomicBool>,
}

impl ResizeSignal {
    /// Creates a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the framebuffer as resized.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Returns whether the signal was raised, lowering it.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Returns whether the signal is raised without lowering it.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_lowers_the_signal() {
        let signal = ResizeSignal::new();
        assert!(!signal.take());

        signal.raise();
        assert!(signal.is_raised());
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_clones_share_state() {
        let window_side = ResizeSignal::new();
        let scheduler_side = window_side.clone();

        window_side.raise();
        window_side.raise();

        assert!(scheduler_side.take());
        assert!(!window_side.is_raised());
    }
}
