//! Per-channel close serialization.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::chat::ChannelId;

/// Tracks channels with a close in flight so that concurrent close requests
/// for the same ticket cannot interleave. Acquisition is non-blocking: the
/// loser of a race is told to back off rather than queued.
#[derive(Default)]
pub struct CloseGuard {
    closing: Mutex<HashSet<ChannelId>>,
}

impl CloseGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Try to claim the close slot for a channel. Returns `None` if a close
    /// is already in flight. The slot is released when the permit drops.
    pub fn try_acquire(self: &Arc<Self>, channel_id: ChannelId) -> Option<ClosePermit> {
        let mut closing = self.closing.lock().unwrap_or_else(|e| e.into_inner());
        if !closing.insert(channel_id) {
            return None;
        }

        Some(ClosePermit {
            guard: Arc::clone(self),
            channel_id,
        })
    }

    fn release(&self, channel_id: ChannelId) {
        let mut closing = self.closing.lock().unwrap_or_else(|e| e.into_inner());
        closing.remove(&channel_id);
    }
}

/// RAII handle for an in-flight close.
pub struct ClosePermit {
    guard: Arc<CloseGuard>,
    channel_id: ChannelId,
}

impl Drop for ClosePermit {
    fn drop(&mut self) {
        self.guard.release(self.channel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let guard = CloseGuard::new();
        let permit = guard.try_acquire(10);
        assert!(permit.is_some());
        assert!(guard.try_acquire(10).is_none());

        // a different channel is unaffected
        assert!(guard.try_acquire(11).is_some());
    }

    #[test]
    fn test_slot_released_on_drop() {
        let guard = CloseGuard::new();
        let permit = guard.try_acquire(10).unwrap();
        drop(permit);
        assert!(guard.try_acquire(10).is_some());
    }

    #[test]
    fn test_release_even_if_close_panics() {
        let guard = CloseGuard::new();
        let inner = Arc::clone(&guard);
        let result = std::panic::catch_unwind(move || {
            let _permit = inner.try_acquire(10).unwrap();
            panic!("close blew up");
        });
        assert!(result.is_err());
        assert!(guard.try_acquire(10).is_some());
    }
}
