//! Out-of-band stream control
//!
//! A stream's consumer holds `&mut` access while it waits for the next
//! event, so pause/resume and teardown also go through a shared watch
//! channel that any task can write to.

use std::sync::Arc;
use tokio::sync::watch;

/// Requested teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    #[default]
    None,
    /// Tear down once the exchange reaches its terminal outcome
    Soon,
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control {
    pub paused: bool,
    pub teardown: Teardown,
}

/// Cloneable control surface of one stream
#[derive(Debug, Clone)]
pub struct StreamHandle {
    tx: Arc<watch::Sender<Control>>,
}

impl StreamHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<Control>) {
        let (tx, rx) = watch::channel(Control::default());
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn control(&self) -> Control {
        *self.tx.borrow()
    }

    pub fn pause(&self) {
        self.tx.send_if_modified(|c| !std::mem::replace(&mut c.paused, true));
    }

    pub fn resume(&self) {
        self.tx.send_if_modified(|c| std::mem::replace(&mut c.paused, false));
    }

    /// Idempotent; the owning stream stops delivering events
    pub fn destroy(&self) {
        self.tx.send_if_modified(|c| {
            if c.teardown == Teardown::Now {
                return false;
            }
            c.teardown = Teardown::Now;
            true
        });
    }

    /// Idempotent; never downgrades an immediate teardown
    pub fn destroy_soon(&self) {
        self.tx.send_if_modified(|c| {
            if c.teardown != Teardown::None {
                return false;
            }
            c.teardown = Teardown::Soon;
            true
        });
    }

    pub fn is_destroyed(&self) -> bool {
        self.control().teardown == Teardown::Now
    }
}

/// Stream-side state, one value instead of independent flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Configured, nothing sent
    Idle,
    /// Sent; the exchange is in flight
    Open,
    Ended,
    Errored,
    Destroyed,
}

impl StreamState {
    pub fn is_open(&self) -> bool {
        matches!(self, StreamState::Idle | StreamState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destroy_is_idempotent() {
        let (handle, mut rx) = StreamHandle::new();
        handle.destroy();
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        handle.destroy();
        handle.destroy_soon();
        assert!(!rx.has_changed().unwrap());
        assert!(handle.is_destroyed());
    }

    #[test]
    fn test_destroy_soon_then_destroy() {
        let (handle, _rx) = StreamHandle::new();
        handle.destroy_soon();
        assert_eq!(handle.control().teardown, Teardown::Soon);
        handle.destroy();
        assert_eq!(handle.control().teardown, Teardown::Now);
    }

    #[test]
    fn test_pause_resume() {
        let (handle, rx) = StreamHandle::new();
        let other = handle.clone();
        handle.pause();
        assert!(rx.borrow().paused);
        other.resume();
        assert!(!rx.borrow().paused);
    }
}
