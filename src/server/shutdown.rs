//! Drain-and-stop coordination between the accept loop, connection tasks
//! and callers of [`ServerHandle::stop`](super::ServerHandle::stop).
//!
//! The run flag is only read or written while the global mutex is held. The
//! accept loop admits a connection (and bumps the active counter) under that
//! same mutex, so once `request_stop` has returned no further connection can
//! be admitted and every admitted one is visible in the counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard, watch};

#[derive(Debug)]
pub(crate) struct Shutdown {
    lock: Mutex<()>,
    running: AtomicBool,
    stop: watch::Sender<bool>,
    active: watch::Sender<usize>,
    stopped: watch::Sender<bool>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            running: AtomicBool::new(true),
            stop: watch::Sender::new(false),
            active: watch::Sender::new(0),
            stopped: watch::Sender::new(false),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Registers a freshly accepted connection, or returns `None` once stop
    /// has been issued.
    pub(crate) async fn admit(self: &Arc<Self>) -> Option<ConnectionGuard> {
        let _lock = self.lock.lock().await;
        if !self.running.load(Ordering::Acquire) {
            return None;
        }
        self.active.send_modify(|n| *n += 1);
        Some(ConnectionGuard {
            shutdown: Arc::clone(self),
        })
    }

    /// Clears the run flag and wakes the accept loop so it drops the listener.
    pub(crate) async fn request_stop(&self) {
        let _lock = self.lock.lock().await;
        self.running.store(false, Ordering::Release);
        self.stop.send_replace(true);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    pub(crate) fn active_connections(&self) -> usize {
        *self.active.borrow()
    }

    pub(crate) async fn wait_drained(&self) {
        let mut rx = self.active.subscribe();
        // the sender lives as long as `self`, so this only returns at zero
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.send_replace(true);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    pub(crate) async fn wait_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Held by a connection task for its whole lifetime. Dropping it, on any
/// exit path, releases the connection from the active count.
#[derive(Debug)]
pub(crate) struct ConnectionGuard {
    shutdown: Arc<Shutdown>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.shutdown.active.send_modify(|n| *n -= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_after_stop_is_refused() {
        let shutdown = Arc::new(Shutdown::new());
        let guard = shutdown.admit().await;
        assert!(guard.is_some());
        assert_eq!(shutdown.active_connections(), 1);

        shutdown.request_stop().await;
        assert!(shutdown.admit().await.is_none());
        assert!(!shutdown.is_running());

        drop(guard);
        assert_eq!(shutdown.active_connections(), 0);
        shutdown.wait_drained().await;
    }
}
