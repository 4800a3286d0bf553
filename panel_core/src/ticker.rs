//! Background periodic tick source.
//!
//! Spawns a thread that pushes a caller-supplied event into the runtime's
//! event channel once per period. Each period is waited out independently
//! (no catch-up, no drift correction).
//!
//! Safety: Each `Ticker` spawns exactly one thread that is shut down and
//! joined when the `Ticker` is dropped, preventing thread leaks. Shutdown is
//! prompt: the thread waits on a stop channel rather than sleeping.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct Ticker {
    fired: Arc<AtomicU64>,
    /// Dropping the sender wakes the thread immediately.
    stop_tx: Option<xch::Sender<()>>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Ticker {
    /// Send `event` on `tx` every `period` until dropped or the receiver goes away.
    pub fn spawn<E: Clone + Send + 'static>(tx: xch::Sender<E>, event: E, period: Duration) -> Self {
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let fired = Arc::new(AtomicU64::new(0));
        let fired_clone = fired.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(period) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    // Explicit stop or the owning Ticker was dropped
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Ticker thread received shutdown signal");
                        break;
                    }
                }
                if tx.send(event.clone()).is_err() {
                    tracing::debug!("Ticker consumer disconnected, exiting thread");
                    break;
                }
                fired_clone.fetch_add(1, Ordering::Relaxed);
            }
            tracing::trace!("Ticker thread exiting cleanly");
        });

        Self {
            fired,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Number of ticks delivered so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // Disconnect the stop channel; the thread is either waiting on it or
        // about to check it after a send.
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("Ticker thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "Ticker thread panicked during shutdown");
                }
            }
        }
    }
}
