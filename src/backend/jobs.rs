//! Background job plumbing
//!
//! Backend calls block, so the GUI runs them on worker threads and polls
//! for completion once per frame. A job delivers exactly one value over a
//! bounded channel; dropping the handle abandons the result.

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use tracing::warn;

/// Handle to a value being produced on a worker thread
pub struct JobHandle<T> {
    rx: Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Non-blocking check for the result. Returns it at most once.
    pub fn try_take(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // The worker panicked before sending; surface nothing and
                // let the caller treat the job as lost.
                warn!("Background job disappeared without a result");
                None
            }
        }
    }
}

/// Run `f` on a named worker thread and hand back its result
pub fn spawn<T, F>(name: &str, f: F) -> JobHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let builder = std::thread::Builder::new().name(format!("job-{}", name));
    // Spawn failure means the process is out of threads; nothing sensible
    // to do but propagate the panic.
    builder
        .spawn(move || {
            let _ = tx.send(f());
        })
        .unwrap_or_else(|e| panic!("failed to spawn worker thread: {}", e));

    JobHandle { rx }
}
