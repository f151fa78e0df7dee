//! Expiration Reaper
//!
//! Background thread that sleeps until the earliest cache deadline, evicts
//! expired items and goes back to sleep. Writers that move the earliest
//! deadline forward wake it early through a [`Notify`](tokio::sync::Notify).

use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::cache::{Clock, Shared};
use crate::error::{CacheError, Result};

const REAPER_THREAD_NAME: &str = "ttl-cache-reaper";

// == Reaper Handle ==
/// Owner side of the shutdown handshake.
pub(crate) struct ReaperHandle {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals the reaper and blocks until its thread has exited.
    ///
    /// When called from the reaper thread itself (a callback closing the
    /// cache) the signal is sent but the thread is not joined.
    pub(crate) fn stop(self) {
        // The receiver only disappears once the loop has already exited
        let _ = self.shutdown.send(());

        if thread::current().id() == self.thread.thread().id() {
            warn!("Cache closed from the reaper thread; reaper will exit after this batch");
            return;
        }
        if self.thread.join().is_err() {
            error!("Reaper thread panicked");
        }
    }
}

/// Starts the reaper thread for `shared`.
///
/// The thread drives a single-threaded tokio runtime so the wait step can
/// select over the shutdown signal, the deadline timer and wake-ups.
pub(crate) fn spawn_reaper<K, V, C>(shared: Arc<Shared<K, V, C>>) -> Result<ReaperHandle>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(CacheError::Spawn)?;
    let (shutdown, shutdown_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name(REAPER_THREAD_NAME.to_string())
        .spawn(move || runtime.block_on(run(shared, shutdown_rx)))
        .map_err(CacheError::Spawn)?;

    Ok(ReaperHandle { shutdown, thread })
}

async fn run<K, V, C>(shared: Arc<Shared<K, V, C>>, mut shutdown: oneshot::Receiver<()>)
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    debug!("Reaper started");

    loop {
        let sleep_time = shared.next_sleep();

        tokio::select! {
            _ = &mut shutdown => {
                info!("Reaper stopping");
                break;
            }
            _ = tokio::time::sleep(sleep_time) => {
                let evicted = shared.evict_expired();
                if evicted > 0 {
                    debug!("Reaper evicted {} expired items", evicted);
                }
            }
            _ = shared.wake.notified() => {
                debug!("Reaper woken early, rescheduling");
            }
        }
    }
}
