//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Handle to a running sweep task.
///
/// Stopping consumes the handle, so a single `SweepTask` can only be stopped once.
#[derive(Debug)]
pub struct SweepTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Signals the task to stop and waits for it to finish.
    ///
    /// Returns the instant the task was observed stopped.
    pub async fn stop(self) -> Instant {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("TTL sweep task ended abnormally: {}", e);
        }
        Instant::now()
    }

    /// Signals the task to stop without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The first sweep runs one `sweep_interval` after spawning. Each tick takes
/// the cache's write lock only for the duration of the sweep itself. The task
/// waits on the timer and its stop signal concurrently; whichever fires first
/// wins.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::new(1000, Duration::from_secs(300))));
/// let sweep = spawn_sweep_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweep.stop().await;
/// ```
pub fn spawn_sweep_task(cache: Arc<RwLock<CacheStore>>, sweep_interval: Duration) -> SweepTask {
    let token = CancellationToken::new();
    let stop = token.clone();

    let handle = tokio::spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {:?}",
            sweep_interval
        );

        let mut ticker = interval_at(Instant::now() + sweep_interval, sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = {
                        let mut cache_guard = cache.write().await;
                        cache_guard.cleanup_expired(Instant::now())
                    };

                    if removed > 0 {
                        info!("TTL sweep: removed {} expired entries", removed);
                    } else {
                        debug!("TTL sweep: no expired entries found");
                    }
                }
            }
        }

        info!("TTL sweep task stopped");
    });

    SweepTask { token, handle }
}
