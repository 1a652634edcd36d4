//! Event-loop driver.
//!
//! [`NdiscDriver`] runs one engine on a tokio task: it asks the engine for
//! the earliest pending deadline, sleeps until then, and delivers
//! [`Ndisc::handle_timeouts`] under the engine lock, so timer callbacks
//! are serialised with every other caller of the engine. Anyone mutating
//! the engine from outside (RA ingress, `set_iid`, DAD reports) should
//! [`NdiscDriver::kick`] the loop afterwards so the sleep is recomputed
//! against the new deadlines.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::clock::MonotonicClock;
use crate::engine::Ndisc;

/// Owns the engine lock and the wake-up plumbing.
pub struct NdiscDriver {
    engine: Arc<Mutex<Ndisc>>,
    clock: Arc<dyn MonotonicClock>,
    shutdown: Notify,
    kick: Notify,
}

impl NdiscDriver {
    /// Wraps `engine` for the event loop. The engine's own clock is used
    /// to turn deadlines into sleep durations.
    #[must_use]
    pub fn new(engine: Ndisc) -> Self {
        let clock = engine.clock();
        NdiscDriver {
            engine: Arc::new(Mutex::new(engine)),
            clock,
            shutdown: Notify::new(),
            kick: Notify::new(),
        }
    }

    /// The shared engine handle. Lock it to call any engine entry point;
    /// never hold the guard across an await.
    #[must_use]
    pub fn engine(&self) -> Arc<Mutex<Ndisc>> {
        Arc::clone(&self.engine)
    }

    /// Re-evaluate the sleep after an external mutation armed or moved a
    /// deadline.
    pub fn kick(&self) {
        self.kick.notify_one();
    }

    /// Stop the loop. Pending deadlines are dropped with the task.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Spawns the timer loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("ndisc driver started");
            loop {
                let until = {
                    let engine = self.engine.lock();
                    engine
                        .next_wakeup()
                        .map(|deadline| (deadline - i64::from(self.clock.now())).max(0) as u64)
                };

                tokio::select! {
                    _ = self.shutdown.notified() => {
                        debug!("ndisc driver shutting down");
                        break;
                    }
                    _ = self.kick.notified() => {
                        continue;
                    }
                    _ = idle_or_sleep(until) => {
                        let now = self.clock.now();
                        self.engine.lock().handle_timeouts(now);
                    }
                }
            }
        })
    }
}

/// Sleeps `secs`, or forever when no deadline is armed (the loop then
/// only wakes on kick or shutdown).
async fn idle_or_sleep(secs: Option<u64>) {
    match secs {
        Some(secs) => sleep(Duration::from_secs(secs)).await,
        None => std::future::pending::<()>().await,
    }
}
