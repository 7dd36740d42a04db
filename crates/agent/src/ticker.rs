//! Per-cycle periodic tasks with cancel-all.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Shortest period a ticker runs at.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Handle to the tickers of one run.
///
/// Each ticker awaits its body before waiting for the next tick, so two ticks
/// of the same ticker never overlap. `shutdown` stops every ticker at its next
/// wait; a body already running is left to finish.
#[derive(Debug)]
pub struct TickerSet {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for TickerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TickerSet {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Run `body` every `period`, first after one full period. Periods below
    /// [`MIN_PERIOD`] are raised to it.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, period: Duration, mut body: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period < MIN_PERIOD {
            warn!(ticker = name, period_ms = period.as_millis() as u64, "ticker period raised to the minimum");
        }
        let period = period.max(MIN_PERIOD);
        let mut stop = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = ticks.tick() => body().await,
                }
            }
            debug!(ticker = name, "ticker stopped");
        });
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shutdown(self) {
        let _ = self.shutdown.send(true);
    }

    /// Shut down and wait until every ticker has exited.
    pub async fn shutdown_and_wait(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
