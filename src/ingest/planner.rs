//! Per-source interval scheduling.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::{CourierError, Result};

/// Runs actions on independent per-source timelines.
pub struct Planner {
    shutdown: watch::Receiver<bool>,
}

impl Planner {
    /// Create a planner that stops scheduling once `shutdown` turns true.
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self { shutdown }
    }

    /// Run `action` now and then every `every` until shutdown.
    ///
    /// Each source gets its own task. A slow action delays the next tick of
    /// that source only; missed ticks are not replayed. An action that is
    /// running when shutdown is signalled runs to completion.
    pub fn schedule<F, Fut>(
        &self,
        source: &str,
        every: Duration,
        mut action: F,
    ) -> Result<JoinHandle<()>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if every.is_zero() {
            return Err(CourierError::Validation(format!(
                "update interval for source '{source}' must be greater than zero"
            )));
        }

        let source = source.to_string();
        let mut shutdown = self.shutdown.clone();
        info!("Scheduling {} every {} seconds", source, every.as_secs());

        Ok(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                action().await;
            }

            debug!("Scheduler for {} stopped", source);
        }))
    }
}
