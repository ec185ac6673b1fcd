//! Lifecycle plumbing shared by the polling services.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handle for controlling a background service.
pub struct ServiceHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    pub(crate) fn from_parts(
        name: &'static str,
        shutdown_tx: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown_tx,
            task,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the service to stop and wait for the in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            debug!(service = self.name, error = %e, "Service task ended abnormally");
        }
    }
}

/// Run `tick` every `interval` until the handle is shut down.
///
/// A slow tick delays the next one rather than queueing catch-up ticks.
pub fn spawn_ticker<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> ServiceHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(service = name, interval_ms = interval.as_millis() as u64, "Service started");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => tick().await,
            }
        }

        info!(service = name, "Service stopped");
    });

    ServiceHandle {
        name,
        shutdown_tx,
        task,
    }
}
