//! Health probing and the periodic re-check timers.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RegistryState;
use crate::adapter::Adapter;

/// Run one adapter's probe on its own task.
///
/// `Err` and panics both count as unhealthy and never reach the caller.
pub(crate) async fn probe(name: &str, adapter: Arc<dyn Adapter>) -> bool {
    match tokio::spawn(async move { adapter.health_check().await }).await {
        Ok(Ok(healthy)) => {
            debug!(adapter = name, healthy, "health check finished");
            healthy
        }
        Ok(Err(e)) => {
            warn!(adapter = name, error = %format!("{e:#}"), "health check failed");
            false
        }
        Err(e) => {
            warn!(adapter = name, error = %e, "health check panicked");
            false
        }
    }
}

/// A running periodic re-check for one adapter.
#[derive(Debug)]
pub(crate) struct HealthTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthTimer {
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Start re-checking `name` every `interval`.
///
/// The task holds only a weak reference to the registry state and exits on
/// its own once the registry is gone or the adapter is unregistered.
/// Returns `None` outside a Tokio runtime.
pub(crate) fn spawn_timer(
    state: &Arc<Mutex<RegistryState>>,
    name: &str,
    interval: Duration,
) -> Option<HealthTimer> {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(adapter = name, error = %e, "no async runtime, periodic health check not started");
            return None;
        }
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let weak: Weak<Mutex<RegistryState>> = Arc::downgrade(state);
    let name = name.to_string();

    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the registration itself does
        // not count as a check.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let adapter = match weak.upgrade() {
                Some(state) => {
                    let guard = super::lock(&state);
                    guard.adapter(&name)
                }
                None => None,
            };
            let Some(adapter) = adapter else {
                break;
            };

            let healthy = tokio::select! {
                _ = token.cancelled() => break,
                healthy = probe(&name, adapter) => healthy,
            };

            match weak.upgrade() {
                Some(state) => {
                    super::lock(&state).record(&name, healthy);
                }
                None => break,
            }
        }
        debug!(adapter = %name, "periodic health check stopped");
    });

    Some(HealthTimer { cancel, handle })
}
