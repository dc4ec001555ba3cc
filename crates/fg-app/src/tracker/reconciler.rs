use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::events::{EventBus, TaskEvent};
use crate::generator::TaskGateway;
use crate::tracker::store::SharedStore;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(3_000);

/// Keeps the store in step with the full task list while anything is in flight.
pub struct Reconciler {
    gateway: Arc<dyn TaskGateway>,
    store: SharedStore,
    events: EventBus,
    period: Duration,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn TaskGateway>, store: SharedStore, events: EventBus, period: Duration) -> Self {
        Self {
            gateway,
            store,
            events,
            period,
        }
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }

    /// Lists once, then again every period while the store has active tasks.
    pub async fn run(&self, token: CancellationToken) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "initial task list failed");
        }

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.store.read().await.has_in_progress() {
                        continue;
                    }
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "task list refresh failed");
                    }
                }
            }
        }
        debug!("reconciler stopped");
    }

    /// Replaces the store with a fresh listing. A failed listing leaves it untouched.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let tasks = self.gateway.list_tasks().await?;

        let mut store = self.store.write().await;
        store.replace_all(tasks);
        self.events.publish(TaskEvent::Refreshed {
            total: store.all().len(),
            in_progress: store.in_progress().len(),
        });
        Ok(())
    }
}
