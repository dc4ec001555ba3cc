use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{EventBus, TaskEvent};
use crate::generator::TaskGateway;

pub mod backoff;
pub mod poller;
pub mod reconciler;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use backoff::BackoffPolicy;
pub use poller::{PollHandle, PollOutcome, TaskPoller};
pub use reconciler::{DEFAULT_REFRESH_INTERVAL, Reconciler};
pub use store::{SharedStore, TaskStore};

/// Owns the task store and one poller per task the user created.
pub struct Tracker {
    gateway: Arc<dyn TaskGateway>,
    store: SharedStore,
    events: EventBus,
    policy: BackoffPolicy,
    pollers: Mutex<HashMap<String, PollHandle>>,
    /// Refine task id -> preview task id it textures.
    refine_parents: Mutex<HashMap<String, String>>,
    token: CancellationToken,
}

impl Tracker {
    pub fn new(gateway: Arc<dyn TaskGateway>, events: EventBus, policy: BackoffPolicy) -> Self {
        Self {
            gateway,
            store: TaskStore::shared(),
            events,
            policy,
            pollers: Mutex::new(HashMap::new()),
            refine_parents: Mutex::new(HashMap::new()),
            token: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub async fn active_pollers(&self) -> usize {
        self.pollers.lock().await.len()
    }

    /// Starts polling `task_id` unless it is already being polled.
    pub async fn track(&self, task_id: &str, preview_task_id: Option<&str>) {
        let mut pollers = self.pollers.lock().await;
        if pollers.get(task_id).is_some_and(|h| !h.is_finished()) {
            debug!(%task_id, "task already tracked");
            return;
        }

        if let Some(preview) = preview_task_id {
            self.store.write().await.mark_texturing(preview);
            self.refine_parents
                .lock()
                .await
                .insert(task_id.to_string(), preview.to_string());
        }

        let poller = TaskPoller::new(
            task_id,
            self.gateway.clone(),
            self.store.clone(),
            self.events.clone(),
            self.policy,
        );
        pollers.insert(task_id.to_string(), poller.spawn(self.token.child_token()));
        info!(%task_id, "tracking task");
    }

    async fn untrack(&self, task_id: &str) {
        self.pollers.lock().await.remove(task_id);
        if let Some(preview) = self.refine_parents.lock().await.remove(task_id) {
            self.store.write().await.clear_texturing(&preview);
        }
    }

    /// Reacts to bus events until shutdown: tracks created tasks and
    /// forgets them once polling stops.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        // Subscribe before spawning so no event published after this call is missed.
        let mut rx = self.events.subscribe();
        let tracker = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = tracker.token.cancelled() => break,
                    event = rx.recv() => event,
                };

                match event {
                    Ok(TaskEvent::Created { task_id, preview_task_id, .. }) => {
                        tracker.track(&task_id, preview_task_id.as_deref()).await;
                    }
                    Ok(TaskEvent::PollingStopped { task_id, .. }) => tracker.untrack(&task_id).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "tracker listener lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn spawn_reconciler(&self, period: Duration) -> JoinHandle<()> {
        Reconciler::new(self.gateway.clone(), self.store.clone(), self.events.clone(), period)
            .spawn(self.token.child_token())
    }

    /// Cancels every poller and background loop and waits for the pollers.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handles: Vec<PollHandle> = self.pollers.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let task_id = handle.task_id().to_string();
            let outcome = handle.join().await;
            debug!(%task_id, ?outcome, "poller joined");
        }
    }
}
