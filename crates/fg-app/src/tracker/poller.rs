use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fg_core::{TaskSnapshot, TaskStatus};

use crate::events::{EventBus, TaskEvent};
use crate::generator::TaskGateway;
use crate::tracker::backoff::BackoffPolicy;
use crate::tracker::store::SharedStore;

/// Why polling for a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The task reached a terminal status.
    Finished(TaskStatus),
    /// Too many consecutive failed polls.
    Exhausted { attempts: u32 },
    /// The wall-clock ceiling passed first.
    TimedOut,
    Cancelled,
}

/// Handle to a running per-task poller.
#[derive(Debug)]
pub struct PollHandle {
    task_id: String,
    token: CancellationToken,
    join: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Stops the poller. No request is started after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> PollOutcome {
        self.join.await.unwrap_or(PollOutcome::Cancelled)
    }
}

pub struct TaskPoller {
    task_id: String,
    gateway: Arc<dyn TaskGateway>,
    store: SharedStore,
    events: EventBus,
    policy: BackoffPolicy,
}

impl TaskPoller {
    pub fn new(
        task_id: impl Into<String>,
        gateway: Arc<dyn TaskGateway>,
        store: SharedStore,
        events: EventBus,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            gateway,
            store,
            events,
            policy,
        }
    }

    /// Starts polling on the runtime. `token` cancels it.
    pub fn spawn(self, token: CancellationToken) -> PollHandle {
        let task_id = self.task_id.clone();
        let join = tokio::spawn(self.run(token.clone()));
        PollHandle { task_id, token, join }
    }

    pub async fn run(self, token: CancellationToken) -> PollOutcome {
        let deadline = Instant::now() + self.policy.ceiling;

        let outcome = tokio::select! {
            _ = token.cancelled() => PollOutcome::Cancelled,
            res = timeout_at(deadline, self.poll_until_settled()) => res.unwrap_or(PollOutcome::TimedOut),
        };

        match outcome {
            PollOutcome::Finished(status) => debug!(task_id = %self.task_id, %status, "polling finished"),
            PollOutcome::Cancelled => debug!(task_id = %self.task_id, "polling cancelled"),
            other => warn!(task_id = %self.task_id, outcome = ?other, "polling abandoned"),
        }
        self.events.publish(TaskEvent::PollingStopped {
            task_id: self.task_id.clone(),
            outcome,
        });
        outcome
    }

    async fn poll_until_settled(&self) -> PollOutcome {
        // Populate the view right away instead of waiting a full delay.
        match self.gateway.fetch_task(&self.task_id).await {
            Ok(snapshot) => {
                if let Some(status) = self.apply(snapshot).await {
                    return self.finish(status).await;
                }
            }
            Err(e) => warn!(task_id = %self.task_id, error = %e, "initial task fetch failed"),
        }

        let mut attempts = 0u32;
        let mut delay = self.policy.base_delay;
        loop {
            sleep(delay).await;

            match self.gateway.fetch_task(&self.task_id).await {
                Ok(snapshot) => {
                    attempts = 0;
                    if let Some(status) = self.apply(snapshot).await {
                        return self.finish(status).await;
                    }
                }
                Err(e) => {
                    attempts += 1;
                    debug!(task_id = %self.task_id, attempts, error = %e, "task poll failed");
                    if self.policy.exhausted(attempts) {
                        return PollOutcome::Exhausted { attempts };
                    }
                }
            }

            delay = self.policy.delay(attempts);
        }
    }

    /// Merges a snapshot. Returns the stored status if it is terminal.
    async fn apply(&self, mut snapshot: TaskSnapshot) -> Option<TaskStatus> {
        if snapshot.id.is_empty() {
            snapshot.id = self.task_id.clone();
        } else if snapshot.id != self.task_id {
            warn!(task_id = %self.task_id, got = %snapshot.id, "gateway answered for another task, ignoring");
            return None;
        }

        let status = self.store.write().await.upsert(snapshot.clone());
        self.events.publish(TaskEvent::Updated(snapshot));
        status.is_terminal().then_some(status)
    }

    async fn finish(&self, status: TaskStatus) -> PollOutcome {
        info!(task_id = %self.task_id, %status, "task settled");
        self.events.publish(TaskEvent::Finished {
            task_id: self.task_id.clone(),
            status,
        });

        // Completion can change other records; pick those up too.
        match self.gateway.list_tasks().await {
            Ok(tasks) => {
                let mut store = self.store.write().await;
                store.replace_all(tasks);
                self.events.publish(TaskEvent::Refreshed {
                    total: store.all().len(),
                    in_progress: store.in_progress().len(),
                });
            }
            Err(e) => warn!(error = %e, "task list refresh failed"),
        }

        PollOutcome::Finished(status)
    }
}
