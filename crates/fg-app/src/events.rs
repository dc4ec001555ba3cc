use tokio::sync::broadcast;
use tracing::trace;

use fg_core::{TaskMode, TaskSnapshot, TaskStatus};

use crate::tracker::PollOutcome;

#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The gateway accepted a create call.
    Created {
        task_id: String,
        mode: TaskMode,
        preview_task_id: Option<String>,
    },
    /// A fresh snapshot was merged into the store.
    Updated(TaskSnapshot),
    Finished {
        task_id: String,
        status: TaskStatus,
    },
    PollingStopped {
        task_id: String,
        outcome: PollOutcome,
    },
    /// A full list refresh replaced the store contents.
    Refreshed {
        total: usize,
        in_progress: usize,
    },
}

/// Fan-out channel for task events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: TaskEvent) {
        // No subscribers is fine.
        if self.tx.send(event).is_err() {
            trace!("task event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
