use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use fg_core::{TaskMode, TaskSnapshot, TaskStatus};

pub type SharedStore = Arc<RwLock<TaskStore>>;

/// In-memory view of every known task plus the in-progress subset.
///
/// Records are keyed by id and only ever replaced whole. `in_progress` is
/// rebuilt from `all` after every change, so it is always a status-filtered
/// subset of it. A record that reached a terminal status is never replaced
/// by an older, still-active one.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    all: Vec<TaskSnapshot>,
    in_progress: Vec<TaskSnapshot>,
    texturing: HashSet<String>,
}

impl TaskStore {
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Newest first.
    pub fn all(&self) -> &[TaskSnapshot] {
        &self.all
    }

    pub fn in_progress(&self) -> &[TaskSnapshot] {
        &self.in_progress
    }

    pub fn has_in_progress(&self) -> bool {
        !self.in_progress.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TaskSnapshot> {
        self.all.iter().find(|t| t.id == id)
    }

    /// Finished previews.
    pub fn models(&self) -> impl Iterator<Item = &TaskSnapshot> {
        self.finished(TaskMode::Preview)
    }

    /// Finished refines.
    pub fn textured(&self) -> impl Iterator<Item = &TaskSnapshot> {
        self.finished(TaskMode::Refine)
    }

    fn finished(&self, mode: TaskMode) -> impl Iterator<Item = &TaskSnapshot> {
        self.all
            .iter()
            .filter(move |t| t.mode == Some(mode) && t.status == TaskStatus::Succeeded)
    }

    /// Merges one snapshot. Returns the status the stored record ends up with.
    pub fn upsert(&mut self, snapshot: TaskSnapshot) -> TaskStatus {
        let status = match self.all.iter_mut().find(|t| t.id == snapshot.id) {
            Some(existing) if regresses(existing, &snapshot) => {
                debug!(task_id = %snapshot.id, kept = %existing.status, ignored = %snapshot.status,
                    "ignoring snapshot that would reopen a finished task");
                existing.status
            }
            Some(existing) => {
                *existing = snapshot;
                existing.status
            }
            None => {
                let status = snapshot.status;
                self.all.insert(0, snapshot);
                status
            }
        };
        self.recompute_in_progress();
        status
    }

    /// Replaces everything with a full listing.
    pub fn replace_all(&mut self, mut tasks: Vec<TaskSnapshot>) {
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut seen = HashSet::new();
        tasks.retain(|t| seen.insert(t.id.clone()));

        for task in tasks.iter_mut() {
            if let Some(previous) = self.get(&task.id).filter(|prev| regresses(prev, task)) {
                *task = previous.clone();
            }
        }

        self.all = tasks;
        self.recompute_in_progress();
    }

    pub fn mark_texturing(&mut self, preview_task_id: &str) {
        self.texturing.insert(preview_task_id.to_string());
    }

    pub fn clear_texturing(&mut self, preview_task_id: &str) {
        self.texturing.remove(preview_task_id);
    }

    pub fn is_texturing(&self, preview_task_id: &str) -> bool {
        self.texturing.contains(preview_task_id)
    }

    fn recompute_in_progress(&mut self) {
        self.in_progress = self.all.iter().filter(|t| t.is_active()).cloned().collect();
    }
}

fn regresses(current: &TaskSnapshot, incoming: &TaskSnapshot) -> bool {
    current.is_terminal() && incoming.is_active()
}
