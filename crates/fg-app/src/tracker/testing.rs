use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use fg_core::{CreateTaskRequest, TaskSnapshot};

use crate::error::AppError;
use crate::generator::TaskGateway;

/// Replays scripted gateway answers. The last entry of a script repeats forever.
#[derive(Default)]
pub struct ScriptedGateway {
    fetches: Mutex<VecDeque<Result<TaskSnapshot, String>>>,
    lists: Mutex<VecDeque<Vec<TaskSnapshot>>>,
    fetch_times: Mutex<Vec<Instant>>,
    list_calls: Mutex<u32>,
}

impl ScriptedGateway {
    pub fn new(fetches: Vec<Result<TaskSnapshot, String>>, lists: Vec<Vec<TaskSnapshot>>) -> Self {
        Self {
            fetches: Mutex::new(fetches.into()),
            lists: Mutex::new(lists.into()),
            ..Default::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_times.lock().unwrap().len()
    }

    pub fn list_count(&self) -> u32 {
        *self.list_calls.lock().unwrap()
    }

    /// Milliseconds between consecutive fetches.
    pub fn gaps(&self) -> Vec<u128> {
        let times = self.fetch_times.lock().unwrap();
        times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect()
    }
}

fn next<T: Clone>(script: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

#[async_trait]
impl TaskGateway for ScriptedGateway {
    async fn create_task(&self, _req: &CreateTaskRequest) -> Result<String, AppError> {
        Err(AppError::BackendError("create is not scripted".into()))
    }

    async fn fetch_task(&self, _id: &str) -> Result<TaskSnapshot, AppError> {
        self.fetch_times.lock().unwrap().push(Instant::now());
        next(&self.fetches)
            .unwrap_or_else(|| Err("no fetch scripted".into()))
            .map_err(AppError::BackendError)
    }

    async fn list_tasks(&self) -> Result<Vec<TaskSnapshot>, AppError> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(next(&self.lists).unwrap_or_default())
    }
}

pub fn snapshot(id: &str, status: &str, progress: u32) -> TaskSnapshot {
    serde_json::from_value(json!({
        "id": id,
        "mode": "preview",
        "prompt": "a red cube",
        "status": status,
        "progress": progress,
        "created_at": 1_700_000_000_000i64
    }))
    .unwrap()
}
