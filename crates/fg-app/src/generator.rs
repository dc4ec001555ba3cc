use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use fg_core::{CreateTaskRequest, GenerationOptions, TaskMode, TaskSnapshot};

use crate::error::AppError;
use crate::events::{EventBus, TaskEvent};
use crate::quota::GenerationQuota;

pub mod gateway_client;

pub use gateway_client::GatewayClient;

/// The three gateway operations the client side depends on.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Returns the id of the new task.
    async fn create_task(&self, req: &CreateTaskRequest) -> Result<String, AppError>;

    async fn fetch_task(&self, id: &str) -> Result<TaskSnapshot, AppError>;

    async fn list_tasks(&self) -> Result<Vec<TaskSnapshot>, AppError>;
}

/// Submits generation jobs and announces them on the event bus.
pub struct Generator {
    gateway: Arc<dyn TaskGateway>,
    events: EventBus,
    quota: GenerationQuota,
}

impl Generator {
    pub fn new(gateway: Arc<dyn TaskGateway>, events: EventBus, quota: GenerationQuota) -> Self {
        Self {
            gateway,
            events,
            quota,
        }
    }

    pub fn quota(&self) -> &GenerationQuota {
        &self.quota
    }

    /// Creates a preview task. Counts against the free quota once accepted.
    pub async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String, AppError> {
        if self.quota.is_exhausted() {
            return Err(AppError::QuotaExhausted {
                limit: self.quota.limit(),
            });
        }
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Please enter a prompt to generate a 3D model.".to_string(),
            ));
        }

        let req = CreateTaskRequest::preview(prompt, options);
        let task_id = self.gateway.create_task(&req).await?;

        // The vendor already accepted the job; a failed save must not lose it.
        match self.quota.record_generation() {
            Ok(used) => info!(%task_id, used, "preview task created"),
            Err(e) => warn!(%task_id, error = %e, "preview task created but the quota file could not be saved"),
        }
        self.events.publish(TaskEvent::Created {
            task_id: task_id.clone(),
            mode: TaskMode::Preview,
            preview_task_id: None,
        });

        Ok(task_id)
    }

    /// Creates a refine (texturing) task for a finished preview.
    pub async fn texture(&self, preview_task_id: &str, enable_pbr: bool) -> Result<String, AppError> {
        let req = CreateTaskRequest::refine(preview_task_id, enable_pbr);
        let task_id = self.gateway.create_task(&req).await?;

        info!(%task_id, %preview_task_id, "refine task created");
        self.events.publish(TaskEvent::Created {
            task_id: task_id.clone(),
            mode: TaskMode::Refine,
            preview_task_id: Some(preview_task_id.to_string()),
        });

        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        requests: Mutex<Vec<CreateTaskRequest>>,
    }

    #[async_trait]
    impl TaskGateway for RecordingGateway {
        async fn create_task(&self, req: &CreateTaskRequest) -> Result<String, AppError> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(req.clone());
            Ok(format!("task_{}", requests.len()))
        }

        async fn fetch_task(&self, _id: &str) -> Result<TaskSnapshot, AppError> {
            Err(AppError::BackendError("unused".into()))
        }

        async fn list_tasks(&self) -> Result<Vec<TaskSnapshot>, AppError> {
            Ok(Vec::new())
        }
    }

    fn generator(dir: &tempfile::TempDir) -> (Generator, Arc<RecordingGateway>, EventBus) {
        let gateway = Arc::new(RecordingGateway::default());
        let events = EventBus::default();
        let quota = GenerationQuota::load(dir.path().join("quota.json")).unwrap();
        (Generator::new(gateway.clone(), events.clone(), quota), gateway, events)
    }

    #[tokio::test]
    async fn test_generate_publishes_created() {
        let dir = tempfile::tempdir().unwrap();
        let (mut generator, gateway, events) = generator(&dir);
        let mut rx = events.subscribe();

        let id = generator.generate("a red cube", &GenerationOptions::default()).await.unwrap();
        assert_eq!(id, "task_1");
        assert_eq!(generator.quota().used(), 1);

        match rx.recv().await.unwrap() {
            TaskEvent::Created { task_id, mode, preview_task_id } => {
                assert_eq!(task_id, "task_1");
                assert_eq!(mode, TaskMode::Preview);
                assert_eq!(preview_task_id, None);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let sent = gateway.requests.lock().unwrap();
        assert_eq!(sent[0].prompt.as_deref(), Some("a red cube"));
        assert_eq!(sent[0].target_polycount, Some(30_000));
    }

    #[tokio::test]
    async fn test_quota_refuses_fourth_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (mut generator, gateway, _events) = generator(&dir);
        let opts = GenerationOptions::default();

        for _ in 0..3 {
            generator.generate("a lamp", &opts).await.unwrap();
        }
        let err = generator.generate("a lamp", &opts).await.unwrap_err();
        assert!(matches!(err, AppError::QuotaExhausted { limit: 3 }));
        assert_eq!(gateway.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_quota_save_failure_keeps_created_task() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(RecordingGateway::default());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let quota = GenerationQuota::load(dir.path().join("state/quota.json")).unwrap();
        // A plain file where the quota directory should go makes every save fail.
        std::fs::write(dir.path().join("state"), b"").unwrap();
        let mut generator = Generator::new(gateway.clone(), events, quota);

        let id = generator.generate("a red cube", &GenerationOptions::default()).await.unwrap();

        assert_eq!(id, "task_1");
        assert_eq!(gateway.requests.lock().unwrap().len(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            TaskEvent::Created { ref task_id, mode: TaskMode::Preview, .. } if task_id == "task_1"
        ));
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected_locally() {
        let dir = tempfile::tempdir().unwrap();
        let (mut generator, gateway, _events) = generator(&dir);

        let err = generator.generate("  ", &GenerationOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(gateway.requests.lock().unwrap().is_empty());
        assert_eq!(generator.quota().used(), 0);
    }

    #[tokio::test]
    async fn test_texture_links_preview() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, gateway, events) = generator(&dir);
        let mut rx = events.subscribe();

        generator.texture("preview_1", true).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            TaskEvent::Created { mode: TaskMode::Refine, preview_task_id: Some(ref p), .. } if p == "preview_1"
        ));
        let sent = gateway.requests.lock().unwrap();
        assert_eq!(sent[0].enable_pbr, Some(true));
        assert_eq!(generator.quota().used(), 0);
    }
}
