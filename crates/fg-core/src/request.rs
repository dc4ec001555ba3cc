use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::options::{ArtStyle, GenerationOptions, SymmetryMode, Topology};
use crate::task::TaskMode;

/// Body of a create call, shared by the gateway and its clients.
///
/// Everything is optional on the wire so that a missing `mode` can be
/// reported as a validation error instead of a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TaskMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_style: Option<ArtStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_polycount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetry_mode: Option<SymmetryMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_pbr: Option<bool>,
    /// Vendor parameters this crate does not model, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateTaskRequest {
    pub fn preview(prompt: impl Into<String>, options: &GenerationOptions) -> Self {
        Self {
            mode: Some(TaskMode::Preview),
            prompt: Some(prompt.into()),
            art_style: Some(options.art_style),
            seed: options.seed,
            topology: Some(options.topology),
            target_polycount: Some(options.polycount.target_polycount()),
            symmetry_mode: Some(options.symmetry),
            ..Default::default()
        }
    }

    pub fn refine(preview_task_id: impl Into<String>, enable_pbr: bool) -> Self {
        Self {
            mode: Some(TaskMode::Refine),
            preview_task_id: Some(preview_task_id.into()),
            enable_pbr: Some(enable_pbr),
            ..Default::default()
        }
    }

    /// Checks the fields each mode needs and returns the mode.
    pub fn validate(&self) -> Result<TaskMode, ValidationError> {
        let mode = self.mode.ok_or(ValidationError::MissingMode)?;
        match mode {
            TaskMode::Preview => {
                let blank = self.prompt.as_deref().is_none_or(|p| p.trim().is_empty());
                if blank {
                    return Err(ValidationError::MissingPrompt);
                }
            }
            TaskMode::Refine => {
                let missing = self.preview_task_id.as_deref().is_none_or(str::is_empty);
                if missing {
                    return Err(ValidationError::MissingPreviewTaskId);
                }
            }
        }
        Ok(mode)
    }
}

/// What the vendor answers to a create call: the new task id under `result`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskResponse {
    pub result: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
