use thiserror::Error;

/// A create request rejected before anything leaves the process.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Mode is required")]
    MissingMode,
    #[error("Prompt is required for preview mode")]
    MissingPrompt,
    #[error("Preview task ID is required for refine mode")]
    MissingPreviewTaskId,
}
