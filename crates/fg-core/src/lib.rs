pub mod constants;
pub mod error;
mod options;
mod request;
mod task;

pub use error::ValidationError;
pub use options::{ArtStyle, GenerationOptions, PolycountLevel, SymmetryMode, Topology};
pub use request::{CreateTaskRequest, CreateTaskResponse};
pub use task::{ModelFormat, ModelUrls, TaskError, TaskMode, TaskSnapshot, TaskStatus, TextureMap, TextureSet};
