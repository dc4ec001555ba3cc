use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Preview,
    Refine,
}

impl TaskMode {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Refine => "refine",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    /// Any status string the vendor adds later. Never polled further.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "⏳",
            Self::InProgress => "⚡",
            Self::Succeeded => "✅",
            Self::Failed => "❌",
            Self::Unknown => "❔",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Downloadable model formats the vendor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Glb,
    Fbx,
    Obj,
    Usdz,
    Mtl,
}

impl ModelFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Fbx => "fbx",
            Self::Obj => "obj",
            Self::Usdz => "usdz",
            Self::Mtl => "mtl",
        }
    }

    pub fn all() -> [ModelFormat; 5] {
        [Self::Glb, Self::Fbx, Self::Obj, Self::Usdz, Self::Mtl]
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown model format '{s}' (expected glb, fbx, obj, usdz or mtl)"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usdz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtl: Option<String>,
}

impl ModelUrls {
    pub fn get(&self, format: ModelFormat) -> Option<&str> {
        let url = match format {
            ModelFormat::Glb => &self.glb,
            ModelFormat::Fbx => &self.fbx,
            ModelFormat::Obj => &self.obj,
            ModelFormat::Usdz => &self.usdz,
            ModelFormat::Mtl => &self.mtl,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }

    /// Formats that actually carry a URL, in `ModelFormat::all()` order.
    pub fn available(&self) -> Vec<ModelFormat> {
        ModelFormat::all()
            .into_iter()
            .filter(|f| self.get(*f).is_some())
            .collect()
    }
}

/// One PBR texture map set of a refined model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextureSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metallic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
}

impl TextureSet {
    pub fn get(&self, map: TextureMap) -> Option<&str> {
        let url = match map {
            TextureMap::BaseColor => &self.base_color,
            TextureMap::Metallic => &self.metallic,
            TextureMap::Roughness => &self.roughness,
            TextureMap::Normal => &self.normal,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn available(&self) -> Vec<(TextureMap, &str)> {
        TextureMap::all()
            .into_iter()
            .filter_map(|m| self.get(m).map(|url| (m, url)))
            .collect()
    }
}

/// One map within a [`TextureSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureMap {
    BaseColor,
    Metallic,
    Roughness,
    Normal,
}

impl TextureMap {
    pub fn id(&self) -> &'static str {
        match self {
            Self::BaseColor => "base_color",
            Self::Metallic => "metallic",
            Self::Roughness => "roughness",
            Self::Normal => "normal",
        }
    }

    pub fn all() -> [TextureMap; 4] {
        [Self::BaseColor, Self::Metallic, Self::Roughness, Self::Normal]
    }
}

impl fmt::Display for TextureMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TextureMap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown texture map '{s}' (expected base_color, metallic, roughness or normal)"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskError {
    #[serde(default)]
    pub message: String,
}

/// The latest known state of one generation task, as reported by the gateway.
///
/// Snapshots are replaced wholesale, never patched. Fields the vendor sends
/// that are not modelled here survive a deserialize/serialize cycle in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TaskMode>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_style: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u32,
    /// Epoch milliseconds. Only used for ordering.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_urls: Option<ModelUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_urls: Option<Vec<TextureSet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_error: Option<TaskError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskSnapshot {
    /// A snapshot made up locally when the vendor could not be asked.
    pub fn synthesized(id: impl Into<String>, status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: None,
            prompt: String::new(),
            art_style: None,
            status,
            progress: 0,
            created_at: 0,
            started_at: None,
            finished_at: None,
            model_urls: None,
            thumbnail_url: None,
            texture_urls: None,
            task_error: Some(TaskError { message: message.into() }),
            extra: Map::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error text, if the vendor (or the gateway) attached a non-empty one.
    pub fn error_message(&self) -> Option<&str> {
        self.task_error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }

    pub fn model_url(&self, format: ModelFormat) -> Option<&str> {
        self.model_urls.as_ref().and_then(|urls| urls.get(format))
    }

    /// URL of one map in the `set`-th texture set.
    pub fn texture_url(&self, set: usize, map: TextureMap) -> Option<&str> {
        self.texture_urls.as_ref()?.get(set)?.get(map)
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn progress_percent(&self) -> u32 {
        self.progress.min(100)
    }
}
