use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fg_core::constants::MAX_GENERATIONS;

use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QuotaRecord {
    used: u32,
}

/// Free-generation counter, the only client state kept on disk.
#[derive(Debug, Clone)]
pub struct GenerationQuota {
    path: PathBuf,
    used: u32,
    limit: u32,
}

impl GenerationQuota {
    /// A missing file means nothing has been used yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let record = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<QuotaRecord>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => QuotaRecord::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            used: record.used,
            limit: MAX_GENERATIONS,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Counts one generation and persists it. Returns the new total.
    pub fn record_generation(&mut self) -> Result<u32, AppError> {
        self.used += 1;
        self.save()?;
        Ok(self.used)
    }

    pub fn reset(&mut self) -> Result<(), AppError> {
        self.used = 0;
        self.save()
    }

    fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(&QuotaRecord { used: self.used })?;
        std::fs::write(&self.path, bytes)?;
        debug!(used = self.used, path = %self.path.display(), "quota saved");
        Ok(())
    }
}
