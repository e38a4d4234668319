//! Two-phase side channel between the setup run and the finalize run.
//!
//! The setup run writes a [`RunRecord`] listing every remote-cache miss as a
//! [`PendingPersist`]; the finalize run, a separate process started at the end
//! of the job, reads it back, persists each record and removes the file.
//!
//! ```json
//! {
//!   "success": true,
//!   "recorded_at": "2026-01-01T12:00:00Z",
//!   "pending": [
//!     { "artifact": "wordpress", "directory": "/tmp/wp", "key": "1::wordpress:6.4.3" }
//!   ]
//! }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::WptlError;
use crate::utils::fs::{read_json_file, remove_path, write_json_file};
use crate::wordpress::Artifact;

/// One artifact whose remote-cache lookup missed and should be saved later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPersist {
    /// Which tree to save
    pub artifact: Artifact,
    /// Workspace root the artifact subdirectory lives in
    pub directory: PathBuf,
    /// Remote cache key to save under
    pub key: String,
}

/// Everything the finalize run needs to know about a setup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// `true` only once the setup run emitted its outputs
    #[serde(default)]
    pub success: bool,
    /// When the record was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Remote-cache misses, in artifact order
    #[serde(default)]
    pub pending: Vec<PendingPersist>,
}

impl RunRecord {
    /// A record for a run that has provisioned but not yet succeeded.
    pub fn in_progress(pending: Vec<PendingPersist>) -> Self {
        Self {
            success: false,
            recorded_at: Some(Utc::now()),
            pending,
        }
    }
}

/// JSON file holding a [`RunRecord`].
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Uses the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the record, returning `None` when no setup run left one.
    pub fn load(&self) -> Result<Option<RunRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        read_json_file(&self.path).map(Some).map_err(|e| {
            WptlError::StateError {
                path: self.path.display().to_string(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Writes `record`, replacing any previous one.
    pub fn save(&self, record: &RunRecord) -> Result<()> {
        debug!("Writing run record to {}", self.path.display());
        write_json_file(&self.path, record).map_err(|e| {
            WptlError::StateError {
                path: self.path.display().to_string(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Flips the stored record to successful, keeping its pending list.
    pub fn mark_success(&self) -> Result<()> {
        let mut record = self.load()?.unwrap_or_default();
        record.success = true;
        record.recorded_at = Some(Utc::now());
        self.save(&record)
    }

    /// Deletes the file. A missing file is not an error.
    pub async fn remove(&self) -> Result<()> {
        remove_path(&self.path).await
    }
}
