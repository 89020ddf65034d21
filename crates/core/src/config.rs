//! Engine runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services.
//! The intent is to avoid reading process-wide environment variables during request
//! handling, which can lead to inconsistent behaviour in multi-threaded runtimes and
//! test harnesses.

use crate::error::{WorkflowError, WorkflowResult};
use std::path::{Path, PathBuf};

pub(crate) const VISITS_DIR_NAME: &str = "visits";
pub(crate) const AUDIT_DIR_NAME: &str = "audit";
pub(crate) const AUDIT_LOG_FILE: &str = "transitions.jsonl";

/// Engine configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    visit_data_dir: PathBuf,
}

impl EngineConfig {
    /// Create a new `EngineConfig` rooted at `visit_data_dir`.
    pub fn new(visit_data_dir: PathBuf) -> WorkflowResult<Self> {
        if visit_data_dir.as_os_str().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "visit_data_dir cannot be empty".into(),
            ));
        }
        Ok(Self { visit_data_dir })
    }

    pub fn visit_data_dir(&self) -> &Path {
        &self.visit_data_dir
    }

    /// Root of the sharded visit store.
    pub fn visits_dir(&self) -> PathBuf {
        self.visit_data_dir.join(VISITS_DIR_NAME)
    }

    /// Location of the append-only transition log.
    pub fn audit_log_path(&self) -> PathBuf {
        self.visit_data_dir.join(AUDIT_DIR_NAME).join(AUDIT_LOG_FILE)
    }
}
