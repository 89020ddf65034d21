//! Append-only transition history.
//!
//! Every accepted transition is described by a [`TransitionRecord`] appended to a
//! JSON-lines log. Records are never mutated or deleted; the log is the permanent
//! account of who moved each visit, when, and which fields they touched.
//!
//! Audit is deliberately **outside the transactional boundary**: by the time a record
//! is appended the transition has already been committed by the store, so an audit
//! write failure must never fail the parent operation. Failed appends are queued in
//! memory, a warning is logged, and [`AuditTrail::flush_pending`] retries them — the
//! service binary drives the retry on an interval. The trail is therefore
//! eventually-consistent best-effort logging, not a second source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{WorkflowError, WorkflowResult};
use crate::stage::{Role, Stage};
use crate::visit::FieldName;
use vwe_uuid::VisitId;

/// One accepted stage transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub visit_id: VisitId,
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub actor_role: Role,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    /// Fields whose stored value changed in this transition.
    pub fields_changed: BTreeSet<FieldName>,
    /// Fields the caller supplied but did not own; dropped by the merger.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub fields_rejected: BTreeSet<FieldName>,
}

/// Best-effort append-only writer over the transition log.
pub struct AuditTrail {
    log_path: PathBuf,
    pending: Mutex<VecDeque<TransitionRecord>>,
}

impl AuditTrail {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a transition. Never fails: on IO trouble the record is queued for a
    /// later [`flush_pending`](Self::flush_pending) and a warning is logged.
    pub fn append(&self, record: TransitionRecord) {
        {
            let mut pending = self.pending.lock().expect("audit queue lock poisoned");
            pending.push_back(record);
        }
        self.flush_pending();
    }

    /// Retry queued records in order. Returns how many were written; stops at the
    /// first failure, leaving the remainder queued.
    pub fn flush_pending(&self) -> usize {
        let mut pending = self.pending.lock().expect("audit queue lock poisoned");
        let mut written = 0;

        while let Some(record) = pending.front() {
            match self.write_line(record) {
                Ok(()) => {
                    pending.pop_front();
                    written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        queued = pending.len(),
                        "audit append failed, will retry: {e}"
                    );
                    break;
                }
            }
        }

        written
    }

    /// Number of records still waiting to reach the log.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("audit queue lock poisoned").len()
    }

    /// All flushed records for `visit_id`, in append order.
    ///
    /// Only records that reached the log are visible; queued records appear after the
    /// next successful flush.
    pub fn history(&self, visit_id: VisitId) -> WorkflowResult<Vec<TransitionRecord>> {
        let contents = match std::fs::read_to_string(&self.log_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkflowError::FileRead(e)),
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<TransitionRecord>(line) {
                Ok(record) if record.visit_id == visit_id => records.push(record),
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("skipping unparseable audit line in {}", self.log_path.display());
                }
            }
        }
        Ok(records)
    }

    fn write_line(&self, record: &TransitionRecord) -> WorkflowResult<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(WorkflowError::StoreDirCreation)?;
        }
        let line = serde_json::to_string(record).map_err(WorkflowError::Serialization)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(WorkflowError::FileWrite)?;
        writeln!(file, "{line}").map_err(WorkflowError::FileWrite)?;
        Ok(())
    }
}
