//! The versioned visit store.
//!
//! Each visit is one JSON document under a sharded directory derived from its
//! identifier: `<visits_dir>/<s1>/<s2>/<visit_id>/visit.json`. Sharding keeps
//! directory fan-out bounded as encounters accumulate; visits are never deleted.
//!
//! ## Concurrency
//!
//! The store is the engine's only serialization point. Validation and merging happen
//! optimistically outside any lock; the actual commit is a single conditional write:
//! under the store's write lock the stored version is re-read and compared against the
//! caller's `expected_version`. A mismatch is a [`WorkflowError::VersionConflict`] and
//! the caller must refetch and re-run validation from scratch — the store never
//! silently retries or merges stale data. Documents are written to a temporary file
//! and renamed into place so a crashed write cannot leave a torn record behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::visit::Visit;
use vwe_uuid::VisitId;

const VISIT_FILE: &str = "visit.json";

/// File-backed, versioned store of visit records.
pub struct VisitStore {
    visits_dir: PathBuf,
    /// Serialises conditional writes; reads go straight to the filesystem.
    write_lock: Mutex<()>,
}

impl VisitStore {
    /// Open (and create if needed) the store rooted at the configured data dir.
    pub fn open(cfg: &EngineConfig) -> WorkflowResult<Self> {
        let visits_dir = cfg.visits_dir();
        fs::create_dir_all(&visits_dir).map_err(WorkflowError::StoreDirCreation)?;
        Ok(Self {
            visits_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn visit_file(&self, visit_id: VisitId) -> PathBuf {
        visit_id.sharded_dir(&self.visits_dir).join(VISIT_FILE)
    }

    /// Persist a newly created visit. Fails if the identifier is already in use.
    pub fn insert(&self, visit: &Visit) -> WorkflowResult<()> {
        let _guard = self.write_lock.lock().expect("store write lock poisoned");

        let file = self.visit_file(visit.visit_id);
        if file.exists() {
            return Err(WorkflowError::DuplicateVisit {
                visit_id: visit.visit_id,
            });
        }
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(WorkflowError::StoreDirCreation)?;
        }
        self.write_record(&file, visit)
    }

    /// Read the current record for `visit_id`.
    pub fn load(&self, visit_id: VisitId) -> WorkflowResult<Visit> {
        let file = self.visit_file(visit_id);
        let contents = match fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::UnknownVisit { visit_id })
            }
            Err(e) => return Err(WorkflowError::FileRead(e)),
        };
        serde_json::from_str(&contents).map_err(WorkflowError::Deserialization)
    }

    /// The single conditional write.
    ///
    /// `new_record` carries the post-transition stage and fields; its version is
    /// assigned here as `expected_version + 1`. The write succeeds only if the stored
    /// version still equals `expected_version` at the moment the lock is held.
    pub fn commit(
        &self,
        expected_version: u64,
        mut new_record: Visit,
    ) -> WorkflowResult<Visit> {
        let _guard = self.write_lock.lock().expect("store write lock poisoned");

        let stored = self.load(new_record.visit_id)?;
        if stored.version != expected_version {
            tracing::debug!(
                visit_id = %new_record.visit_id,
                expected = expected_version,
                actual = stored.version,
                "conditional write lost the race"
            );
            return Err(WorkflowError::VersionConflict {
                visit_id: new_record.visit_id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        new_record.version = expected_version + 1;
        let file = self.visit_file(new_record.visit_id);
        self.write_record(&file, &new_record)?;
        Ok(new_record)
    }

    /// Iterate every stored visit.
    ///
    /// Traverses the two shard levels and reads each `visit.json`. Records that fail
    /// to parse are logged and skipped rather than failing the whole scan.
    pub fn scan(&self) -> Vec<Visit> {
        let mut visits = Vec::new();

        let s1_iter = match fs::read_dir(&self.visits_dir) {
            Ok(it) => it,
            Err(_) => return visits,
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let id_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_ent in id_iter.flatten() {
                    let visit_path = id_ent.path().join(VISIT_FILE);
                    if !visit_path.is_file() {
                        continue;
                    }
                    match fs::read_to_string(&visit_path) {
                        Ok(contents) => match serde_json::from_str::<Visit>(&contents) {
                            Ok(visit) => visits.push(visit),
                            Err(_) => {
                                tracing::warn!(
                                    "failed to parse visit record: {}",
                                    visit_path.display()
                                );
                            }
                        },
                        Err(e) => {
                            tracing::warn!(
                                "failed to read visit record {}: {e}",
                                visit_path.display()
                            );
                        }
                    }
                }
            }
        }

        visits
    }

    fn write_record(&self, file: &Path, visit: &Visit) -> WorkflowResult<()> {
        let json = serde_json::to_string_pretty(visit).map_err(WorkflowError::Serialization)?;
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(WorkflowError::FileWrite)?;
        fs::rename(&tmp, file).map_err(WorkflowError::FileWrite)?;
        Ok(())
    }
}
