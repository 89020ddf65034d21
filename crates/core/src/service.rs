//! The single mutating entry point of the workflow engine.
//!
//! `VisitService` owns the store, the audit trail and the notifier, and runs every
//! transition request through the same pipeline: load, merge, validate, conditional
//! commit, audit, notify. No collaborator can bypass the workflow rules because no
//! other write path exists.
//!
//! Requests are handled statelessly: nothing is held between calls, no operation
//! blocks waiting on another actor, and a visit that depends on upstream work (a
//! doctor waiting on lab results) sees that purely through `current_stage`.

use chrono::Utc;
use std::sync::Arc;

use crate::actor::Actor;
use crate::audit::{AuditTrail, TransitionRecord};
use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::notify::{LogNotifier, StageNotifier};
use crate::stage::{Role, Stage};
use crate::store::VisitStore;
use crate::update::{self, UpdatePayload};
use crate::validate;
use crate::visit::{Visit, VisitFields};
use crate::worklist;
use vwe_types::NonEmptyText;
use vwe_uuid::VisitId;

/// Orchestrates visit creation, transitions and queries.
pub struct VisitService {
    store: VisitStore,
    audit: AuditTrail,
    notifier: Arc<dyn StageNotifier>,
}

impl VisitService {
    /// Open the engine over the configured data directory with the default
    /// log-based notifier.
    pub fn open(cfg: Arc<EngineConfig>) -> WorkflowResult<Self> {
        Self::with_notifier(cfg, Arc::new(LogNotifier))
    }

    /// Open the engine with a caller-supplied downstream notifier.
    pub fn with_notifier(
        cfg: Arc<EngineConfig>,
        notifier: Arc<dyn StageNotifier>,
    ) -> WorkflowResult<Self> {
        let store = VisitStore::open(&cfg)?;
        let audit = AuditTrail::new(cfg.audit_log_path());
        Ok(Self {
            store,
            audit,
            notifier,
        })
    }

    /// Create a visit for `patient_id` at check-in.
    ///
    /// Only reception may create visits. The new record enters at `Registration` and
    /// immediately auto-advances across the guard-free edge to `Triage`, so the
    /// stored visit is at `Triage` with version 1. The auto-advance is audited like
    /// any other transition.
    pub fn create_visit(&self, patient_id: NonEmptyText, actor: &Actor) -> WorkflowResult<Visit> {
        let now = Utc::now();
        let mut visit = Visit {
            visit_id: VisitId::new(),
            patient_id,
            current_stage: Stage::Registration,
            version: 1,
            fields: VisitFields::default(),
            created_at: now,
            updated_at: now,
        };

        let next_stage = validate::validate(&visit, &visit.fields, None, actor.role)?;
        visit.current_stage = next_stage;

        self.store.insert(&visit)?;
        tracing::info!(
            visit_id = %visit.visit_id,
            patient_id = %visit.patient_id,
            actor_id = %actor.id,
            "visit created and checked in"
        );

        self.audit.append(TransitionRecord {
            visit_id: visit.visit_id,
            from_stage: Stage::Registration,
            to_stage: next_stage,
            actor_role: actor.role,
            actor_id: actor.id.as_str().to_string(),
            timestamp: visit.updated_at,
            fields_changed: Default::default(),
            fields_rejected: Default::default(),
        });

        Ok(visit)
    }

    /// Apply a partial update and advance the visit one stage.
    ///
    /// Runs merge, validation, the conditional commit, then audit and notification.
    /// Every rejection is synchronous and final except [`WorkflowError::VersionConflict`],
    /// after which the caller must refetch and resubmit against fresh data.
    pub fn update_visit(
        &self,
        visit_id: VisitId,
        expected_version: u64,
        payload: &UpdatePayload,
        target: Option<Stage>,
        actor: &Actor,
    ) -> WorkflowResult<Visit> {
        let visit = self.store.load(visit_id)?;

        // Terminal visits reject before anything else so a malformed payload against
        // a completed record still reports the real problem.
        if visit.current_stage.is_terminal() {
            return Err(WorkflowError::TerminalState { visit_id });
        }

        // A stale expected_version can only ever conflict, so report that rather than
        // whatever validation would say about the newer record (a duplicate form
        // submit must read as a conflict, not as an authorization failure). The store
        // re-checks under its lock; this early check just cannot replace it.
        if visit.version != expected_version {
            return Err(WorkflowError::VersionConflict {
                visit_id,
                expected: expected_version,
                actual: visit.version,
            });
        }

        let mut outcome = update::merge(&visit.fields, payload, actor.role)?;
        let next_stage = validate::validate(&visit, &outcome.fields, target, actor.role)?;

        // A re-requested test invalidates the previous results: entering Lab clears
        // lab_results so the technician always reports into an empty field.
        if next_stage == Stage::Lab && outcome.fields.lab_results.is_some() {
            outcome.fields.lab_results = None;
            outcome.changed.insert(crate::visit::FieldName::LabResults);
        }

        let mut new_record = visit.clone();
        new_record.current_stage = next_stage;
        new_record.fields = outcome.fields;
        new_record.updated_at = visit.next_updated_at(Utc::now());

        let committed = self.store.commit(expected_version, new_record)?;

        tracing::info!(
            visit_id = %visit_id,
            from = %visit.current_stage,
            to = %next_stage,
            version = committed.version,
            actor_id = %actor.id,
            actor_role = %actor.role,
            "visit transitioned"
        );
        if !outcome.rejected.is_empty() {
            tracing::warn!(
                visit_id = %visit_id,
                actor_role = %actor.role,
                rejected = ?outcome.rejected,
                "dropped fields outside the actor's ownership"
            );
        }

        self.audit.append(TransitionRecord {
            visit_id,
            from_stage: visit.current_stage,
            to_stage: next_stage,
            actor_role: actor.role,
            actor_id: actor.id.as_str().to_string(),
            timestamp: committed.updated_at,
            fields_changed: outcome.changed,
            fields_rejected: outcome.rejected,
        });

        if matches!(next_stage, Stage::Billing | Stage::Completed) {
            self.notifier.stage_reached(&committed, next_stage);
        }

        Ok(committed)
    }

    /// Read-only fetch of a single visit.
    pub fn get_visit(&self, visit_id: VisitId) -> WorkflowResult<Visit> {
        self.store.load(visit_id)
    }

    /// The queue of visits awaiting `role` at `stage`, oldest first.
    pub fn list_worklist(&self, stage: Stage, role: Role) -> WorkflowResult<Vec<Visit>> {
        worklist::list(&self.store, stage, role)
    }

    /// Every visit regardless of stage — the reception desk view.
    pub fn list_all_visits(&self, role: Role) -> WorkflowResult<Vec<Visit>> {
        if role != Role::Reception {
            return Err(WorkflowError::UnauthorizedWorklist { role });
        }
        Ok(worklist::list_all(&self.store))
    }

    /// Flushed transition history for one visit, in order.
    pub fn history(&self, visit_id: VisitId) -> WorkflowResult<Vec<TransitionRecord>> {
        self.audit.history(visit_id)
    }

    /// Retry any audit records that failed to reach the log.
    pub fn flush_audit(&self) -> usize {
        self.audit.flush_pending()
    }
}
