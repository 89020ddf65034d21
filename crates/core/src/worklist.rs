//! Per-role worklist queries.
//!
//! Worklists are read-only views used to build each role's queue. Every call
//! re-evaluates against current data — there is no server-held cursor, so a visit
//! moving between polls is expected, not a bug.

use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::StageGraph;
use crate::stage::{Role, Stage};
use crate::store::VisitStore;
use crate::visit::Visit;

/// Visits waiting at `stage`, oldest first.
///
/// `role` must be the graph owner of `stage`; worklists expose exactly the queue a
/// role is allowed to act on. Ordering is `updated_at` ascending — the visit that has
/// waited longest is served first.
pub fn list(store: &VisitStore, stage: Stage, role: Role) -> WorkflowResult<Vec<Visit>> {
    if StageGraph::owner(stage) != Some(role) {
        return Err(WorkflowError::RoleStageMismatch { role, stage });
    }

    let mut visits: Vec<Visit> = store
        .scan()
        .into_iter()
        .filter(|v| v.current_stage == stage)
        .collect();
    visits.sort_by_key(|v| v.updated_at);
    Ok(visits)
}

/// Every visit regardless of stage, newest first — the check-in desk view.
pub fn list_all(store: &VisitStore) -> Vec<Visit> {
    let mut visits = store.scan();
    visits.sort_by_key(|v| std::cmp::Reverse(v.created_at));
    visits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::visit::VisitFields;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use vwe_types::NonEmptyText;
    use vwe_uuid::VisitId;

    fn visit_at(stage: Stage, age_secs: i64) -> Visit {
        let now = Utc::now();
        Visit {
            visit_id: VisitId::new(),
            patient_id: NonEmptyText::new("42").unwrap(),
            current_stage: stage,
            version: 1,
            fields: VisitFields::default(),
            created_at: now - Duration::seconds(age_secs),
            updated_at: now - Duration::seconds(age_secs),
        }
    }

    fn store_with(visits: &[Visit], dir: &TempDir) -> VisitStore {
        let cfg = EngineConfig::new(dir.path().to_path_buf()).expect("config should build");
        let store = VisitStore::open(&cfg).expect("store should open");
        for visit in visits {
            store.insert(visit).expect("insert should succeed");
        }
        store
    }

    #[test]
    fn lists_only_the_requested_stage_oldest_first() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let fresh = visit_at(Stage::Doctor, 10);
        let stale = visit_at(Stage::Doctor, 300);
        let elsewhere = visit_at(Stage::Triage, 600);
        let store = store_with(&[fresh.clone(), stale.clone(), elsewhere], &dir);

        let worklist = list(&store, Stage::Doctor, Role::Doctor).expect("list should succeed");
        let ids: Vec<_> = worklist.iter().map(|v| v.visit_id).collect();
        assert_eq!(ids, vec![stale.visit_id, fresh.visit_id]);
    }

    #[test]
    fn role_must_own_the_stage() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = store_with(&[], &dir);

        let err = list(&store, Stage::Doctor, Role::Nurse).expect_err("list should fail");
        assert!(matches!(
            err,
            WorkflowError::RoleStageMismatch {
                role: Role::Nurse,
                stage: Stage::Doctor,
            }
        ));
    }

    #[test]
    fn terminal_stage_has_no_worklist() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = store_with(&[], &dir);
        assert!(list(&store, Stage::Completed, Role::BillingOfficer).is_err());
    }

    #[test]
    fn list_all_is_newest_first() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let old = visit_at(Stage::Billing, 600);
        let new = visit_at(Stage::Triage, 5);
        let store = store_with(&[old.clone(), new.clone()], &dir);

        let ids: Vec<_> = list_all(&store).into_iter().map(|v| v.visit_id).collect();
        assert_eq!(ids, vec![new.visit_id, old.visit_id]);
    }
}
