//! Pure transition validation.
//!
//! `validate` is a pure function over the visit, the merged field set and the actor's
//! role. Guards are evaluated *after* the partial update has been applied, so a single
//! request may both supply `diagnosis` and move `Doctor -> Pharmacy`. It performs no
//! IO and holds no state; the conditional commit in [`crate::store`] is the only
//! serialization point.

use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::StageGraph;
use crate::stage::{Role, Stage};
use crate::visit::{FieldName, Visit, VisitFields};

/// Resolve the transition a request is asking for.
///
/// * `merged` — the field set after the partial update was applied.
/// * `target` — optional explicit destination stage. When present, the `(current,
///   target)` pair must exist in the graph (`UnknownEdge` otherwise — a client error
///   that is logged and never coerced to a nearby edge). When absent, the next stage
///   is derived from the guards, which are mutually exclusive by construction.
///
/// Checks run in order: terminal state, edge existence, role ownership, guard
/// readiness. On success the single deterministic next stage is returned.
pub fn validate(
    visit: &Visit,
    merged: &VisitFields,
    target: Option<Stage>,
    actor_role: Role,
) -> WorkflowResult<Stage> {
    if visit.current_stage.is_terminal() {
        return Err(WorkflowError::TerminalState {
            visit_id: visit.visit_id,
        });
    }

    let from = visit.current_stage;

    if let Some(to) = target {
        let Some(edge) = StageGraph::edge(from, to) else {
            tracing::warn!(
                visit_id = %visit.visit_id,
                %from,
                %to,
                "transition request names an edge that does not exist"
            );
            return Err(WorkflowError::UnknownEdge { from, to });
        };
        if edge.role != actor_role {
            return Err(WorkflowError::UnauthorizedTransition {
                role: actor_role,
                stage: from,
            });
        }
        if !edge.guard.holds(merged) {
            return Err(WorkflowError::GuardNotSatisfied {
                from,
                to,
                missing: edge.guard.unsatisfied(merged),
            });
        }
        return Ok(edge.to);
    }

    let candidates: Vec<_> = StageGraph::edges_from(from)
        .filter(|e| e.role == actor_role)
        .collect();
    if candidates.is_empty() {
        return Err(WorkflowError::UnauthorizedTransition {
            role: actor_role,
            stage: from,
        });
    }

    if let Some(edge) = candidates.iter().find(|e| e.guard.holds(merged)) {
        return Ok(edge.to);
    }

    // No guard holds: report the union of unsatisfied fields across the candidate
    // edges so the caller can see everything that would unblock the visit.
    let mut missing: Vec<FieldName> = Vec::new();
    for edge in &candidates {
        for field in edge.guard.unsatisfied(merged) {
            if !missing.contains(&field) {
                missing.push(field);
            }
        }
    }
    let to = candidates[0].to;
    Err(WorkflowError::GuardNotSatisfied { from, to, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visit::VisitFields;
    use chrono::Utc;
    use vwe_types::{BillingStatus, NonEmptyText};
    use vwe_uuid::VisitId;

    fn visit_at(stage: Stage) -> Visit {
        Visit {
            visit_id: VisitId::new(),
            patient_id: NonEmptyText::new("42").unwrap(),
            current_stage: stage,
            version: 1,
            fields: VisitFields::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completed_visits_accept_no_transition() {
        let visit = visit_at(Stage::Completed);
        let err = validate(&visit, &visit.fields, None, Role::Doctor).unwrap_err();
        assert!(matches!(err, WorkflowError::TerminalState { .. }));
    }

    #[test]
    fn wrong_role_is_unauthorized() {
        let visit = visit_at(Stage::Triage);
        let err =
            validate(&visit, &visit.fields, None, Role::BillingOfficer).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::UnauthorizedTransition {
                role: Role::BillingOfficer,
                stage: Stage::Triage,
            }
        ));
    }

    #[test]
    fn role_exclusivity_holds_for_every_stage() {
        let roles = [
            Role::Reception,
            Role::Nurse,
            Role::Doctor,
            Role::LabTechnician,
            Role::Pharmacist,
            Role::BillingOfficer,
        ];
        for stage in Stage::ALL.into_iter().filter(|s| !s.is_terminal()) {
            let owner = StageGraph::owner(stage).unwrap();
            let visit = visit_at(stage);
            for role in roles {
                let result = validate(&visit, &visit.fields, None, role);
                if role == owner {
                    // The owner may still trip a guard, but never authorization.
                    assert!(!matches!(
                        result,
                        Err(WorkflowError::UnauthorizedTransition { .. })
                    ));
                } else {
                    assert!(matches!(
                        result,
                        Err(WorkflowError::UnauthorizedTransition { .. })
                    ));
                }
            }
        }
    }

    #[test]
    fn nurse_advances_once_triage_notes_present() {
        let visit = visit_at(Stage::Triage);

        let err = validate(&visit, &VisitFields::default(), None, Role::Nurse).unwrap_err();
        match err {
            WorkflowError::GuardNotSatisfied { missing, .. } => {
                assert_eq!(missing, vec![FieldName::TriageNotes]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let merged = VisitFields {
            triage_notes: Some("BP 120/80".into()),
            ..Default::default()
        };
        assert_eq!(
            validate(&visit, &merged, None, Role::Nurse).unwrap(),
            Stage::Doctor
        );
    }

    #[test]
    fn doctor_branches_deterministically() {
        let visit = visit_at(Stage::Doctor);

        let to_lab = VisitFields {
            diagnosis: Some("Flu".into()),
            request_lab: Some(true),
            ..Default::default()
        };
        assert_eq!(
            validate(&visit, &to_lab, None, Role::Doctor).unwrap(),
            Stage::Lab
        );

        let to_pharmacy = VisitFields {
            diagnosis: Some("Flu".into()),
            request_lab: Some(false),
            prescription: Some("Paracetamol".into()),
            ..Default::default()
        };
        assert_eq!(
            validate(&visit, &to_pharmacy, None, Role::Doctor).unwrap(),
            Stage::Pharmacy
        );

        let to_billing = VisitFields {
            diagnosis: Some("Flu".into()),
            ..Default::default()
        };
        assert_eq!(
            validate(&visit, &to_billing, None, Role::Doctor).unwrap(),
            Stage::Billing
        );
    }

    #[test]
    fn undiagnosed_doctor_submission_reports_diagnosis() {
        let visit = visit_at(Stage::Doctor);
        let err = validate(&visit, &VisitFields::default(), None, Role::Doctor).unwrap_err();
        match err {
            WorkflowError::GuardNotSatisfied { missing, .. } => {
                assert!(missing.contains(&FieldName::Diagnosis));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_target_must_be_a_graph_edge() {
        let visit = visit_at(Stage::Triage);
        let err = validate(
            &visit,
            &visit.fields,
            Some(Stage::Billing),
            Role::Nurse,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::UnknownEdge {
                from: Stage::Triage,
                to: Stage::Billing,
            }
        ));
    }

    #[test]
    fn explicit_target_still_checks_role_and_guard() {
        let visit = visit_at(Stage::Doctor);
        let merged = VisitFields {
            diagnosis: Some("Flu".into()),
            request_lab: Some(true),
            ..Default::default()
        };

        let err = validate(&visit, &merged, Some(Stage::Lab), Role::Nurse).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::UnauthorizedTransition { .. }
        ));

        // Requesting pharmacy while a lab is pending fails the pharmacy guard.
        let err = validate(&visit, &merged, Some(Stage::Pharmacy), Role::Doctor).unwrap_err();
        assert!(matches!(err, WorkflowError::GuardNotSatisfied { .. }));

        assert_eq!(
            validate(&visit, &merged, Some(Stage::Lab), Role::Doctor).unwrap(),
            Stage::Lab
        );
    }

    #[test]
    fn billing_completes_only_when_paid() {
        let visit = visit_at(Stage::Billing);

        let unpaid = VisitFields {
            billing_status: Some(BillingStatus::Unpaid),
            ..Default::default()
        };
        let err = validate(&visit, &unpaid, None, Role::BillingOfficer).unwrap_err();
        assert!(matches!(err, WorkflowError::GuardNotSatisfied { .. }));

        let waived = VisitFields {
            billing_status: Some(BillingStatus::Waived),
            ..Default::default()
        };
        assert!(validate(&visit, &waived, None, Role::BillingOfficer).is_err());

        let paid = VisitFields {
            billing_status: Some(BillingStatus::Paid),
            ..Default::default()
        };
        assert_eq!(
            validate(&visit, &paid, None, Role::BillingOfficer).unwrap(),
            Stage::Completed
        );
    }
}
