//! The static stage graph.
//!
//! The original system never declared its workflow: the next stage was inferred from
//! which fields a role happened to populate on a shared record. This module makes the
//! graph explicit and total — a fixed table of directed edges, each owned by exactly
//! one role and protected by a field-readiness guard. No edge outside this table
//! exists, and a request naming any other `(from, to)` pair is rejected regardless of
//! the caller's role.
//!
//! Guards are pure predicates over [`VisitFields`]. The three guards leaving `Doctor`
//! are mutually exclusive by construction, so transition resolution never needs
//! disambiguation.

use crate::stage::{Role, Stage};
use crate::visit::{FieldName, VisitFields};

/// Field-readiness precondition on an edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Guard {
    /// No precondition (check-in auto-advance).
    None,
    /// `triage_notes` non-empty.
    TriageRecorded,
    /// `diagnosis` non-empty and the doctor requested a lab test.
    LabRequested,
    /// `diagnosis` non-empty, no lab requested, `prescription` non-empty.
    PrescriptionWritten,
    /// `diagnosis` non-empty, no lab requested, no prescription: straight to billing.
    NoPrescription,
    /// `lab_results` non-empty.
    ResultsReturned,
    /// Dispensing recorded by the pharmacist.
    Dispensed,
    /// The bill was settled.
    BillPaid,
}

impl Guard {
    /// Evaluate this guard over a (merged) field set.
    pub fn holds(&self, fields: &VisitFields) -> bool {
        match self {
            Self::None => true,
            Self::TriageRecorded => fields.is_set(FieldName::TriageNotes),
            Self::LabRequested => fields.is_set(FieldName::Diagnosis) && fields.lab_requested(),
            Self::PrescriptionWritten => {
                fields.is_set(FieldName::Diagnosis)
                    && !fields.lab_requested()
                    && fields.is_set(FieldName::Prescription)
            }
            Self::NoPrescription => {
                fields.is_set(FieldName::Diagnosis)
                    && !fields.lab_requested()
                    && !fields.is_set(FieldName::Prescription)
            }
            Self::ResultsReturned => fields.is_set(FieldName::LabResults),
            Self::Dispensed => fields.dispensing_recorded(),
            Self::BillPaid => fields.billing_status() == vwe_types::BillingStatus::Paid,
        }
    }

    /// The fields that keep this guard from holding, for caller diagnostics.
    ///
    /// Returned names are the ones a UI should highlight; an empty vec means the
    /// guard holds.
    pub fn unsatisfied(&self, fields: &VisitFields) -> Vec<FieldName> {
        let mut missing = Vec::new();
        match self {
            Self::None => {}
            Self::TriageRecorded => {
                if !fields.is_set(FieldName::TriageNotes) {
                    missing.push(FieldName::TriageNotes);
                }
            }
            Self::LabRequested | Self::PrescriptionWritten | Self::NoPrescription => {
                if !fields.is_set(FieldName::Diagnosis) {
                    missing.push(FieldName::Diagnosis);
                }
                if matches!(self, Self::PrescriptionWritten)
                    && !fields.lab_requested()
                    && !fields.is_set(FieldName::Prescription)
                {
                    missing.push(FieldName::Prescription);
                }
            }
            Self::ResultsReturned => {
                if !fields.is_set(FieldName::LabResults) {
                    missing.push(FieldName::LabResults);
                }
            }
            Self::Dispensed => {
                if !fields.dispensing_recorded() {
                    missing.push(FieldName::Dispensed);
                }
            }
            Self::BillPaid => {
                if fields.billing_status() != vwe_types::BillingStatus::Paid {
                    missing.push(FieldName::BillingStatus);
                }
            }
        }
        missing
    }
}

/// One directed transition in the workflow.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub from: Stage,
    pub to: Stage,
    /// The only role that may perform this transition.
    pub role: Role,
    pub guard: Guard,
}

/// The eight edges of the visit workflow. Order matters only for deterministic
/// iteration; guards decide which edge applies.
const EDGES: [Edge; 8] = [
    Edge {
        from: Stage::Registration,
        to: Stage::Triage,
        role: Role::Reception,
        guard: Guard::None,
    },
    Edge {
        from: Stage::Triage,
        to: Stage::Doctor,
        role: Role::Nurse,
        guard: Guard::TriageRecorded,
    },
    Edge {
        from: Stage::Doctor,
        to: Stage::Lab,
        role: Role::Doctor,
        guard: Guard::LabRequested,
    },
    Edge {
        from: Stage::Doctor,
        to: Stage::Pharmacy,
        role: Role::Doctor,
        guard: Guard::PrescriptionWritten,
    },
    Edge {
        from: Stage::Doctor,
        to: Stage::Billing,
        role: Role::Doctor,
        guard: Guard::NoPrescription,
    },
    Edge {
        from: Stage::Lab,
        to: Stage::Doctor,
        role: Role::LabTechnician,
        guard: Guard::ResultsReturned,
    },
    Edge {
        from: Stage::Pharmacy,
        to: Stage::Billing,
        role: Role::Pharmacist,
        guard: Guard::Dispensed,
    },
    Edge {
        from: Stage::Billing,
        to: Stage::Completed,
        role: Role::BillingOfficer,
        guard: Guard::BillPaid,
    },
];

/// Read-only view over the static edge table.
pub struct StageGraph;

impl StageGraph {
    /// All edges, in table order.
    pub fn edges() -> &'static [Edge] {
        &EDGES
    }

    /// Outbound edges of `stage`.
    pub fn edges_from(stage: Stage) -> impl Iterator<Item = &'static Edge> {
        EDGES.iter().filter(move |e| e.from == stage)
    }

    /// The edge `(from, to)`, if the graph defines it.
    pub fn edge(from: Stage, to: Stage) -> Option<&'static Edge> {
        EDGES.iter().find(|e| e.from == from && e.to == to)
    }

    /// The single role that owns a stage's outbound edges.
    ///
    /// Returns `None` for the terminal stage. Every non-terminal stage has exactly
    /// one owner (asserted by tests).
    pub fn owner(stage: Stage) -> Option<Role> {
        Self::edges_from(stage).next().map(|e| e.role)
    }

    /// Whether `stage` is reachable from `Registration` along graph edges.
    pub fn reachable(stage: Stage) -> bool {
        let mut seen = vec![Stage::Registration];
        let mut frontier = vec![Stage::Registration];
        while let Some(current) = frontier.pop() {
            if current == stage {
                return true;
            }
            for edge in Self::edges_from(current) {
                if !seen.contains(&edge.to) {
                    seen.push(edge.to);
                    frontier.push(edge.to);
                }
            }
        }
        stage == Stage::Registration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor_fields(diagnosis: bool, request_lab: Option<bool>, prescription: bool) -> VisitFields {
        VisitFields {
            diagnosis: diagnosis.then(|| "Flu".to_string()),
            request_lab,
            prescription: prescription.then(|| "Paracetamol".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn every_stage_is_reachable_from_registration() {
        for stage in Stage::ALL {
            assert!(StageGraph::reachable(stage), "{stage} should be reachable");
        }
    }

    #[test]
    fn each_nonterminal_stage_has_exactly_one_owner() {
        for stage in Stage::ALL {
            let roles: std::collections::HashSet<_> =
                StageGraph::edges_from(stage).map(|e| e.role).collect();
            if stage.is_terminal() {
                assert!(roles.is_empty());
            } else {
                assert_eq!(roles.len(), 1, "{stage} must be owned by one role");
            }
        }
    }

    #[test]
    fn no_edge_outside_the_table() {
        assert!(StageGraph::edge(Stage::Triage, Stage::Billing).is_none());
        assert!(StageGraph::edge(Stage::Registration, Stage::Doctor).is_none());
        assert!(StageGraph::edge(Stage::Completed, Stage::Registration).is_none());
        assert!(StageGraph::edge(Stage::Doctor, Stage::Lab).is_some());
    }

    #[test]
    fn doctor_guards_are_mutually_exclusive() {
        // Exhaust every combination of (diagnosis set, request_lab state, prescription set).
        for diagnosis in [false, true] {
            for request_lab in [None, Some(false), Some(true)] {
                for prescription in [false, true] {
                    let fields = doctor_fields(diagnosis, request_lab, prescription);
                    let holding: Vec<_> = StageGraph::edges_from(Stage::Doctor)
                        .filter(|e| e.guard.holds(&fields))
                        .collect();
                    assert!(
                        holding.len() <= 1,
                        "guards overlap for diagnosis={diagnosis} request_lab={request_lab:?} prescription={prescription}"
                    );
                    if diagnosis {
                        assert_eq!(holding.len(), 1, "one doctor edge must apply once diagnosed");
                    }
                }
            }
        }
    }

    #[test]
    fn doctor_edges_resolve_by_branch() {
        let lab = doctor_fields(true, Some(true), false);
        assert_eq!(
            StageGraph::edges_from(Stage::Doctor)
                .find(|e| e.guard.holds(&lab))
                .map(|e| e.to),
            Some(Stage::Lab)
        );

        let pharmacy = doctor_fields(true, Some(false), true);
        assert_eq!(
            StageGraph::edges_from(Stage::Doctor)
                .find(|e| e.guard.holds(&pharmacy))
                .map(|e| e.to),
            Some(Stage::Pharmacy)
        );

        let billing = doctor_fields(true, None, false);
        assert_eq!(
            StageGraph::edges_from(Stage::Doctor)
                .find(|e| e.guard.holds(&billing))
                .map(|e| e.to),
            Some(Stage::Billing)
        );
    }

    #[test]
    fn unsatisfied_names_the_missing_fields() {
        let fields = VisitFields::default();
        assert_eq!(
            Guard::TriageRecorded.unsatisfied(&fields),
            vec![FieldName::TriageNotes]
        );
        assert_eq!(
            Guard::LabRequested.unsatisfied(&fields),
            vec![FieldName::Diagnosis]
        );
        assert_eq!(
            Guard::BillPaid.unsatisfied(&fields),
            vec![FieldName::BillingStatus]
        );
        assert!(Guard::None.unsatisfied(&fields).is_empty());
    }
}
