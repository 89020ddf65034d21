//! The visit record.
//!
//! One `Visit` is the permanent clinical record of a single encounter. It is created
//! at check-in, mutated by exactly one authorized actor per transition, and becomes
//! immutable once it reaches [`Stage::Completed`]. Visits are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stage::{Role, Stage};
use vwe_types::{BillingStatus, NonEmptyText};
use vwe_uuid::VisitId;

/// Names of the stage-scoped payload fields.
///
/// Each field is owned by exactly one role: only that role, acting at its own stage,
/// may write it. Supplied fields outside the actor's ownership are dropped by the
/// merger and flagged in the audit record.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    TriageNotes,
    Diagnosis,
    Prescription,
    RequestLab,
    LabResults,
    Dispensed,
    BillingStatus,
}

impl FieldName {
    pub const ALL: [FieldName; 7] = [
        FieldName::TriageNotes,
        FieldName::Diagnosis,
        FieldName::Prescription,
        FieldName::RequestLab,
        FieldName::LabResults,
        FieldName::Dispensed,
        FieldName::BillingStatus,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TriageNotes => "triage_notes",
            Self::Diagnosis => "diagnosis",
            Self::Prescription => "prescription",
            Self::RequestLab => "request_lab",
            Self::LabResults => "lab_results",
            Self::Dispensed => "dispensed",
            Self::BillingStatus => "billing_status",
        }
    }

    /// The single role allowed to write this field.
    pub const fn owner(self) -> Role {
        match self {
            Self::TriageNotes => Role::Nurse,
            Self::Diagnosis | Self::Prescription | Self::RequestLab => Role::Doctor,
            Self::LabResults => Role::LabTechnician,
            Self::Dispensed => Role::Pharmacist,
            Self::BillingStatus => Role::BillingOfficer,
        }
    }

    /// Look a field up by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-scoped payload of a visit.
///
/// `None` means the field has not been supplied (or was explicitly cleared by its
/// owner, e.g. `lab_results` reset when a doctor re-requests a test). Text fields are
/// stored trimmed and never empty; presence of `Some` therefore implies content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitFields {
    #[serde(default)]
    pub triage_notes: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub request_lab: Option<bool>,
    #[serde(default)]
    pub lab_results: Option<String>,
    #[serde(default)]
    pub dispensed: Option<bool>,
    #[serde(default)]
    pub billing_status: Option<BillingStatus>,
}

impl VisitFields {
    /// Whether the named field currently carries a value.
    pub fn is_set(&self, field: FieldName) -> bool {
        match field {
            FieldName::TriageNotes => self.triage_notes.is_some(),
            FieldName::Diagnosis => self.diagnosis.is_some(),
            FieldName::Prescription => self.prescription.is_some(),
            FieldName::RequestLab => self.request_lab.is_some(),
            FieldName::LabResults => self.lab_results.is_some(),
            FieldName::Dispensed => self.dispensed.is_some(),
            FieldName::BillingStatus => self.billing_status.is_some(),
        }
    }

    /// Guard view of `request_lab`: an unset flag means no lab was requested.
    pub fn lab_requested(&self) -> bool {
        self.request_lab.unwrap_or(false)
    }

    /// Guard view of `dispensed`: unset means dispensing has not been recorded.
    pub fn dispensing_recorded(&self) -> bool {
        self.dispensed.unwrap_or(false)
    }

    /// Guard view of `billing_status`: absent defaults to unpaid.
    pub fn billing_status(&self) -> BillingStatus {
        self.billing_status.unwrap_or(BillingStatus::Unpaid)
    }
}

/// One clinical encounter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Unique, immutable identifier.
    pub visit_id: VisitId,
    /// Immutable reference to the patient record (owned by the excluded CRUD layer).
    pub patient_id: NonEmptyText,
    pub current_stage: Stage,
    /// Monotonic counter; every accepted write increments it by exactly 1.
    pub version: u64,
    #[serde(default)]
    pub fields: VisitFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Returns `updated_at` advanced to `now`, clamped so it never decreases even if
    /// the wall clock stepped backwards between writes.
    pub fn next_updated_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.updated_at)
    }
}
