//! Workflow stages and actor roles.
//!
//! A visit moves through the stages below along the edges defined in [`crate::graph`].
//! Stage and role names on the wire are the lowercase forms the surrounding hospital
//! system already uses, so existing collaborators keep working unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

/// A named point in a visit's clinical workflow.
///
/// The ordering of variants mirrors the nominal happy path, but stages are only
/// totally ordered along realized paths: `Lab` and `Pharmacy` are optional branches
/// and `Doctor` may be re-entered via `Lab`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Registration,
    Triage,
    Doctor,
    Lab,
    Pharmacy,
    Billing,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Registration,
        Stage::Triage,
        Stage::Doctor,
        Stage::Lab,
        Stage::Pharmacy,
        Stage::Billing,
        Stage::Completed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Triage => "triage",
            Self::Doctor => "doctor",
            Self::Lab => "lab",
            Self::Pharmacy => "pharmacy",
            Self::Billing => "billing",
            Self::Completed => "completed",
        }
    }

    /// A completed visit is immutable; no outbound edges exist.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registration" | "reception" => Ok(Self::Registration),
            "triage" => Ok(Self::Triage),
            "doctor" => Ok(Self::Doctor),
            "lab" => Ok(Self::Lab),
            "pharmacy" => Ok(Self::Pharmacy),
            "billing" => Ok(Self::Billing),
            "completed" => Ok(Self::Completed),
            other => Err(WorkflowError::InvalidInput(format!(
                "unknown stage '{other}'"
            ))),
        }
    }
}

/// The six cooperating roles that hand a visit off between stages.
///
/// Parsing accepts the wire spellings the original front desk software sends
/// (`Receptionist`, `Lab Tech`, `Billing`) alongside the canonical names.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reception,
    Nurse,
    Doctor,
    LabTechnician,
    Pharmacist,
    BillingOfficer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reception => "reception",
            Self::Nurse => "nurse",
            Self::Doctor => "doctor",
            Self::LabTechnician => "lab_technician",
            Self::Pharmacist => "pharmacist",
            Self::BillingOfficer => "billing_officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "reception" | "receptionist" => Ok(Self::Reception),
            "nurse" => Ok(Self::Nurse),
            "doctor" => Ok(Self::Doctor),
            "lab_technician" | "lab_tech" => Ok(Self::LabTechnician),
            "pharmacist" => Ok(Self::Pharmacist),
            "billing_officer" | "billing" => Ok(Self::BillingOfficer),
            other => Err(WorkflowError::InvalidInput(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}
