//! Role-scoped partial updates.
//!
//! A transition request carries a partial field map. Three states are distinguished
//! per field: supplied with a value, supplied as JSON `null` (an intentional clear,
//! e.g. `lab_results` reset when a doctor re-requests a test), and absent (preserve
//! whatever is stored). The merger applies the map onto the current field set without
//! clobbering unrelated fields, and silently drops — but flags — any field the acting
//! role does not own.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::error::{WorkflowError, WorkflowResult};
use crate::stage::Role;
use crate::visit::{FieldName, VisitFields};
use vwe_types::BillingStatus;

/// A single field operation within an update request.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldPatch {
    /// Assign a new value.
    Set(FieldValue),
    /// Explicitly reset the field to unset (JSON `null` or an empty string).
    Clear,
}

/// Typed value carried by a [`FieldPatch::Set`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

/// An ordered partial update, keyed by field name.
///
/// Keys absent from the payload are untouched by the merge. Construction from JSON
/// rejects unknown field names outright (a client programming error), while fields
/// the actor does not own survive construction and are rejected during the merge so
/// they can be flagged in the audit record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdatePayload(BTreeMap<FieldName, FieldPatch>);

impl UpdatePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: FieldName, value: FieldValue) -> Self {
        self.0.insert(field, FieldPatch::Set(value));
        self
    }

    pub fn clear(mut self, field: FieldName) -> Self {
        self.0.insert(field, FieldPatch::Clear);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldPatch)> {
        self.0.iter()
    }

    /// Build a payload from a decoded JSON object.
    ///
    /// `null` maps to [`FieldPatch::Clear`]; strings and booleans map to
    /// [`FieldPatch::Set`]. Unknown keys and other JSON types are rejected.
    pub fn from_json_map(map: &serde_json::Map<String, Value>) -> WorkflowResult<Self> {
        let mut payload = BTreeMap::new();
        for (key, value) in map {
            let field = FieldName::parse(key).ok_or_else(|| {
                WorkflowError::InvalidInput(format!("unknown visit field '{key}'"))
            })?;
            let patch = match value {
                Value::Null => FieldPatch::Clear,
                Value::String(s) => FieldPatch::Set(FieldValue::Text(s.clone())),
                Value::Bool(b) => FieldPatch::Set(FieldValue::Flag(*b)),
                other => {
                    return Err(WorkflowError::InvalidFieldValue {
                        field,
                        reason: format!("expected string, boolean or null, got {other}"),
                    })
                }
            };
            payload.insert(field, patch);
        }
        Ok(Self(payload))
    }
}

impl<'de> Deserialize<'de> for UpdatePayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = serde_json::Map::deserialize(deserializer)?;
        UpdatePayload::from_json_map(&map).map_err(serde::de::Error::custom)
    }
}

/// Result of merging an update onto a visit's current fields.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The new field set (input to guard evaluation and the conditional commit).
    pub fields: VisitFields,
    /// Fields whose stored value actually changed.
    pub changed: BTreeSet<FieldName>,
    /// Fields supplied by the caller but not owned by the acting role; dropped, not
    /// applied, and flagged in the audit record.
    pub rejected: BTreeSet<FieldName>,
}

/// Apply `payload` onto `current` on behalf of `actor_role`.
///
/// Supplied keys overwrite, omitted keys are preserved, and an explicit clear is a
/// distinct operation from absence. Fields outside the actor's ownership are dropped
/// into the `rejected` set. Type mismatches and unknown status values are errors.
pub fn merge(
    current: &VisitFields,
    payload: &UpdatePayload,
    actor_role: Role,
) -> WorkflowResult<MergeOutcome> {
    let mut fields = current.clone();
    let mut changed = BTreeSet::new();
    let mut rejected = BTreeSet::new();

    for (&field, patch) in payload.iter() {
        if field.owner() != actor_role {
            rejected.insert(field);
            continue;
        }

        apply(&mut fields, field, patch)?;

        if fields_differ(current, &fields, field) {
            changed.insert(field);
        }
    }

    Ok(MergeOutcome {
        fields,
        changed,
        rejected,
    })
}

fn apply(fields: &mut VisitFields, field: FieldName, patch: &FieldPatch) -> WorkflowResult<()> {
    match field {
        FieldName::TriageNotes => fields.triage_notes = text_patch(field, patch)?,
        FieldName::Diagnosis => fields.diagnosis = text_patch(field, patch)?,
        FieldName::Prescription => fields.prescription = text_patch(field, patch)?,
        FieldName::LabResults => fields.lab_results = text_patch(field, patch)?,
        FieldName::RequestLab => fields.request_lab = flag_patch(field, patch)?,
        FieldName::Dispensed => fields.dispensed = flag_patch(field, patch)?,
        FieldName::BillingStatus => fields.billing_status = status_patch(field, patch)?,
    }
    Ok(())
}

/// Text fields: a supplied empty/whitespace string is the same intentional clear as
/// an explicit `null`.
fn text_patch(field: FieldName, patch: &FieldPatch) -> WorkflowResult<Option<String>> {
    match patch {
        FieldPatch::Clear => Ok(None),
        FieldPatch::Set(FieldValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        FieldPatch::Set(FieldValue::Flag(_)) => Err(WorkflowError::InvalidFieldValue {
            field,
            reason: "expected text, got a boolean".into(),
        }),
    }
}

fn flag_patch(field: FieldName, patch: &FieldPatch) -> WorkflowResult<Option<bool>> {
    match patch {
        FieldPatch::Clear => Ok(None),
        FieldPatch::Set(FieldValue::Flag(b)) => Ok(Some(*b)),
        FieldPatch::Set(FieldValue::Text(_)) => Err(WorkflowError::InvalidFieldValue {
            field,
            reason: "expected a boolean, got text".into(),
        }),
    }
}

fn status_patch(field: FieldName, patch: &FieldPatch) -> WorkflowResult<Option<BillingStatus>> {
    match patch {
        FieldPatch::Clear => Ok(None),
        FieldPatch::Set(FieldValue::Text(s)) => {
            let status =
                BillingStatus::from_str(s).map_err(|e| WorkflowError::InvalidFieldValue {
                    field,
                    reason: e.to_string(),
                })?;
            Ok(Some(status))
        }
        FieldPatch::Set(FieldValue::Flag(_)) => Err(WorkflowError::InvalidFieldValue {
            field,
            reason: "expected a billing status string, got a boolean".into(),
        }),
    }
}

fn fields_differ(before: &VisitFields, after: &VisitFields, field: FieldName) -> bool {
    match field {
        FieldName::TriageNotes => before.triage_notes != after.triage_notes,
        FieldName::Diagnosis => before.diagnosis != after.diagnosis,
        FieldName::Prescription => before.prescription != after.prescription,
        FieldName::RequestLab => before.request_lab != after.request_lab,
        FieldName::LabResults => before.lab_results != after.lab_results,
        FieldName::Dispensed => before.dispensed != after.dispensed,
        FieldName::BillingStatus => before.billing_status != after.billing_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_from_json(json: &str) -> UpdatePayload {
        let map: serde_json::Map<String, Value> = serde_json::from_str(json).unwrap();
        UpdatePayload::from_json_map(&map).unwrap()
    }

    #[test]
    fn supplied_keys_overwrite_and_omitted_keys_survive() {
        let current = VisitFields {
            triage_notes: Some("BP 120/80".into()),
            diagnosis: Some("Flu".into()),
            ..Default::default()
        };
        let payload = payload_from_json(r#"{"diagnosis": "Influenza A"}"#);

        let outcome = merge(&current, &payload, Role::Doctor).unwrap();
        assert_eq!(outcome.fields.diagnosis.as_deref(), Some("Influenza A"));
        assert_eq!(outcome.fields.triage_notes.as_deref(), Some("BP 120/80"));
        assert!(outcome.changed.contains(&FieldName::Diagnosis));
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn explicit_null_clears_where_absence_preserves() {
        let current = VisitFields {
            lab_results: Some("WBC normal".into()),
            ..Default::default()
        };

        let cleared = merge(
            &current,
            &payload_from_json(r#"{"lab_results": null}"#),
            Role::LabTechnician,
        )
        .unwrap();
        assert_eq!(cleared.fields.lab_results, None);
        assert!(cleared.changed.contains(&FieldName::LabResults));

        let untouched = merge(&current, &payload_from_json("{}"), Role::LabTechnician).unwrap();
        assert_eq!(untouched.fields.lab_results.as_deref(), Some("WBC normal"));
        assert!(untouched.changed.is_empty());
    }

    #[test]
    fn empty_string_behaves_like_an_explicit_clear() {
        let current = VisitFields {
            prescription: Some("Paracetamol".into()),
            ..Default::default()
        };
        let outcome = merge(
            &current,
            &payload_from_json(r#"{"prescription": "  "}"#),
            Role::Doctor,
        )
        .unwrap();
        assert_eq!(outcome.fields.prescription, None);
    }

    #[test]
    fn unowned_fields_are_dropped_and_flagged() {
        let current = VisitFields::default();
        let payload =
            payload_from_json(r#"{"triage_notes": "BP 120/80", "diagnosis": "self-diagnosed"}"#);

        let outcome = merge(&current, &payload, Role::Nurse).unwrap();
        assert_eq!(outcome.fields.triage_notes.as_deref(), Some("BP 120/80"));
        assert_eq!(outcome.fields.diagnosis, None, "nurse cannot write diagnosis");
        assert!(outcome.rejected.contains(&FieldName::Diagnosis));
        assert_eq!(outcome.changed.len(), 1);
    }

    #[test]
    fn unknown_field_names_are_a_client_error() {
        let map: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"ward": "W3"}"#).unwrap();
        assert!(matches!(
            UpdatePayload::from_json_map(&map),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn type_mismatches_are_rejected() {
        let current = VisitFields::default();

        let err = merge(
            &current,
            &payload_from_json(r#"{"request_lab": "yes"}"#),
            Role::Doctor,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidFieldValue {
                field: FieldName::RequestLab,
                ..
            }
        ));

        let err = merge(
            &current,
            &payload_from_json(r#"{"diagnosis": true}"#),
            Role::Doctor,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidFieldValue {
                field: FieldName::Diagnosis,
                ..
            }
        ));
    }

    #[test]
    fn billing_status_values_are_validated() {
        let current = VisitFields::default();

        let ok = merge(
            &current,
            &payload_from_json(r#"{"billing_status": "paid"}"#),
            Role::BillingOfficer,
        )
        .unwrap();
        assert_eq!(ok.fields.billing_status, Some(BillingStatus::Paid));

        let err = merge(
            &current,
            &payload_from_json(r#"{"billing_status": "settled"}"#),
            Role::BillingOfficer,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidFieldValue { .. }));
    }

    #[test]
    fn payload_deserialises_straight_from_json() {
        let payload: UpdatePayload =
            serde_json::from_str(r#"{"diagnosis": "Flu", "lab_results": null}"#).unwrap();
        assert_eq!(
            payload,
            UpdatePayload::new()
                .set(FieldName::Diagnosis, FieldValue::Text("Flu".into()))
                .clear(FieldName::LabResults)
        );
    }

    #[test]
    fn resubmitting_the_stored_value_is_not_a_change() {
        let current = VisitFields {
            triage_notes: Some("BP 120/80".into()),
            ..Default::default()
        };
        let outcome = merge(
            &current,
            &payload_from_json(r#"{"triage_notes": "BP 120/80"}"#),
            Role::Nurse,
        )
        .unwrap();
        assert!(outcome.changed.is_empty());
    }
}
