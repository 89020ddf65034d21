use crate::stage::{Role, Stage};
use crate::visit::FieldName;
use vwe_uuid::VisitId;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("role {role} does not own the outbound transition from stage {stage}")]
    UnauthorizedTransition { role: Role, stage: Stage },

    #[error(
        "transition {from} -> {to} rejected; missing or unsatisfied fields: [{}]",
        .missing.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
    )]
    GuardNotSatisfied {
        from: Stage,
        to: Stage,
        missing: Vec<FieldName>,
    },

    #[error("visit {visit_id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        visit_id: VisitId,
        expected: u64,
        actual: u64,
    },

    #[error("visit {visit_id} is completed and accepts no further writes")]
    TerminalState { visit_id: VisitId },

    #[error("no transition {from} -> {to} exists in the stage graph")]
    UnknownEdge { from: Stage, to: Stage },

    #[error("no visit with id {visit_id}")]
    UnknownVisit { visit_id: VisitId },

    #[error("visit {visit_id} already exists")]
    DuplicateVisit { visit_id: VisitId },

    #[error("role {role} does not own the worklist for stage {stage}")]
    RoleStageMismatch { role: Role, stage: Stage },

    #[error("only reception may list visits across all stages (got role {role})")]
    UnauthorizedWorklist { role: Role },

    #[error("invalid value for field {field}: {reason}")]
    InvalidFieldValue { field: FieldName, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to create visit storage directory: {0}")]
    StoreDirCreation(std::io::Error),
    #[error("failed to write visit record: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read visit record: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),

    #[error(transparent)]
    VisitId(#[from] vwe_uuid::VisitIdError),
    #[error(transparent)]
    Text(#[from] vwe_types::TextError),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

impl WorkflowError {
    /// True for the single error class a caller is expected to retry against fresh
    /// data. Every other rejection is final for the submitted request.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
