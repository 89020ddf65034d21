//! # VWE Core
//!
//! Core business logic for the patient-visit workflow engine.
//!
//! A visit is one clinical encounter handed off across six cooperating roles
//! (reception, nurse, doctor, lab technician, pharmacist, billing officer). Each role
//! reads the shared record, appends its stage-scoped data, and advances the visit to
//! the next stage. This crate owns:
//!
//! - The static stage graph: which transitions exist, which role performs each, and
//!   the field-readiness guard on every edge ([`graph`])
//! - Role-scoped partial updates that never clobber unrelated fields ([`update`])
//! - Pure transition validation over the merged record ([`validate`])
//! - The versioned file-backed visit store with a single conditional-write commit
//!   primitive ([`store`])
//! - The append-only transition audit trail ([`audit`])
//! - Per-role worklist queries ([`worklist`])
//!
//! **No API concerns**: HTTP servers, OpenAPI schemas and caller authentication belong
//! in the service binary. This crate trusts the `(actor_id, actor_role)` pair it is
//! handed.

pub mod actor;
pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod notify;
pub mod service;
pub mod stage;
pub mod store;
pub mod update;
pub mod validate;
pub mod visit;
pub mod worklist;

pub use actor::Actor;
pub use audit::{AuditTrail, TransitionRecord};
pub use config::EngineConfig;
pub use error::{WorkflowError, WorkflowResult};
pub use graph::{Edge, Guard, StageGraph};
pub use notify::{LogNotifier, StageNotifier};
pub use service::VisitService;
pub use stage::{Role, Stage};
pub use store::VisitStore;
pub use update::{FieldPatch, FieldValue, MergeOutcome, UpdatePayload};
pub use visit::{FieldName, Visit, VisitFields};

pub use vwe_types::{BillingStatus, NonEmptyText};
pub use vwe_uuid::VisitId;
