//! Visit identifiers and sharded-path utilities.
//!
//! The workflow engine stores each visit record under a sharded directory derived from its
//! identifier.
//!
//! To keep path derivation deterministic and consistent across the codebase, the engine uses a
//! *canonical* identifier representation: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - A small wrapper type ([`VisitId`]) that *guarantees* the canonical format once constructed.
//! - Shared sharding logic to derive a visit's storage directory from its identifier.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Notes:
//! - This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! - Canonical form is *required* for externally supplied identifiers (for example, a visit id in
//!   an API path). Use [`VisitId::parse`] to validate an input string.
//! - Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected.
//!
//! ## Sharded directory layout
//! For a canonical identifier `v`, a visit is stored under:
//! `parent_dir/<v[0..2]>/<v[2..4]>/<v>/`
//!
//! Example:
//! `visit_data/visits/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This scheme prevents very large fan-out in a single directory.

mod service;

pub use service::{Uuid, VisitId};

/// Error type for visit identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum VisitIdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for visit identifier operations.
pub type VisitIdResult<T> = Result<T, VisitIdError>;
