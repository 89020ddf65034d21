//! Actor identity.
//!
//! Authentication and token issuance live outside this engine; the engine trusts the
//! `(actor_id, actor_role)` pair resolved by the caller and records both in the audit
//! trail.

use crate::stage::Role;
use vwe_types::{NonEmptyText, TextError};

/// The identity under which a transition request is made.
#[derive(Clone, Debug)]
pub struct Actor {
    /// Opaque caller identifier (staff number, username), recorded in audit entries.
    pub id: NonEmptyText,
    /// The professional role the caller is acting as.
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl AsRef<str>, role: Role) -> Result<Self, TextError> {
        Ok(Self {
            id: NonEmptyText::new(id)?,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_actor_id() {
        assert!(Actor::new("  ", Role::Nurse).is_err());
    }

    #[test]
    fn keeps_trimmed_id() {
        let actor = Actor::new(" nurse-7 ", Role::Nurse).unwrap();
        assert_eq!(actor.id.as_str(), "nurse-7");
    }
}
