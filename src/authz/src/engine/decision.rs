//! Authorisation decision and its explanation

use serde::Serialize;

use crate::types::{Action, EntityId, EntityType, Role};

/// A role that grants the requested action, and why
#[derive(Debug, Clone, Serialize)]
pub struct GrantingRole {
    pub role: Role,

    /// Scope whose rules matched first; `None` for the default rules
    pub scope: Option<String>,

    /// Entity type the matching rule requires the role to be held over
    pub required_type: EntityType,
}

/// Outcome of an authorisation check
///
/// An empty `grants` list means the action is not authorised. Grants are
/// unique by role identity; their order carries no meaning.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorisationDecision {
    pub action: Action,
    pub target: EntityId,

    /// Scope names whose rules were consulted; empty when the default rules
    /// were used
    pub scopes: Vec<String>,

    pub grants: Vec<GrantingRole>,
}

impl AuthorisationDecision {
    pub fn is_authorised(&self) -> bool {
        !self.grants.is_empty()
    }

    /// Whether `role` is among the granting roles
    pub fn is_granted_by(&self, role: &Role) -> bool {
        self.grants.iter().any(|grant| &grant.role == role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.grants.iter().map(|grant| &grant.role)
    }

    pub fn into_roles(self) -> Vec<Role> {
        self.grants.into_iter().map(|grant| grant.role).collect()
    }
}
