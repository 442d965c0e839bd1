//! Scope rule resolution
//!
//! Maps `(action, target entity type, scope)` to the role types that grant the
//! action, and the entity type each of those roles must be held over.
//!
//! # Example
//!
//! ```
//! use roleaction_authz::rules::{RuleConfig, RuleConfigResolver, ScopeRuleResolver};
//! use roleaction_authz::types::{Action, EntityType};
//!
//! let config = RuleConfig::from_toml(r#"
//!     [[mapping]]
//!     projects = ["EGI"]
//!
//!     [[mapping.rule]]
//!     roles = ["Site Administrator"]
//!     over = "Site"
//!     actions = ["EDIT_OBJECT"]
//!     targets = ["Site"]
//! "#).unwrap();
//!
//! let resolver = RuleConfigResolver::new(&config).unwrap();
//! let action = Action::parse("EDIT_OBJECT").unwrap();
//! let rules = resolver
//!     .required_role_types(&action, &EntityType::new("Site"), Some("EGI"))
//!     .unwrap();
//!
//! assert_eq!(rules.get("Site Administrator").map(|t| t.as_str()), Some("Site"));
//! ```

mod config;
mod resolver;

pub use config::{RoleActionMapping, RoleActionRule, RuleConfig, TypeRegistry, RULE_CONFIG_VERSION};
pub use resolver::{CacheStats, RuleConfigResolver};

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{Action, EntityType, Role};

/// Rule configuration errors
///
/// Raised at load time for a malformed configuration, and at lookup time when
/// the domain graph names a scope or type the configuration does not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A reachable scope has no mapping at all
    #[error("No role action mapping is configured for scope '{0}'")]
    UnknownScope(String),

    /// Entity type tag is not in the registry
    #[error("Unknown entity type '{tag}' in {context}")]
    UnknownEntityType { tag: String, context: String },

    /// Role type name is not in the registry
    #[error("Unknown role type '{0}'")]
    UnknownRoleType(String),

    /// The same role type is bound to two entity types within one scope
    #[error("Role type '{role_type}' in scope '{scope}' is mapped over both '{first}' and '{second}'")]
    ConflictingRoleMapping {
        scope: String,
        role_type: String,
        first: String,
        second: String,
    },

    /// Scope declared by more than one mapping
    #[error("Scope '{0}' is declared by more than one mapping")]
    DuplicateScope(String),

    /// Structurally invalid rule
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Configuration written for a different format version
    #[error("Unsupported rule configuration version {0}")]
    UnsupportedVersion(u32),
}

/// Role type name → entity type the role must be held over
///
/// Role type names are compared case-sensitively; the held-over entity type is
/// compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeRuleSet {
    required: BTreeMap<String, EntityType>,
}

impl ScopeRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role_type: impl Into<String>, over: EntityType) {
        self.required.insert(role_type.into(), over);
    }

    /// Required entity type for a role type name
    pub fn get(&self, role_type: &str) -> Option<&EntityType> {
        self.required.get(role_type)
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityType)> {
        self.required.iter().map(|(name, over)| (name.as_str(), over))
    }

    /// Required entity type matched by `role`, if any entry grants it
    pub fn granting_type(&self, role: &Role) -> Option<&EntityType> {
        let required = self.required.get(&role.role_type.name)?;
        required
            .matches(role.owned_entity.entity_type.as_str())
            .then_some(required)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScopeRuleSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (role_type, over) in iter {
            set.insert(role_type, EntityType::new(over));
        }
        set
    }
}

/// Source of per-scope role requirements
pub trait ScopeRuleResolver: Send + Sync {
    /// Role types granting `action` on entities of `target_type` within
    /// `scope`; `None` selects the default rules for unscoped entities.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownScope`] if `scope` has no mapping at all. A known
    /// scope without a matching rule yields an empty set instead.
    fn required_role_types(
        &self,
        action: &Action,
        target_type: &EntityType,
        scope: Option<&str>,
    ) -> Result<ScopeRuleSet, ConfigError>;
}

#[cfg(test)]
mod tests;
