//! # Role Action Authorization Engine
//!
//! Decides which of a user's roles grant an action on an entity in a
//! multi-parent ownership hierarchy.
//!
//! ## Features
//!
//! - **Ascending traversal** of the ownership DAG: scopes and roles are only
//!   ever collected from the target and its ancestors, never from siblings
//! - **Per-scope rules** loaded from a validated, versioned TOML configuration
//! - **Atomic rule reloads** with a per-generation lookup cache
//! - **Explained decisions** naming the scope and rule behind each grant
//!
//! ## Example
//!
//! ```rust
//! use roleaction_authz::{
//!     AuthorisationEngine, Entity, EntityId, InMemoryDomainGraph, Role, RuleConfig,
//!     RuleConfigResolver, User,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = InMemoryDomainGraph::new();
//! graph.add_entity(Entity::new("p1", "Project", "EGI"))?;
//! graph.add_entity(Entity::new("s1", "Site", "RAL-LCG2"))?;
//! graph.add_parent(&EntityId::new("s1"), &EntityId::new("p1"))?;
//!
//! let alice = User::new("alice");
//! let site = Entity::new("s1", "Site", "RAL-LCG2");
//! graph.add_role(Role::new(&alice, "Site Administrator", &site))?;
//!
//! let rules = RuleConfig::from_toml(r#"
//!     [[mapping]]
//!     projects = ["EGI"]
//!
//!     [[mapping.rule]]
//!     roles = ["Site Administrator"]
//!     over = "Site"
//!     actions = ["EDIT_OBJECT"]
//!     targets = ["Site"]
//! "#)?;
//!
//! let engine = AuthorisationEngine::new(
//!     Arc::new(graph),
//!     Arc::new(RuleConfigResolver::new(&rules)?),
//! );
//!
//! let granting = engine.authorise_action("EDIT_OBJECT", &site, &alice)?;
//! assert_eq!(granting.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod rules;
pub mod types;

// Re-export commonly used types
pub use config::AuthzConfig;
pub use engine::{AuthorisationDecision, AuthorisationEngine, EngineConfig, GrantingRole};
pub use error::{AuthzError, Result};
pub use graph::{DomainGraph, GraphError, GraphSnapshot, InMemoryDomainGraph};
pub use rules::{ConfigError, RuleConfig, RuleConfigResolver, ScopeRuleResolver, ScopeRuleSet};
pub use types::{Action, Entity, EntityId, EntityType, Role, RoleStatus, RoleType, User, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
