//! Core domain types: entities, users, roles and actions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{AuthzError, Result};

/// Unique entity identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Unique user identifier (e.g. a certificate DN or account name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Entity type tag (Site, Ngi, Project, ServiceGroup, ...)
///
/// Tags keep the casing they were created with, but two tags name the same
/// type when they are equal after uppercasing. Use [`EntityType::matches`]
/// rather than `==` when comparing tags from different sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub const SITE: &'static str = "Site";
    pub const NGI: &'static str = "Ngi";
    pub const PROJECT: &'static str = "Project";
    pub const SERVICE_GROUP: &'static str = "ServiceGroup";
    pub const SERVICE: &'static str = "Service";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The distinguished scope type
    pub fn project() -> Self {
        Self::new(Self::PROJECT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical (uppercased) form used for lookups
    pub fn canonical(&self) -> String {
        self.0.to_uppercase()
    }

    /// Case-insensitive comparison against another tag
    pub fn matches(&self, other: &str) -> bool {
        self.0.to_uppercase() == other.to_uppercase()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node in the ownership hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Human readable name; scope lookups use the name of scope entities
    pub name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            entity_type: EntityType::new(entity_type),
            name: name.into(),
        }
    }

    pub fn is_of_type(&self, tag: &EntityType) -> bool {
        self.entity_type.matches(tag.as_str())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.entity_type, self.name, self.id)
    }
}

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: UserId::new(id) }
    }
}

/// Named role category, not user specific
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleType {
    pub name: String,
}

impl RoleType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lifecycle state of a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleStatus {
    /// Role has been approved and is in force
    #[default]
    Granted,
    /// Role has been requested but not yet approved
    Pending,
}

/// A user holding a role type over a specific entity
///
/// Identity is (user, role type name, owned entity id); `status` does not
/// participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub user: UserId,
    pub role_type: RoleType,
    pub owned_entity: Entity,
    #[serde(default)]
    pub status: RoleStatus,
}

impl Role {
    pub fn new(user: &User, role_type: impl Into<String>, owned_entity: &Entity) -> Self {
        Self {
            user: user.id.clone(),
            role_type: RoleType::new(role_type),
            owned_entity: owned_entity.clone(),
            status: RoleStatus::Granted,
        }
    }

    pub fn with_status(mut self, status: RoleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_granted(&self) -> bool {
        self.status == RoleStatus::Granted
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user
            && self.role_type == other.role_type
            && self.owned_entity.id == other.owned_entity.id
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.user.hash(state);
        self.role_type.hash(state);
        self.owned_entity.id.hash(state);
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {}", self.role_type.name, self.owned_entity)
    }
}

/// Operation a user wants to perform, trimmed and guaranteed non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    /// Parse an action name, trimming surrounding whitespace
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AuthzError::Validation(
                "Action name cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
