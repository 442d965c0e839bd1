//! Domain graph access
//!
//! The ownership hierarchy is a DAG: every entity may have zero, one or many
//! parents. Persistence backends implement the three primitive lookups of
//! [`DomainGraph`]; the ascending traversals built on them are provided by the
//! trait so every backend gets the same guarantees:
//!
//! - traversal only ever follows parent edges (never children or siblings)
//! - every entity is visited at most once, so diamonds are walked once and a
//!   corrupt cyclic graph still terminates
//! - only [`RoleStatus::Granted`](crate::types::RoleStatus) roles are returned

mod memory;

pub use memory::{GraphSnapshot, InMemoryDomainGraph, SnapshotEntity, SnapshotRole};

use std::collections::{HashSet, VecDeque};
use thiserror::Error;

use crate::types::{Entity, EntityId, EntityType, Role, User, UserId};

/// Graph-related errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Entity reference is malformed
    #[error("Invalid entity reference: {0}")]
    InvalidEntity(String),

    /// Entity is not part of the graph
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Entity exists but with a different type than the caller claimed
    #[error("Entity {id} has type '{found}', not '{expected}'")]
    EntityTypeMismatch {
        id: EntityId,
        expected: String,
        found: String,
    },

    /// A parent edge points at an entity the graph does not hold
    #[error("Entity {child} references missing parent {parent}")]
    DanglingParent { child: EntityId, parent: EntityId },

    /// Entity id is already present
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    /// Entity cannot own itself
    #[error("Entity {0} cannot be its own parent")]
    SelfParent(EntityId),

    /// Adding the edge would make the ownership graph cyclic
    #[error("Cycle detected: {parent} is already a descendant of {child}")]
    CycleDetected { child: EntityId, parent: EntityId },
}

/// Read-only view over the ownership hierarchy and the roles held on it
pub trait DomainGraph: Send + Sync {
    /// Look up an entity by id
    fn entity(&self, id: &EntityId) -> Option<Entity>;

    /// Direct parents (owners) of an entity
    fn parents(&self, id: &EntityId) -> Vec<EntityId>;

    /// Roles `user` holds directly over `entity`, in any status
    fn roles_held_over(&self, user: &UserId, entity: &EntityId) -> Vec<Role>;

    /// Entity type that bounds rule sets
    fn scope_type(&self) -> EntityType {
        EntityType::project()
    }

    /// Validate a caller supplied entity against the graph
    fn resolve(&self, entity: &Entity) -> Result<Entity, GraphError> {
        if entity.id.as_str().trim().is_empty() {
            return Err(GraphError::InvalidEntity("entity id is empty".to_string()));
        }

        let stored = self
            .entity(&entity.id)
            .ok_or_else(|| GraphError::UnknownEntity(entity.id.clone()))?;

        if !stored.entity_type.matches(entity.entity_type.as_str()) {
            return Err(GraphError::EntityTypeMismatch {
                id: entity.id.clone(),
                expected: entity.entity_type.to_string(),
                found: stored.entity_type.to_string(),
            });
        }

        Ok(stored)
    }

    /// `entity` followed by every ancestor reachable through parent edges,
    /// breadth first
    fn ancestors_inclusive(&self, entity: &Entity) -> Result<Vec<Entity>, GraphError> {
        let start = self.resolve(entity)?;

        let mut visited: HashSet<EntityId> = HashSet::new();
        visited.insert(start.id.clone());

        let mut queue = VecDeque::new();
        queue.push_back(start.id.clone());

        let mut chain = vec![start];

        while let Some(current) = queue.pop_front() {
            for parent_id in self.parents(&current) {
                if !visited.insert(parent_id.clone()) {
                    continue;
                }

                let parent = self.entity(&parent_id).ok_or_else(|| GraphError::DanglingParent {
                    child: current.clone(),
                    parent: parent_id.clone(),
                })?;

                queue.push_back(parent_id);
                chain.push(parent);
            }
        }

        Ok(chain)
    }

    /// Scope entities on the ancestor chain(s) of `entity`, including
    /// `entity` itself when it is a scope. Empty is a normal outcome.
    fn reachable_scopes_ascending(&self, entity: &Entity) -> Result<Vec<Entity>, GraphError> {
        let scope_type = self.scope_type();

        Ok(self
            .ancestors_inclusive(entity)?
            .into_iter()
            .filter(|candidate| candidate.is_of_type(&scope_type))
            .collect())
    }

    /// Granted roles `user` holds over `entity` or any of its ancestors.
    ///
    /// Roles over siblings or descendants are never returned.
    fn user_roles_reachable_ascending(&self, user: &User, entity: &Entity) -> Result<Vec<Role>, GraphError> {
        let mut seen: HashSet<Role> = HashSet::new();
        let mut roles = Vec::new();

        for ancestor in self.ancestors_inclusive(entity)? {
            for role in self.roles_held_over(&user.id, &ancestor.id) {
                if role.is_granted() && seen.insert(role.clone()) {
                    roles.push(role);
                }
            }
        }

        Ok(roles)
    }
}
