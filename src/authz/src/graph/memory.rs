//! In-memory domain graph

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tracing::debug;

use super::{DomainGraph, GraphError};
use crate::error::Result;
use crate::types::{Entity, EntityId, EntityType, Role, RoleStatus, RoleType, UserId};

#[derive(Debug, Clone)]
struct Node {
    entity: Entity,
    parents: Vec<EntityId>,
}

/// Ownership hierarchy and role assignments held in memory
///
/// Edges are checked on insertion, so the graph is always acyclic.
#[derive(Debug, Clone)]
pub struct InMemoryDomainGraph {
    scope_type: EntityType,
    nodes: HashMap<EntityId, Node>,
    roles: HashMap<(UserId, EntityId), Vec<Role>>,
}

impl InMemoryDomainGraph {
    /// Create an empty graph scoped by `Project` entities
    pub fn new() -> Self {
        Self::with_scope_type(EntityType::project())
    }

    /// Create an empty graph with a custom scope type
    pub fn with_scope_type(scope_type: EntityType) -> Self {
        Self {
            scope_type,
            nodes: HashMap::new(),
            roles: HashMap::new(),
        }
    }

    /// Add an entity with no parents
    pub fn add_entity(&mut self, entity: Entity) -> std::result::Result<(), GraphError> {
        if entity.id.as_str().trim().is_empty() {
            return Err(GraphError::InvalidEntity("entity id is empty".to_string()));
        }
        if self.nodes.contains_key(&entity.id) {
            return Err(GraphError::DuplicateEntity(entity.id));
        }

        self.nodes.insert(
            entity.id.clone(),
            Node {
                entity,
                parents: Vec::new(),
            },
        );
        Ok(())
    }

    /// Record that `parent` owns `child`
    ///
    /// # Errors
    ///
    /// Fails if either endpoint is unknown, if `child == parent`, or if
    /// `child` is already an ancestor of `parent`.
    pub fn add_parent(&mut self, child: &EntityId, parent: &EntityId) -> std::result::Result<(), GraphError> {
        if child == parent {
            return Err(GraphError::SelfParent(child.clone()));
        }
        if !self.nodes.contains_key(parent) {
            return Err(GraphError::UnknownEntity(parent.clone()));
        }
        if !self.nodes.contains_key(child) {
            return Err(GraphError::UnknownEntity(child.clone()));
        }
        if self.ascends_to(parent, child) {
            return Err(GraphError::CycleDetected {
                child: child.clone(),
                parent: parent.clone(),
            });
        }

        if let Some(node) = self.nodes.get_mut(child) {
            if !node.parents.contains(parent) {
                node.parents.push(parent.clone());
            }
        }
        Ok(())
    }

    /// Assign a role; re-adding a role with the same identity replaces it
    pub fn add_role(&mut self, role: Role) -> std::result::Result<(), GraphError> {
        let stored = self
            .nodes
            .get(&role.owned_entity.id)
            .map(|node| node.entity.clone())
            .ok_or_else(|| GraphError::UnknownEntity(role.owned_entity.id.clone()))?;

        if !stored.entity_type.matches(role.owned_entity.entity_type.as_str()) {
            return Err(GraphError::EntityTypeMismatch {
                id: stored.id.clone(),
                expected: role.owned_entity.entity_type.to_string(),
                found: stored.entity_type.to_string(),
            });
        }

        let role = Role {
            owned_entity: stored,
            ..role
        };
        let held = self
            .roles
            .entry((role.user.clone(), role.owned_entity.id.clone()))
            .or_default();

        match held.iter().position(|existing| *existing == role) {
            Some(index) => held[index] = role,
            None => held.push(role),
        }
        Ok(())
    }

    /// Number of entities in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build a graph from a snapshot; entities first, then edges, then roles
    pub fn from_snapshot(snapshot: GraphSnapshot) -> std::result::Result<Self, GraphError> {
        let mut graph = Self::with_scope_type(EntityType::new(snapshot.scope_type));

        for entity in &snapshot.entities {
            graph.add_entity(Entity::new(
                entity.id.clone(),
                entity.entity_type.clone(),
                entity.name.clone().unwrap_or_else(|| entity.id.clone()),
            ))?;
        }

        for entity in &snapshot.entities {
            let child = EntityId::new(entity.id.clone());
            for parent in &entity.parents {
                graph.add_parent(&child, &EntityId::new(parent.clone()))?;
            }
        }

        for role in snapshot.roles {
            let owned_entity = graph
                .entity(&EntityId::new(role.entity.clone()))
                .ok_or_else(|| GraphError::UnknownEntity(EntityId::new(role.entity.clone())))?;

            graph.add_role(Role {
                user: UserId::new(role.user),
                role_type: RoleType::new(role.role_type),
                owned_entity,
                status: role.status,
            })?;
        }

        debug!(
            "Loaded domain graph: {} entities, {} role holders",
            graph.nodes.len(),
            graph.roles.len()
        );

        Ok(graph)
    }

    /// Parse a JSON snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot)?)
    }

    /// Whether `target` is `from` or one of its ancestors
    fn ascends_to(&self, from: &EntityId, target: &EntityId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from.clone()]);

        while let Some(current) = queue.pop_front() {
            if &current == target {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.parents.iter().cloned());
            }
        }

        false
    }
}

impl Default for InMemoryDomainGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainGraph for InMemoryDomainGraph {
    fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.nodes.get(id).map(|node| node.entity.clone())
    }

    fn parents(&self, id: &EntityId) -> Vec<EntityId> {
        self.nodes
            .get(id)
            .map(|node| node.parents.clone())
            .unwrap_or_default()
    }

    fn roles_held_over(&self, user: &UserId, entity: &EntityId) -> Vec<Role> {
        self.roles
            .get(&(user.clone(), entity.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn scope_type(&self) -> EntityType {
        self.scope_type.clone()
    }
}

fn default_scope_type() -> String {
    EntityType::PROJECT.to_string()
}

/// Serializable form of a domain graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default = "default_scope_type")]
    pub scope_type: String,

    #[serde(default)]
    pub entities: Vec<SnapshotEntity>,

    #[serde(default)]
    pub roles: Vec<SnapshotRole>,
}

impl GraphSnapshot {
    /// Read a JSON snapshot from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub id: String,

    #[serde(rename = "type")]
    pub entity_type: String,

    /// Defaults to the id
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRole {
    pub user: String,
    pub role_type: String,
    /// Id of the owned entity
    pub entity: String,
    #[serde(default)]
    pub status: RoleStatus,
}
