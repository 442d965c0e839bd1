//! Role action mapping configuration and load-time validation

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use super::{ConfigError, ScopeRuleSet};
use crate::error::Result;
use crate::types::{Action, EntityType};

/// Current rule configuration format version
pub const RULE_CONFIG_VERSION: u32 = 1;

const DEFAULT_SCOPE_LABEL: &str = "<default>";

fn default_version() -> u32 {
    RULE_CONFIG_VERSION
}

fn default_entity_types() -> Vec<String> {
    [
        EntityType::SITE,
        EntityType::NGI,
        EntityType::PROJECT,
        EntityType::SERVICE_GROUP,
        EntityType::SERVICE,
    ]
    .iter()
    .map(|tag| tag.to_string())
    .collect()
}

fn default_role_types() -> Vec<String> {
    [
        "Site Administrator",
        "Site Security Officer",
        "Site Operations Manager",
        "Site Operations Deputy Manager",
        "NGI Operations Manager",
        "NGI Operations Deputy Manager",
        "NGI Security Officer",
        "Regional First Line Support",
        "Regional Staff (ROD)",
        "Chief Operations Officer",
        "COD Staff",
        "COD Administrator",
        "EGI CSIRT Officer",
        "Service Group Administrator",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Rule configuration as written on disk (TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Known entity type tags
    #[serde(default = "default_entity_types")]
    pub entity_types: Vec<String>,

    /// Known role type names
    #[serde(default = "default_role_types")]
    pub role_types: Vec<String>,

    #[serde(default, rename = "mapping")]
    pub mappings: Vec<RoleActionMapping>,
}

/// Rules applying to a set of projects, or the default rules when
/// `projects` is empty
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleActionMapping {
    #[serde(default)]
    pub projects: Vec<String>,

    #[serde(default, rename = "rule")]
    pub rules: Vec<RoleActionRule>,
}

/// Any of `roles` held over an `over` entity enables `actions` on `targets`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleActionRule {
    pub roles: Vec<String>,
    pub over: String,
    pub actions: Vec<String>,
    pub targets: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            version: RULE_CONFIG_VERSION,
            entity_types: default_entity_types(),
            role_types: default_role_types(),
            mappings: Vec::new(),
        }
    }
}

impl RuleConfig {
    /// Parse a TOML rule configuration
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a TOML rule configuration from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Validate without keeping the compiled form
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    pub(crate) fn compile(&self) -> std::result::Result<CompiledRules, ConfigError> {
        if self.version != RULE_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        let registry = TypeRegistry::new(self.version, &self.entity_types, &self.role_types)?;

        let mut default_rules: Option<Vec<CompiledRule>> = None;
        let mut scopes: HashMap<String, Vec<CompiledRule>> = HashMap::new();
        let mut scope_names: HashMap<String, String> = HashMap::new();

        for mapping in &self.mappings {
            let mut compiled = Vec::with_capacity(mapping.rules.len());
            for rule in &mapping.rules {
                compiled.push(CompiledRule::compile(rule, &registry)?);
            }

            if mapping.projects.is_empty() {
                if default_rules.is_some() {
                    return Err(ConfigError::DuplicateScope(DEFAULT_SCOPE_LABEL.to_string()));
                }
                check_role_bindings(DEFAULT_SCOPE_LABEL, &compiled)?;
                default_rules = Some(compiled);
                continue;
            }

            for project in &mapping.projects {
                let name = project.trim();
                if name.is_empty() {
                    return Err(ConfigError::InvalidRule("project name cannot be empty".to_string()));
                }

                let key = name.to_uppercase();
                if scopes.contains_key(&key) {
                    return Err(ConfigError::DuplicateScope(name.to_string()));
                }

                check_role_bindings(name, &compiled)?;
                scopes.insert(key.clone(), compiled.clone());
                scope_names.insert(key, name.to_string());
            }
        }

        Ok(CompiledRules {
            registry,
            default_rules: default_rules.unwrap_or_default(),
            scopes,
            scope_names,
        })
    }
}

/// Known entity type tags and role type names for one configuration version
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    version: u32,
    /// Canonical (uppercased) tag → declared tag
    entity_types: HashMap<String, EntityType>,
    role_types: HashSet<String>,
}

impl TypeRegistry {
    pub fn new(
        version: u32,
        entity_types: &[String],
        role_types: &[String],
    ) -> std::result::Result<Self, ConfigError> {
        let mut registry = Self {
            version,
            entity_types: HashMap::new(),
            role_types: HashSet::new(),
        };

        for tag in entity_types {
            let tag = tag.trim();
            if tag.is_empty() {
                return Err(ConfigError::InvalidRule("entity type tag cannot be empty".to_string()));
            }
            let tag = EntityType::new(tag);
            registry.entity_types.insert(tag.canonical(), tag);
        }

        for name in role_types {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidRule("role type name cannot be empty".to_string()));
            }
            registry.role_types.insert(name.to_string());
        }

        Ok(registry)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Declared tag for `tag`, matched case-insensitively
    pub fn entity_type(&self, tag: &str, context: &str) -> std::result::Result<EntityType, ConfigError> {
        self.entity_types
            .get(&tag.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEntityType {
                tag: tag.to_string(),
                context: context.to_string(),
            })
    }

    /// Role type names are matched exactly
    pub fn has_role_type(&self, name: &str) -> bool {
        self.role_types.contains(name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    roles: Vec<String>,
    over: EntityType,
    actions: HashSet<String>,
    /// Canonical target tags
    targets: HashSet<String>,
}

impl CompiledRule {
    fn compile(rule: &RoleActionRule, registry: &TypeRegistry) -> std::result::Result<Self, ConfigError> {
        if rule.roles.is_empty() {
            return Err(ConfigError::InvalidRule("rule must name at least one role".to_string()));
        }
        if rule.actions.is_empty() {
            return Err(ConfigError::InvalidRule("rule must enable at least one action".to_string()));
        }
        if rule.targets.is_empty() {
            return Err(ConfigError::InvalidRule("rule must name at least one target".to_string()));
        }

        let mut roles = Vec::with_capacity(rule.roles.len());
        for role in &rule.roles {
            let role = role.trim();
            if !registry.has_role_type(role) {
                return Err(ConfigError::UnknownRoleType(role.to_string()));
            }
            roles.push(role.to_string());
        }

        let over = registry.entity_type(&rule.over, "rule 'over'")?;

        let mut actions = HashSet::with_capacity(rule.actions.len());
        for action in &rule.actions {
            let action = Action::parse(action)
                .map_err(|_| ConfigError::InvalidRule("action name cannot be empty".to_string()))?;
            actions.insert(action.as_str().to_string());
        }

        let mut targets = HashSet::with_capacity(rule.targets.len());
        for target in &rule.targets {
            targets.insert(registry.entity_type(target, "rule 'targets'")?.canonical());
        }

        Ok(Self {
            roles,
            over,
            actions,
            targets,
        })
    }

    fn enables(&self, action: &Action, target_canonical: &str) -> bool {
        self.actions.contains(action.as_str()) && self.targets.contains(target_canonical)
    }
}

/// A role type name may only be bound to one `over` type within a scope
fn check_role_bindings(scope: &str, rules: &[CompiledRule]) -> std::result::Result<(), ConfigError> {
    let mut bound: HashMap<&str, &EntityType> = HashMap::new();

    for rule in rules {
        for role in &rule.roles {
            match bound.get(role.as_str()) {
                Some(existing) if existing.canonical() != rule.over.canonical() => {
                    return Err(ConfigError::ConflictingRoleMapping {
                        scope: scope.to_string(),
                        role_type: role.clone(),
                        first: existing.to_string(),
                        second: rule.over.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    bound.insert(role.as_str(), &rule.over);
                }
            }
        }
    }

    Ok(())
}

/// Validated, lookup-ready rules
#[derive(Debug, Clone)]
pub(crate) struct CompiledRules {
    registry: TypeRegistry,
    default_rules: Vec<CompiledRule>,
    /// Keyed by uppercased project name
    scopes: HashMap<String, Vec<CompiledRule>>,
    scope_names: HashMap<String, String>,
}

impl CompiledRules {
    pub(crate) fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scope_names.values().cloned().collect();
        names.sort();
        names
    }

    /// Unknown scopes are errors; an unregistered target type only means no
    /// rule can name it, so the result is empty
    pub(crate) fn lookup(
        &self,
        action: &Action,
        target_type: &EntityType,
        scope: Option<&str>,
    ) -> std::result::Result<ScopeRuleSet, ConfigError> {
        let rules = match scope {
            None => &self.default_rules,
            Some(name) => self
                .scopes
                .get(&name.trim().to_uppercase())
                .ok_or_else(|| ConfigError::UnknownScope(name.to_string()))?,
        };

        let target = match self.registry.entity_type(target_type.as_str(), "target entity") {
            Ok(registered) => registered.canonical(),
            Err(_) => {
                debug!(
                    "Target type '{}' is not registered; no rule applies (scope={:?})",
                    target_type, scope
                );
                return Ok(ScopeRuleSet::new());
            }
        };

        let mut required = ScopeRuleSet::new();
        for rule in rules.iter().filter(|rule| rule.enables(action, &target)) {
            for role in &rule.roles {
                required.insert(role.clone(), rule.over.clone());
            }
        }

        Ok(required)
    }
}
