//! Service configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::EngineConfig;
use crate::error::{AuthzError, Result};
use crate::types::EntityType;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete authorization service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub rules: RulesSection,

    #[serde(default)]
    pub graph: GraphSection,

    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RulesSection {
    /// Role action mapping file (TOML)
    #[serde(default = "default_rules_path")]
    pub path: PathBuf,

    /// Cache rule lookups per configuration generation
    #[serde(default = "default_true")]
    pub cache: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphSection {
    /// Domain graph snapshot (JSON)
    #[serde(default = "default_graph_path")]
    pub path: PathBuf,

    /// Entity type that bounds rule sets
    #[serde(default = "default_scope_type")]
    pub scope_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool { true }
fn default_rules_path() -> PathBuf { PathBuf::from("role_action_mappings.toml") }
fn default_graph_path() -> PathBuf { PathBuf::from("domain_graph.json") }
fn default_scope_type() -> String { EntityType::PROJECT.to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for RulesSection {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
            cache: true,
        }
    }
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            path: default_graph_path(),
            scope_type: default_scope_type(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_level: default_log_level(),
        }
    }
}

impl AuthzConfig {
    /// Parse configuration from TOML
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    ///
    /// Relative `rules.path` and `graph.path` are resolved against the
    /// directory holding the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;

        if let Some(base) = path.parent() {
            config.rules.path = resolve(base, &config.rules.path);
            config.graph.path = resolve(base, &config.graph.path);
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rules.path.as_os_str().is_empty() {
            return Err(AuthzError::Validation("rules.path cannot be empty".to_string()));
        }

        if self.graph.path.as_os_str().is_empty() {
            return Err(AuthzError::Validation("graph.path cannot be empty".to_string()));
        }

        if self.graph.scope_type.trim().is_empty() {
            return Err(AuthzError::Validation("graph.scope_type cannot be empty".to_string()));
        }

        if !LOG_LEVELS.contains(&self.engine.log_level.to_lowercase().as_str()) {
            return Err(AuthzError::Validation(format!(
                "engine.log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.engine.log_level
            )));
        }

        Ok(())
    }

    /// In-process engine settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            enable_metrics: self.engine.enable_metrics,
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
