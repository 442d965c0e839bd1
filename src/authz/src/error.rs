//! Error types for the authorization engine

use thiserror::Error;

use crate::graph::GraphError;
use crate::rules::ConfigError;

/// Authorization engine errors
///
/// Access denial is never an error: a request that no role grants returns an
/// empty granting-role set.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Caller supplied an invalid argument (e.g. a blank action name)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rule configuration is inconsistent with the domain graph or itself
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or unknown entity reference
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration or snapshot file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Short, stable label used in metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Graph(_) => "graph",
            Self::Parse(_) => "parse",
            Self::Io(_) => "io",
        }
    }
}

impl From<toml::de::Error> for AuthzError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
