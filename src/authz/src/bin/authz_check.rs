//! # Authorization Check CLI
//!
//! Loads a domain graph snapshot and role action mappings and answers
//! authorization questions against them.
//!
//! ## Commands
//!
//! - `check` - Roles of a user that grant an action on an entity
//! - `scopes` - Scopes reachable upward from an entity
//! - `roles` - A user's granted roles on an entity's ancestor chain
//! - `validate` - Load and validate the rule configuration
//!
//! ## Configuration
//!
//! - `AUTHZ_CONFIG` - Configuration file (default: authz.toml)
//! - `RUST_LOG` - Log filter (default: `engine.log_level` from the config)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roleaction_authz::{
    AuthorisationEngine, AuthzConfig, DomainGraph, Entity, EntityId, GraphSnapshot,
    InMemoryDomainGraph, RuleConfig, RuleConfigResolver, User,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Role action authorization checker
#[derive(Parser)]
#[command(name = "authz-check")]
#[command(about = "Evaluate role action authorization against a domain graph")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "authz.toml", env = "AUTHZ_CONFIG")]
    config: PathBuf,

    /// Override the rule configuration file
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Override the domain graph snapshot
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Which of the user's roles grant the action on the entity
    Check {
        #[arg(short, long)]
        user: String,

        /// Target entity id
        #[arg(short, long)]
        entity: String,

        #[arg(short, long)]
        action: String,
    },

    /// Scopes reachable upward from an entity
    Scopes {
        #[arg(short, long)]
        entity: String,
    },

    /// The user's granted roles on the entity and its ancestors
    Roles {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        entity: String,
    },

    /// Validate the rule configuration
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        AuthzConfig::load(&cli.config)
            .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?
    } else {
        AuthzConfig::default()
    };
    if let Some(rules) = cli.rules {
        config.rules.path = rules;
    }
    if let Some(graph) = cli.graph {
        config.graph.path = graph;
    }
    config.validate().context("Invalid configuration")?;

    let log_level = if cli.verbose { "debug".to_string() } else { config.engine.log_level.clone() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!("authz-check v{}", roleaction_authz::VERSION);

    if let Command::Validate = cli.command {
        let rules = RuleConfig::load(&config.rules.path)
            .with_context(|| format!("Failed to read rules {}", config.rules.path.display()))?;
        rules.validate().context("Rule configuration is invalid")?;
        let resolver = RuleConfigResolver::new(&rules)?;
        print_json(&json!({
            "valid": true,
            "version": resolver.config_version(),
            "scopes": resolver.known_scopes(),
        }))?;
        return Ok(());
    }

    let graph = Arc::new(load_graph(&config)?);

    match cli.command {
        Command::Check { user, entity, action } => {
            let resolver = RuleConfigResolver::load(&config.rules.path, config.rules.cache)
                .with_context(|| format!("Failed to load rules {}", config.rules.path.display()))?;
            let engine = AuthorisationEngine::with_config(
                graph.clone(),
                Arc::new(resolver),
                config.engine_config(),
            );

            let target = lookup_entity(graph.as_ref(), &entity)?;
            let decision = engine.decide(&action, &target, &User::new(user))?;
            print_json(&json!({
                "authorised": decision.is_authorised(),
                "decision": decision,
            }))?;
        }
        Command::Scopes { entity } => {
            let target = lookup_entity(graph.as_ref(), &entity)?;
            let scopes = graph.reachable_scopes_ascending(&target)?;
            print_json(&json!({ "entity": target, "scopes": scopes }))?;
        }
        Command::Roles { user, entity } => {
            let target = lookup_entity(graph.as_ref(), &entity)?;
            let roles = graph.user_roles_reachable_ascending(&User::new(user), &target)?;
            print_json(&json!({ "entity": target, "roles": roles }))?;
        }
        Command::Validate => {}
    }

    Ok(())
}

fn load_graph(config: &AuthzConfig) -> Result<InMemoryDomainGraph> {
    let mut snapshot = GraphSnapshot::load(&config.graph.path)
        .with_context(|| format!("Failed to read graph {}", config.graph.path.display()))?;
    snapshot.scope_type = config.graph.scope_type.clone();

    let graph = InMemoryDomainGraph::from_snapshot(snapshot).context("Invalid domain graph")?;
    info!("Domain graph loaded: {} entities", graph.len());
    Ok(graph)
}

fn lookup_entity(graph: &InMemoryDomainGraph, id: &str) -> Result<Entity> {
    graph
        .entity(&EntityId::new(id))
        .with_context(|| format!("Unknown entity '{}'", id))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
