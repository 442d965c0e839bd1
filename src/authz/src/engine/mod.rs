//! Authorisation decision engine
//!
//! Combines the domain graph and the scope rules to find the user's roles that
//! grant an action on a target entity.
//!
//! # Pipeline
//!
//! ```text
//! target ─▶ reachable scopes ─▶ rule set per scope (or default rules)
//!    │                                      │
//!    └──▶ user's roles on ancestor chain ───┴─▶ granting roles
//! ```

pub mod decision;
pub mod metrics;

pub use decision::{AuthorisationDecision, GrantingRole};
pub use metrics::{EngineMetrics, MetricsCollector};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{AuthzError, Result};
use crate::graph::DomainGraph;
use crate::rules::{ScopeRuleResolver, ScopeRuleSet};
use crate::types::{Action, Entity, Role, User};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

/// Stateless authorisation engine
///
/// Each call reads the graph and rules it is given and keeps nothing between
/// calls apart from metrics, so one engine can serve any number of threads.
pub struct AuthorisationEngine {
    graph: Arc<dyn DomainGraph>,
    rules: Arc<dyn ScopeRuleResolver>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AuthorisationEngine {
    /// Create an engine with the default configuration
    pub fn new(graph: Arc<dyn DomainGraph>, rules: Arc<dyn ScopeRuleResolver>) -> Self {
        Self::with_config(graph, rules, EngineConfig::default())
    }

    pub fn with_config(
        graph: Arc<dyn DomainGraph>,
        rules: Arc<dyn ScopeRuleResolver>,
        config: EngineConfig,
    ) -> Self {
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        Self {
            graph,
            rules,
            metrics,
        }
    }

    /// Roles of `user` that grant `action` on `target`
    ///
    /// An empty result means the action is not authorised; it is not an
    /// error. The action name is trimmed before matching.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Validation`] for a blank action or user id
    /// - [`AuthzError::Graph`] for an unknown or malformed target
    /// - [`AuthzError::Config`] when a reachable scope has no rule mapping
    pub fn authorise_action(&self, action: &str, target: &Entity, user: &User) -> Result<Vec<Role>> {
        self.decide(action, target, user).map(AuthorisationDecision::into_roles)
    }

    /// Like [`authorise_action`](Self::authorise_action), but also reports the
    /// scopes consulted and the rule behind each granting role
    pub fn decide(&self, action: &str, target: &Entity, user: &User) -> Result<AuthorisationDecision> {
        let start = Instant::now();
        let result = self.evaluate(action, target, user);

        if let Err(e) = &result {
            debug!("Authorisation request failed ({}): {}", e.kind(), e);
        }

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(decision) => metrics.record_decision(decision.is_authorised(), start.elapsed()),
                Err(e) => metrics.record_error(e, start.elapsed()),
            }
        }

        result
    }

    /// Get engine metrics
    pub fn get_metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(|metrics| metrics.get_metrics())
    }

    fn evaluate(&self, action: &str, target: &Entity, user: &User) -> Result<AuthorisationDecision> {
        let action = Action::parse(action)?;
        if user.id.as_str().trim().is_empty() {
            return Err(AuthzError::Validation("User id cannot be empty".to_string()));
        }

        debug!(
            "Authorisation request: user={}, target={}, action={}",
            user.id, target, action
        );

        // Step 1: scopes above the target
        let scopes = self.graph.reachable_scopes_ascending(target)?;

        // Step 2: rule sets, per scope or the default rules
        let mut required: Vec<(Option<String>, ScopeRuleSet)> = Vec::new();
        if scopes.is_empty() {
            let rules = self.lookup(&action, target, None)?;
            required.push((None, rules));
        } else {
            for scope in &scopes {
                let rules = self.lookup(&action, target, Some(&scope.name))?;
                if !rules.is_empty() {
                    required.push((Some(scope.name.clone()), rules));
                }
            }
        }

        // Step 3: the user's roles on the target's ancestor chain
        let candidates = self.graph.user_roles_reachable_ascending(user, target)?;

        // Step 4: a candidate grants when any rule set requires its type over
        // its entity's type
        let mut seen: HashSet<Role> = HashSet::new();
        let mut grants = Vec::new();
        for role in candidates {
            let matched = required.iter().find_map(|(scope, rules)| {
                rules
                    .granting_type(&role)
                    .map(|required_type| (scope.clone(), required_type.clone()))
            });

            if let Some((scope, required_type)) = matched {
                if seen.insert(role.clone()) {
                    grants.push(GrantingRole {
                        role,
                        scope,
                        required_type,
                    });
                }
            }
        }

        debug!(
            "Decision: {} granting role(s) for user={}, target={}, action={}",
            grants.len(),
            user.id,
            target.id,
            action
        );

        Ok(AuthorisationDecision {
            action,
            target: target.id.clone(),
            scopes: scopes.into_iter().map(|scope| scope.name).collect(),
            grants,
        })
    }

    fn lookup(&self, action: &Action, target: &Entity, scope: Option<&str>) -> Result<ScopeRuleSet> {
        self.rules
            .required_role_types(action, &target.entity_type, scope)
            .map_err(|e| {
                warn!(
                    "Rule configuration out of sync with domain graph (target={}, scope={:?}): {}",
                    target.id, scope, e
                );
                AuthzError::Config(e)
            })
    }
}
