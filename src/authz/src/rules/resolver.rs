//! Reloadable rule resolver with a per-generation lookup cache
//!
//! Each loaded configuration becomes an immutable snapshot carrying its own
//! cache. Readers load the current `Arc` without locking and work against it
//! for the whole lookup; a reload builds the next snapshot off to the side and
//! stores it atomically. A reader therefore sees either the old or the new
//! rules, never a mix, and a cache entry can never outlive its generation.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{CompiledRules, RuleConfig};
use super::{ConfigError, ScopeRuleResolver, ScopeRuleSet};
use crate::error::Result;
use crate::types::{Action, EntityType};

/// Statistics about rule cache performance for the current generation
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of cached lookups
    pub entries: usize,
    /// Configuration generation the statistics belong to
    pub generation: u64,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    action: String,
    /// Canonical target tag
    target: String,
    /// Uppercased scope name, `None` for the default rules
    scope: Option<String>,
}

impl CacheKey {
    fn new(action: &Action, target_type: &EntityType, scope: Option<&str>) -> Self {
        Self {
            action: action.as_str().to_string(),
            target: target_type.canonical(),
            scope: scope.map(|name| name.trim().to_uppercase()),
        }
    }
}

struct RuleSnapshot {
    generation: u64,
    rules: CompiledRules,
    cache: DashMap<CacheKey, ScopeRuleSet>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl RuleSnapshot {
    fn new(generation: u64, rules: CompiledRules) -> Self {
        Self {
            generation,
            rules,
            cache: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

/// [`ScopeRuleResolver`] backed by a [`RuleConfig`]
pub struct RuleConfigResolver {
    current: ArcSwap<RuleSnapshot>,
    /// Serialises reloads so generations stay consecutive
    reload_lock: Mutex<()>,
    cache_enabled: bool,
}

impl RuleConfigResolver {
    /// Compile `config` into generation 1 with caching enabled
    pub fn new(config: &RuleConfig) -> std::result::Result<Self, ConfigError> {
        Self::with_cache(config, true)
    }

    /// Compile `config`, optionally disabling the lookup cache
    pub fn with_cache(config: &RuleConfig, cache_enabled: bool) -> std::result::Result<Self, ConfigError> {
        let rules = config.compile()?;

        info!(
            "Loaded role action mappings: version={}, scopes={:?}",
            config.version,
            rules.scope_names()
        );

        Ok(Self {
            current: ArcSwap::from_pointee(RuleSnapshot::new(1, rules)),
            reload_lock: Mutex::new(()),
            cache_enabled,
        })
    }

    /// Load and compile a TOML rule file
    pub fn load<P: AsRef<Path>>(path: P, cache_enabled: bool) -> Result<Self> {
        let config = RuleConfig::load(path)?;
        Ok(Self::with_cache(&config, cache_enabled)?)
    }

    /// Atomically replace the rules, returning the new generation
    ///
    /// An invalid configuration is rejected and the current rules stay in
    /// service.
    pub fn reload(&self, config: &RuleConfig) -> std::result::Result<u64, ConfigError> {
        let rules = config.compile().map_err(|e| {
            warn!("Rejected rule reload: {}", e);
            e
        })?;

        let _guard = self.reload_lock.lock();
        let generation = self.current.load().generation + 1;
        self.current.store(Arc::new(RuleSnapshot::new(generation, rules)));

        info!("Role action mappings reloaded: generation={}", generation);
        Ok(generation)
    }

    /// Reload from a TOML rule file
    pub fn reload_from_path<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let config = RuleConfig::load(path)?;
        Ok(self.reload(&config)?)
    }

    /// Generation of the rules currently in service
    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// Format version of the rules currently in service
    pub fn config_version(&self) -> u32 {
        self.snapshot().rules.registry().version()
    }

    /// Project names with a configured mapping
    pub fn known_scopes(&self) -> Vec<String> {
        self.snapshot().rules.scope_names()
    }

    /// Cache statistics for the current generation
    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        CacheStats {
            hits: snapshot.hits.load(Ordering::Relaxed),
            misses: snapshot.misses.load(Ordering::Relaxed),
            entries: snapshot.cache.len(),
            generation: snapshot.generation,
        }
    }

    /// Drop cached lookups for the current generation
    pub fn clear_cache(&self) {
        self.snapshot().cache.clear();
    }

    fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }
}

impl ScopeRuleResolver for RuleConfigResolver {
    fn required_role_types(
        &self,
        action: &Action,
        target_type: &EntityType,
        scope: Option<&str>,
    ) -> std::result::Result<ScopeRuleSet, ConfigError> {
        let snapshot = self.snapshot();

        if !self.cache_enabled {
            return snapshot.rules.lookup(action, target_type, scope);
        }

        let key = CacheKey::new(action, target_type, scope);
        if let Some(cached) = snapshot.cache.get(&key) {
            snapshot.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }
        snapshot.misses.fetch_add(1, Ordering::Relaxed);

        let required = snapshot.rules.lookup(action, target_type, scope)?;
        debug!(
            "Resolved {} role types for action={}, target={}, scope={:?}, generation={}",
            required.len(),
            action,
            target_type,
            scope,
            snapshot.generation
        );

        snapshot.cache.insert(key, required.clone());
        Ok(required)
    }
}
