use super::*;
use crate::types::Entity;
use crate::types::{Role, User};
use std::sync::Arc;
use std::thread;

const RULES: &str = r#"
version = 1

[[mapping]]
projects = ["EGI", "WLCG"]

[[mapping.rule]]
roles = ["Site Administrator", "Site Security Officer"]
over = "Site"
actions = ["EDIT_OBJECT", "DELETE_OBJECT"]
targets = ["Site", "Service"]

[[mapping.rule]]
roles = ["NGI Operations Manager"]
over = "Ngi"
actions = ["EDIT_OBJECT"]
targets = ["Site", "Ngi"]

[[mapping]]
projects = ["EUDAT"]

[[mapping.rule]]
roles = ["Chief Operations Officer"]
over = "Project"
actions = ["EDIT_OBJECT"]
targets = ["Site"]

[[mapping]]

[[mapping.rule]]
roles = ["Service Group Administrator"]
over = "ServiceGroup"
actions = ["EDIT_OBJECT"]
targets = ["ServiceGroup"]
"#;

fn resolver() -> RuleConfigResolver {
    RuleConfigResolver::new(&RuleConfig::from_toml(RULES).unwrap()).unwrap()
}

fn action(name: &str) -> Action {
    Action::parse(name).unwrap()
}

fn site() -> EntityType {
    EntityType::new("Site")
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn test_scoped_lookup() {
    let resolver = resolver();
    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &site(), Some("EGI"))
        .unwrap();

    assert_eq!(rules.len(), 3);
    assert_eq!(rules.get("Site Administrator").unwrap().as_str(), "Site");
    assert_eq!(rules.get("Site Security Officer").unwrap().as_str(), "Site");
    assert_eq!(rules.get("NGI Operations Manager").unwrap().as_str(), "Ngi");
}

#[test]
fn test_mapping_shared_between_projects() {
    let resolver = resolver();
    let egi = resolver
        .required_role_types(&action("DELETE_OBJECT"), &site(), Some("EGI"))
        .unwrap();
    let wlcg = resolver
        .required_role_types(&action("DELETE_OBJECT"), &site(), Some("WLCG"))
        .unwrap();
    assert_eq!(egi, wlcg);
    assert_eq!(egi.len(), 2);
}

#[test]
fn test_scope_names_ignore_case() {
    let resolver = resolver();
    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &site(), Some("egi"))
        .unwrap();
    assert_eq!(rules.len(), 3);
}

#[test]
fn test_target_type_ignores_case() {
    let resolver = resolver();
    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &EntityType::new("SITE"), Some("EGI"))
        .unwrap();
    assert_eq!(rules.len(), 3);
}

#[test]
fn test_unknown_scope_is_config_error() {
    let resolver = resolver();
    let err = resolver
        .required_role_types(&action("EDIT_OBJECT"), &site(), Some("P1"))
        .unwrap_err();
    assert_eq!(err, ConfigError::UnknownScope("P1".to_string()));
}

#[test]
fn test_known_scope_without_rule_is_empty() {
    let resolver = resolver();

    let rules = resolver
        .required_role_types(&action("NO_SUCH_ACTION"), &site(), Some("EGI"))
        .unwrap();
    assert!(rules.is_empty());

    let rules = resolver
        .required_role_types(&action("DELETE_OBJECT"), &EntityType::new("Ngi"), Some("EGI"))
        .unwrap();
    assert!(rules.is_empty());
}

#[test]
fn test_actions_are_case_sensitive() {
    let resolver = resolver();
    let rules = resolver
        .required_role_types(&action("edit_object"), &site(), Some("EGI"))
        .unwrap();
    assert!(rules.is_empty());
}

#[test]
fn test_default_rules() {
    let resolver = resolver();
    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &EntityType::new("ServiceGroup"), None)
        .unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(
        rules.get("Service Group Administrator").unwrap().as_str(),
        "ServiceGroup"
    );
}

#[test]
fn test_missing_default_rules_are_empty() {
    let config = RuleConfig::from_toml(
        r#"
        [[mapping]]
        projects = ["EGI"]
        "#,
    )
    .unwrap();
    let resolver = RuleConfigResolver::new(&config).unwrap();

    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &EntityType::new("ServiceGroup"), None)
        .unwrap();
    assert!(rules.is_empty());
}

#[test]
fn test_unregistered_target_type_yields_empty_rules() {
    let resolver = resolver();
    let downtime = EntityType::new("Downtime");

    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &downtime, Some("EGI"))
        .unwrap();
    assert!(rules.is_empty());

    let rules = resolver
        .required_role_types(&action("EDIT_OBJECT"), &downtime, None)
        .unwrap();
    assert!(rules.is_empty());
}

#[test]
fn test_unknown_scope_reported_before_target_type() {
    let resolver = resolver();
    let err = resolver
        .required_role_types(&action("EDIT_OBJECT"), &EntityType::new("Downtime"), Some("P1"))
        .unwrap_err();
    assert_eq!(err, ConfigError::UnknownScope("P1".to_string()));
}

// ============================================================================
// ScopeRuleSet Tests
// ============================================================================

#[test]
fn test_granting_type_case_rules() {
    let rules: ScopeRuleSet = [("Site Administrator", "Site")].into_iter().collect();
    let alice = User::new("alice");

    let upper = Role::new(&alice, "Site Administrator", &Entity::new("s1", "SITE", "S1"));
    let lower = Role::new(&alice, "Site Administrator", &Entity::new("s1", "site", "S1"));
    assert!(rules.granting_type(&upper).is_some());
    assert!(rules.granting_type(&lower).is_some());

    let wrong_name = Role::new(&alice, "site administrator", &Entity::new("s1", "Site", "S1"));
    assert!(rules.granting_type(&wrong_name).is_none());

    let wrong_type = Role::new(&alice, "Site Administrator", &Entity::new("n1", "Ngi", "N1"));
    assert!(rules.granting_type(&wrong_type).is_none());
}

// ============================================================================
// Validation Tests
// ============================================================================

fn compile(toml: &str) -> Result<(), ConfigError> {
    RuleConfig::from_toml(toml).unwrap().validate()
}

#[test]
fn test_unknown_role_type_rejected() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["Supreme Leader"]
        over = "Site"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert_eq!(err, ConfigError::UnknownRoleType("Supreme Leader".to_string()));
}

#[test]
fn test_role_type_names_validated_case_sensitively() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["site administrator"]
        over = "Site"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownRoleType(_)));
}

#[test]
fn test_unknown_entity_types_rejected() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["Site Administrator"]
        over = "Planet"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownEntityType { .. }));

    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["Site Administrator"]
        over = "site"
        actions = ["EDIT_OBJECT"]
        targets = ["Moon"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownEntityType { .. }));
}

#[test]
fn test_custom_registry() {
    let config = RuleConfig::from_toml(
        r#"
        entity_types = ["Tenant", "Workspace"]
        role_types = ["Owner"]

        [[mapping]]
        projects = ["acme"]
        [[mapping.rule]]
        roles = ["Owner"]
        over = "Tenant"
        actions = ["delete"]
        targets = ["Workspace"]
        "#,
    )
    .unwrap();
    let resolver = RuleConfigResolver::new(&config).unwrap();

    let rules = resolver
        .required_role_types(&action("delete"), &EntityType::new("workspace"), Some("ACME"))
        .unwrap();
    assert_eq!(rules.get("Owner").unwrap().as_str(), "Tenant");
}

#[test]
fn test_duplicate_scopes_rejected() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping]]
        projects = ["egi"]
        "#,
    )
    .unwrap_err();
    assert_eq!(err, ConfigError::DuplicateScope("egi".to_string()));

    let err = compile(
        r#"
        [[mapping]]
        [[mapping]]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateScope(_)));
}

#[test]
fn test_conflicting_role_binding_rejected() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["Site Administrator"]
        over = "Site"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        [[mapping.rule]]
        roles = ["Site Administrator"]
        over = "Ngi"
        actions = ["DELETE_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ConflictingRoleMapping { .. }));
}

#[test]
fn test_blank_action_and_empty_lists_rejected() {
    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = ["Site Administrator"]
        over = "Site"
        actions = ["  "]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRule(_)));

    let err = compile(
        r#"
        [[mapping]]
        projects = ["EGI"]
        [[mapping.rule]]
        roles = []
        over = "Site"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRule(_)));
}

#[test]
fn test_unsupported_version_rejected() {
    let err = compile("version = 7").unwrap_err();
    assert_eq!(err, ConfigError::UnsupportedVersion(7));
}

// ============================================================================
// Cache And Reload Tests
// ============================================================================

#[test]
fn test_lookup_caching() {
    let resolver = resolver();
    let edit = action("EDIT_OBJECT");

    resolver.required_role_types(&edit, &site(), Some("EGI")).unwrap();
    let stats = resolver.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);

    resolver.required_role_types(&edit, &EntityType::new("site"), Some("egi")).unwrap();
    let stats = resolver.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
    assert!(stats.hit_rate() > 0.0);

    resolver.clear_cache();
    assert_eq!(resolver.stats().entries, 0);
}

#[test]
fn test_errors_are_not_cached() {
    let resolver = resolver();
    let edit = action("EDIT_OBJECT");

    assert!(resolver.required_role_types(&edit, &site(), Some("P1")).is_err());
    assert!(resolver.required_role_types(&edit, &site(), Some("P1")).is_err());
    assert_eq!(resolver.stats().entries, 0);
}

#[test]
fn test_cache_disabled() {
    let config = RuleConfig::from_toml(RULES).unwrap();
    let resolver = RuleConfigResolver::with_cache(&config, false).unwrap();

    resolver
        .required_role_types(&action("EDIT_OBJECT"), &site(), Some("EGI"))
        .unwrap();
    let stats = resolver.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits + stats.misses, 0);
}

#[test]
fn test_reload_swaps_generation_and_cache() {
    let resolver = resolver();
    let edit = action("EDIT_OBJECT");
    assert_eq!(resolver.generation(), 1);

    resolver.required_role_types(&edit, &site(), Some("EUDAT")).unwrap();
    assert_eq!(resolver.stats().entries, 1);

    let reduced = RuleConfig::from_toml(
        r#"
        [[mapping]]
        projects = ["EUDAT"]
        "#,
    )
    .unwrap();
    assert_eq!(resolver.reload(&reduced).unwrap(), 2);
    assert_eq!(resolver.generation(), 2);

    let stats = resolver.stats();
    assert_eq!(stats.generation, 2);
    assert_eq!(stats.entries, 0);

    // Old cached mapping is gone with its generation
    let rules = resolver.required_role_types(&edit, &site(), Some("EUDAT")).unwrap();
    assert!(rules.is_empty());
    assert!(resolver.required_role_types(&edit, &site(), Some("EGI")).is_err());
    assert_eq!(resolver.known_scopes(), vec!["EUDAT".to_string()]);
}

#[test]
fn test_failed_reload_keeps_current_rules() {
    let resolver = resolver();
    let broken = RuleConfig::from_toml("version = 2").unwrap();

    assert!(resolver.reload(&broken).is_err());
    assert_eq!(resolver.generation(), 1);
    assert_eq!(resolver.config_version(), RULE_CONFIG_VERSION);
    assert!(resolver
        .required_role_types(&action("EDIT_OBJECT"), &site(), Some("EGI"))
        .is_ok());
}

#[test]
fn test_concurrent_readers_during_reload() {
    let resolver = Arc::new(resolver());

    // Generation 2 grants only Chief Operations Officer, generation 1 grants
    // three Site/Ngi roles. A reader must always see one of the two.
    let replacement = RuleConfig::from_toml(
        r#"
        [[mapping]]
        projects = ["EGI", "WLCG"]
        [[mapping.rule]]
        roles = ["Chief Operations Officer"]
        over = "Project"
        actions = ["EDIT_OBJECT"]
        targets = ["Site"]
        "#,
    )
    .unwrap();

    let mut handles = vec![];
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        handles.push(thread::spawn(move || {
            let edit = Action::parse("EDIT_OBJECT").unwrap();
            for _ in 0..200 {
                let rules = resolver
                    .required_role_types(&edit, &EntityType::new("Site"), Some("EGI"))
                    .unwrap();
                let old = rules.len() == 3 && rules.get("Site Administrator").is_some();
                let new = rules.len() == 1 && rules.get("Chief Operations Officer").is_some();
                assert!(old || new, "mixed rule set observed: {:?}", rules);
            }
        }));
    }

    for _ in 0..10 {
        resolver.reload(&replacement).unwrap();
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(resolver.generation(), 11);
}

#[test]
fn test_concurrent_reloads_keep_generations_consecutive() {
    let resolver = Arc::new(resolver());
    let config = Arc::new(RuleConfig::from_toml(RULES).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            let config = Arc::clone(&config);
            thread::spawn(move || {
                (0..25)
                    .map(|_| resolver.reload(&config).unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut generations: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    generations.sort_unstable();

    assert_eq!(generations, (2..=101).collect::<Vec<u64>>());
    assert_eq!(resolver.generation(), 101);
    assert_eq!(resolver.stats().generation, 101);
}
