// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_sb_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("SB_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn defaults_without_environment() {
    clear_sb_env();
    let config = Config::from_env();
    assert_eq!(config.listen_addr, "0.0.0.0:8080");
    assert!(config.database_url.is_none());
    assert!(!config.events.enabled);
    assert!(!config.spawner.enabled);
    assert_eq!(config.cron_driver, CronDriver::Disabled);
    assert_eq!(config.default_tenant, "default");
    assert_eq!(config.registry.buffer_capacity, 64);
    assert_eq!(config.sweeper.claim_grace, Duration::from_secs(300));
}

#[test]
#[serial]
fn personality_maps_parse_json_objects() {
    clear_sb_env();
    std::env::set_var("SB_PERSONALITY_AGENT_MAP", r#"{"Reviewer": "code-reviewer"}"#);
    std::env::set_var("SB_PERSONALITY_MODEL_MAP", "not json");
    let config = Config::from_env();
    // Keys are lowercased; invalid JSON maps are ignored.
    assert_eq!(config.routing.personality_agents["reviewer"], "code-reviewer");
    assert!(config.routing.personality_models.is_empty());
    clear_sb_env();
}

#[test]
#[serial]
fn cron_driver_and_namespace_fallbacks() {
    clear_sb_env();
    std::env::set_var("SB_CRON_DRIVER", "knative");
    std::env::set_var("SB_NAMESPACE", "agents");
    let config = Config::from_env();
    assert_eq!(config.cron_driver, CronDriver::Knative);
    // The cron namespace defaults to the orchestrator namespace.
    assert_eq!(config.cron.default_namespace, "agents");
    assert_eq!(config.spawner.namespace, "agents");
    clear_sb_env();
}

#[test]
#[serial]
fn fallback_chain_splits_on_commas() {
    clear_sb_env();
    std::env::set_var("SB_MODEL_FALLBACK_CHAIN", "anthropic:claude-sonnet-4, openai:gpt-4o ,");
    let config = Config::from_env();
    assert_eq!(
        config.model_fallback_chain,
        vec!["anthropic:claude-sonnet-4".to_string(), "openai:gpt-4o".to_string()]
    );
    clear_sb_env();
}
