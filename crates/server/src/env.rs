// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment configuration.
//!
//! All knobs live under the `SB_` prefix and are read once at startup into
//! a [`Config`] snapshot; library code never touches the environment.

use sb_adapters::{EventPublisherConfig, KnativeCronConfig, KnativeSpawnerConfig};
use sb_core::RoutingConfig;
use sb_engine::{CronDriver, RegistryConfig, SweeperConfig};
use std::collections::HashMap;
use std::time::Duration;

fn env_str(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_str(name).unwrap_or_else(|| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_str(name) {
        Some(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_str(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env_str(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parse a JSON-object env var into a lowercased-key string map.
/// Invalid JSON or non-object values are ignored with a warning.
fn env_json_map(name: &str) -> HashMap<String, String> {
    let Some(raw) = env_str(name) else {
        return HashMap::new();
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| {
                let value = v.as_str()?.trim().to_string();
                let key = k.trim().to_lowercase();
                (!key.is_empty() && !value.is_empty()).then_some((key, value))
            })
            .collect(),
        Ok(_) => {
            tracing::warn!(var = name, "expected a JSON object, ignoring");
            HashMap::new()
        }
        Err(_) => {
            tracing::warn!(var = name, "invalid JSON, ignoring");
            HashMap::new()
        }
    }
}

/// Full server configuration snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub default_tenant: String,
    pub events: EventPublisherConfig,
    pub spawner: KnativeSpawnerConfig,
    /// Session workers older than this are garbage-collected.
    pub spawner_max_age_hours: u64,
    pub cron_driver: CronDriver,
    pub cron: KnativeCronConfig,
    pub routing: RoutingConfig,
    pub registry: RegistryConfig,
    pub sweeper: SweeperConfig,
    /// Worker-side model resolution hints, echoed to workers on request.
    pub subcall_model_ref: Option<String>,
    pub model_fallback_chain: Vec<String>,
    pub controller_fallback_allowed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            database_max_connections: 10,
            default_tenant: "default".to_string(),
            events: EventPublisherConfig::default(),
            spawner: KnativeSpawnerConfig::default(),
            spawner_max_age_hours: 24,
            cron_driver: CronDriver::Disabled,
            cron: KnativeCronConfig::default(),
            routing: RoutingConfig::default(),
            registry: RegistryConfig::default(),
            sweeper: SweeperConfig::default(),
            subcall_model_ref: None,
            model_fallback_chain: Vec::new(),
            controller_fallback_allowed: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let namespace = env_or("SB_NAMESPACE", "switchboard");

        let events = EventPublisherConfig {
            enabled: env_bool("SB_EVENTS_ENABLED", false),
            sink_url: env_or(
                "SB_EVENTS_URL",
                "http://broker-ingress.knative-eventing.svc.cluster.local/switchboard/task-broker",
            ),
            source: env_or("SB_EVENTS_SOURCE", "switchboard"),
            retry_max: env_u64("SB_EVENTS_RETRY_MAX", 3) as u32,
            retry_initial_delay: Duration::from_millis(env_u64("SB_EVENTS_RETRY_DELAY_MS", 1000)),
            timeout: Duration::from_millis(env_u64("SB_EVENTS_TIMEOUT_MS", 10_000)),
        };

        let spawner = KnativeSpawnerConfig {
            enabled: env_bool("SB_SPAWNER_ENABLED", false),
            namespace: namespace.clone(),
            configmap_name: env_or(
                "SB_TEMPLATE_CONFIGMAP",
                "switchboard-session-worker-template",
            ),
            workspace_size: env_or("SB_WORKSPACE_SIZE", "10Gi"),
        };

        let cron_driver = env_str("SB_CRON_DRIVER")
            .and_then(|raw| CronDriver::parse(&raw))
            .unwrap_or(CronDriver::Disabled);
        let cron = KnativeCronConfig {
            default_namespace: env_or("SB_CRON_NAMESPACE", &namespace),
            internal_token: env_or("SB_CRON_INTERNAL_TOKEN", ""),
            trigger_base_url: env_or("SB_CRON_TRIGGER_BASE_URL", "http://127.0.0.1:8080"),
            job_image: env_or("SB_CRON_JOB_IMAGE", "curlimages/curl:8.11.1"),
            service_account: env_str("SB_CRON_JOB_SERVICE_ACCOUNT"),
            tenant_namespace_mode: env_bool("SB_CRON_TENANT_NAMESPACE_MODE", false),
            allow_cross_namespace: env_bool("SB_CRON_ALLOW_CROSS_NAMESPACE", false),
            starting_deadline_secs: env_u64("SB_CRON_STARTING_DEADLINE_SECS", 300) as i64,
            success_history_limit: env_i32("SB_CRON_SUCCESS_HISTORY", 1),
            failure_history_limit: env_i32("SB_CRON_FAILURE_HISTORY", 3),
            job_ttl_secs: env_i32("SB_CRON_JOB_TTL_SECS", 600),
        };

        let routing = RoutingConfig {
            auto_model: env_bool("SB_ROUTING_AUTO_MODEL", false),
            model_fast: env_str("SB_ROUTING_MODEL_FAST"),
            model_balanced: env_str("SB_ROUTING_MODEL_BALANCED"),
            model_heavy: env_str("SB_ROUTING_MODEL_HEAVY"),
            personality_agents: env_json_map("SB_PERSONALITY_AGENT_MAP"),
            personality_models: env_json_map("SB_PERSONALITY_MODEL_MAP"),
            quick_max_score: env_i32("SB_ROUTING_QUICK_MAX_SCORE", 1),
            deep_min_score: env_i32("SB_ROUTING_DEEP_MIN_SCORE", 6),
            selectors: sb_core::routing::default_selectors(),
        };

        let registry = RegistryConfig {
            buffer_capacity: env_u64("SB_STREAM_BUFFER", 64) as usize,
            heartbeat_interval: Duration::from_secs(env_u64("SB_STREAM_HEARTBEAT_SECS", 20)),
            liveness_misses: env_u64("SB_LIVENESS_MISSES", 3) as u32,
        };

        let sweeper = SweeperConfig {
            claim_grace: Duration::from_secs(env_u64("SB_CLAIM_GRACE_SECS", 300)),
            readvertise_limit: env_u64("SB_READVERTISE_LIMIT", 100) as usize,
        };

        Self {
            listen_addr: env_or("SB_LISTEN_ADDR", "0.0.0.0:8080"),
            database_url: env_str("SB_DATABASE_URL"),
            database_max_connections: env_u64("SB_DATABASE_MAX_CONNECTIONS", 10) as u32,
            default_tenant: env_or("SB_DEFAULT_TENANT", "default"),
            events,
            spawner,
            spawner_max_age_hours: env_u64("SB_SPAWNER_MAX_AGE_HOURS", 24),
            cron_driver,
            cron,
            routing,
            registry,
            sweeper,
            subcall_model_ref: env_str("SB_SUBCALL_MODEL_REF"),
            model_fallback_chain: env_str("SB_MODEL_FALLBACK_CHAIN")
                .map(|raw| {
                    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
                })
                .unwrap_or_default(),
            controller_fallback_allowed: env_bool("SB_CONTROLLER_FALLBACK", false),
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
