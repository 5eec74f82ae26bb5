// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn request<'a>(prompt: &'a str, metadata: &'a TaskMetadata) -> RouteRequest<'a> {
    RouteRequest {
        prompt,
        agent_type: "build",
        files: &[],
        metadata,
        model: None,
        model_ref: None,
        target_agent_name: None,
        worker_personality: None,
    }
}

#[test]
fn short_prompt_routes_quick_on_fast() {
    let metadata = TaskMetadata::default();
    let (decision, _) =
        route(request("rename foo to bar", &metadata), &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Quick);
    assert_eq!(decision.model_tier, ModelTier::Fast);
    assert_eq!(decision.model_source, ModelSource::Unresolved);
    assert!(decision.model_ref.is_none());
}

#[test]
fn deep_keywords_route_deep() {
    let metadata = TaskMetadata::default();
    let prompt = "Plan the migration of the distributed architecture and run a \
                  performance benchmark across services to find the root cause.";
    let (decision, _) = route(request(prompt, &metadata), &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Deep);
    // Deep floors at balanced even though the baseline is heavy already.
    assert_eq!(decision.model_tier, ModelTier::Heavy);
}

#[test]
fn long_prompt_adds_score() {
    let metadata = TaskMetadata::default();
    let prompt = "x".repeat(3600);
    let (decision, _) = route(request(&prompt, &metadata), &RoutingConfig::default());
    assert_ne!(decision.complexity, Complexity::Quick);
}

#[test]
fn many_files_add_score() {
    let metadata = TaskMetadata::default();
    let files: Vec<String> = (0..12).map(|i| format!("src/file_{i}.rs")).collect();
    let prompt = "update the signatures across these modules to the new trait and keep \
                  behavior identical everywhere the old form appears in the codebase so \
                  callers keep compiling without edits.";
    let req = RouteRequest { files: &files, ..request(prompt, &metadata) };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Standard);
}

#[parameterized(
    plan = { "plan" },
    architect = { "architect" },
    swarm = { "swarm" },
)]
fn orchestration_agent_types_add_score(agent_type: &str) {
    let metadata = TaskMetadata::default();
    let prompt = "coordinate the incident response, benchmark the fix, and write up the root cause";
    let req = RouteRequest { agent_type, ..request(prompt, &metadata) };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Deep);
}

#[test]
fn explicit_complexity_overrides_inference() {
    let metadata = TaskMetadata::from_value(json!({"complexity": "deep"}));
    let (decision, _) = route(request("fix typo", &metadata), &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Deep);
    assert_eq!(decision.model_tier, ModelTier::Heavy);
}

#[test]
fn quick_tasks_cap_at_fast_despite_tier_hint() {
    let metadata = TaskMetadata::from_value(json!({"tier": "heavy"}));
    let (decision, _) = route(request("fix typo", &metadata), &RoutingConfig::default());
    assert_eq!(decision.complexity, Complexity::Quick);
    assert_eq!(decision.model_tier, ModelTier::Fast);
}

#[parameterized(
    low_caps_balanced = { "low", ModelTier::Balanced },
    strict_caps_fast = { "strict", ModelTier::Fast },
    minimal_caps_fast = { "minimal", ModelTier::Fast },
)]
fn budget_hints_cap_tier(budget: &str, expected: ModelTier) {
    let metadata = TaskMetadata::from_value(json!({
        "complexity": "deep",
        "budget_tier": budget,
    }));
    let (decision, _) = route(request("big refactor", &metadata), &RoutingConfig::default());
    // Caps are applied after floors, so a strict budget beats the deep floor.
    assert_eq!(decision.model_tier, expected);
}

#[test]
fn quality_hint_floors_heavy() {
    let metadata = TaskMetadata::from_value(json!({
        "complexity": "standard",
        "quality_preference": "best",
    }));
    let (decision, _) = route(request("review this module", &metadata), &RoutingConfig::default());
    assert_eq!(decision.model_tier, ModelTier::Heavy);
}

#[test]
fn min_max_tier_metadata_clamps_last() {
    let metadata = TaskMetadata::from_value(json!({
        "complexity": "standard",
        "max_model_tier": "fast",
    }));
    let (decision, _) = route(request("standard work item", &metadata), &RoutingConfig::default());
    assert_eq!(decision.model_tier, ModelTier::Fast);
}

#[test]
fn explicit_model_ref_wins() {
    let metadata = TaskMetadata::default();
    let req = RouteRequest {
        model_ref: Some("anthropic:claude-opus-4-20250514"),
        ..request("prompt", &metadata)
    };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert_eq!(decision.model_source, ModelSource::Explicit);
    assert_eq!(
        decision.model_ref.unwrap().canonical(),
        "anthropic:claude-opus-4-20250514"
    );
}

#[test]
fn wire_form_model_normalizes_to_canonical() {
    let metadata = TaskMetadata::default();
    let req = RouteRequest { model: Some("openai/gpt-4o"), ..request("prompt", &metadata) };
    let (decision, enriched) = route(req, &RoutingConfig::default());
    assert_eq!(decision.model_ref.as_ref().unwrap().canonical(), "openai:gpt-4o");
    assert_eq!(enriched.model_ref.as_deref(), Some("openai:gpt-4o"));
    assert_eq!(enriched.model.as_deref(), Some("openai/gpt-4o"));
}

#[test]
fn bare_selector_resolves_through_table() {
    let metadata = TaskMetadata::default();
    let req = RouteRequest { model: Some("sonnet"), ..request("prompt", &metadata) };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert_eq!(
        decision.model_ref.unwrap().canonical(),
        "anthropic:claude-sonnet-4-20250514"
    );
}

#[test]
fn unknown_bare_selector_stays_unresolved() {
    let metadata = TaskMetadata::default();
    let req = RouteRequest { model: Some("mystery-model"), ..request("prompt", &metadata) };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert!(decision.model_ref.is_none());
    assert_eq!(decision.model_source, ModelSource::Unresolved);
}

#[test]
fn personality_maps_resolve_agent_and_model() {
    let mut config = RoutingConfig::default();
    config.personality_agents.insert("reviewer".into(), "code-reviewer".into());
    config.personality_models.insert("reviewer".into(), "anthropic:claude-sonnet-4".into());

    let metadata = TaskMetadata::default();
    let req = RouteRequest { worker_personality: Some("reviewer"), ..request("prompt", &metadata) };
    let (decision, enriched) = route(req, &config);

    assert_eq!(decision.target_agent_name.as_deref(), Some("code-reviewer"));
    assert_eq!(decision.model_source, ModelSource::PersonalityMap);
    assert_eq!(decision.model_ref.as_ref().unwrap().canonical(), "anthropic:claude-sonnet-4");

    let routing = enriched.routing.as_ref().unwrap();
    assert_eq!(routing.target_agent_name.as_deref(), Some("code-reviewer"));
    assert_eq!(routing.model_ref.as_deref(), Some("anthropic:claude-sonnet-4"));
    assert_eq!(enriched.model.as_deref(), Some("anthropic/claude-sonnet-4"));
}

#[test]
fn unmapped_personality_targets_itself() {
    let metadata = TaskMetadata::default();
    let req = RouteRequest { worker_personality: Some("Scout"), ..request("prompt", &metadata) };
    let (decision, _) = route(req, &RoutingConfig::default());
    assert_eq!(decision.target_agent_name.as_deref(), Some("Scout"));
    assert_eq!(decision.worker_personality.as_deref(), Some("Scout"));
}

#[test]
fn tier_map_used_only_when_auto_model_enabled() {
    let mut config = RoutingConfig::default();
    config.model_fast = Some("google:gemini-2.5-flash".into());

    let metadata = TaskMetadata::default();
    let (decision, _) = route(request("fix typo", &metadata), &config);
    assert!(decision.model_ref.is_none());

    config.auto_model = true;
    let (decision, _) = route(request("fix typo", &metadata), &config);
    assert_eq!(decision.model_source, ModelSource::TierMap);
    assert_eq!(decision.model_ref.unwrap().canonical(), "google:gemini-2.5-flash");
}

#[test]
fn enriched_metadata_carries_policy_stamp_and_mirrors() {
    let metadata = TaskMetadata::from_value(json!({"customer": "acme"}));
    let (decision, enriched) = route(request("fix typo in readme", &metadata), &RoutingConfig::default());

    let routing = enriched.routing.as_ref().unwrap();
    assert_eq!(routing.policy.as_deref(), Some(POLICY_VERSION));
    assert_eq!(routing.complexity, Some(decision.complexity));
    assert_eq!(routing.model_source, Some(ModelSource::Unresolved));
    assert_eq!(enriched.complexity, Some(decision.complexity));
    assert_eq!(enriched.model_tier, Some(decision.model_tier));
    // Opaque keys pass through untouched.
    assert_eq!(enriched.extras["customer"], "acme");
}

#[test]
fn required_capabilities_pass_through() {
    let metadata = TaskMetadata::from_value(json!({
        "required_capabilities": ["gpu", "docker"],
    }));
    let (decision, _) = route(request("train it", &metadata), &RoutingConfig::default());
    assert_eq!(decision.required_capabilities, vec!["gpu".to_string(), "docker".to_string()]);
}

#[test]
fn routing_is_deterministic() {
    let metadata = TaskMetadata::from_value(json!({"budget": "high"}));
    let config = RoutingConfig::default();
    let req = request("refactor the session layer for performance", &metadata);
    let (first, first_meta) = route(req, &config);
    for _ in 0..10 {
        let (again, again_meta) = route(req, &config);
        assert_eq!(again, first);
        assert_eq!(again_meta, first_meta);
    }
}
