// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing policy engine.
//!
//! [`route`] is the single decision point for task creation: it infers a
//! complexity band from the prompt, clamps a model tier through guard-rails
//! and caller hints, resolves a concrete model reference, and picks the
//! target agent. It is a pure function of its inputs and a configuration
//! snapshot; it never touches I/O and is deterministic.

use crate::metadata::{RoutingMeta, TaskMetadata};
use crate::model::ModelRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy version stamped into routing metadata.
pub const POLICY_VERSION: &str = "switchboard.routing.v1";

/// Inferred size of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Quick,
    Standard,
    Deep,
}

crate::simple_display! {
    Complexity {
        Quick => "quick",
        Standard => "standard",
        Deep => "deep",
    }
}

impl Complexity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "quick" => Some(Complexity::Quick),
            "standard" => Some(Complexity::Standard),
            "deep" => Some(Complexity::Deep),
            _ => None,
        }
    }
}

/// Model cost/latency band. Ordered: fast < balanced < heavy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    Balanced,
    Heavy,
}

crate::simple_display! {
    ModelTier {
        Fast => "fast",
        Balanced => "balanced",
        Heavy => "heavy",
    }
}

impl ModelTier {
    /// Baseline tier for an inferred complexity.
    pub fn baseline(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Quick => ModelTier::Fast,
            Complexity::Standard => ModelTier::Balanced,
            Complexity::Deep => ModelTier::Heavy,
        }
    }

    /// Parse user-facing tier aliases.
    pub fn parse_alias(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(' ', "_").as_str() {
            "quick" | "fast" | "small" | "cheap" => Some(ModelTier::Fast),
            "standard" | "balanced" | "medium" | "default" => Some(ModelTier::Balanced),
            "deep" | "heavy" | "large" | "expensive" => Some(ModelTier::Heavy),
            _ => None,
        }
    }

    fn clamp(self, min: Option<ModelTier>, max: Option<ModelTier>) -> Self {
        let mut tier = self;
        if let Some(min) = min {
            tier = tier.max(min);
        }
        if let Some(max) = max {
            tier = tier.min(max);
        }
        tier
    }
}

/// Where a resolved model reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Explicit,
    PersonalityMap,
    TierMap,
    #[serde(rename = "none")]
    Unresolved,
}

crate::simple_display! {
    ModelSource {
        Explicit => "explicit",
        PersonalityMap => "personality_map",
        TierMap => "tier_map",
        Unresolved => "none",
    }
}

/// Configuration snapshot for the policy engine.
///
/// Built once from the environment at startup and passed by reference; the
/// router itself never reads configuration sources.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Gates the tier→model mapping (step 3 of model resolution).
    pub auto_model: bool,
    pub model_fast: Option<String>,
    pub model_balanced: Option<String>,
    pub model_heavy: Option<String>,
    /// Personality (lowercased) → agent name.
    pub personality_agents: HashMap<String, String>,
    /// Personality (lowercased) → model reference.
    pub personality_models: HashMap<String, String>,
    /// Score at or below which a task is `quick`.
    pub quick_max_score: i32,
    /// Score at or above which a task is `deep`.
    pub deep_min_score: i32,
    /// Bare model selectors (e.g. `"sonnet"`) → full wire references.
    pub selectors: HashMap<String, String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            auto_model: false,
            model_fast: None,
            model_balanced: None,
            model_heavy: None,
            personality_agents: HashMap::new(),
            personality_models: HashMap::new(),
            quick_max_score: 1,
            deep_min_score: 6,
            selectors: default_selectors(),
        }
    }
}

impl RoutingConfig {
    fn tier_model(&self, tier: ModelTier) -> Option<&str> {
        match tier {
            ModelTier::Fast => self.model_fast.as_deref(),
            ModelTier::Balanced => self.model_balanced.as_deref(),
            ModelTier::Heavy => self.model_heavy.as_deref(),
        }
    }

    /// Normalize a model identifier to a [`ModelRef`].
    ///
    /// Accepts canonical and wire forms directly; bare selectors resolve
    /// through the selector table, unknown selectors stay unresolved.
    pub fn normalize_model_ref(&self, value: Option<&str>) -> Option<ModelRef> {
        let value = value?.trim();
        if value.is_empty() {
            return None;
        }
        if value.contains(':') || value.contains('/') {
            return ModelRef::parse(value).ok();
        }
        let mapped = self.selectors.get(&value.to_lowercase())?;
        ModelRef::parse(mapped).ok()
    }
}

/// Built-in bare-selector table (user-friendly names → wire references).
pub fn default_selectors() -> HashMap<String, String> {
    [
        ("sonnet", "anthropic/claude-sonnet-4-20250514"),
        ("claude-sonnet", "anthropic/claude-sonnet-4-20250514"),
        ("claude-sonnet-4", "anthropic/claude-sonnet-4-20250514"),
        ("opus", "anthropic/claude-opus-4-20250514"),
        ("claude-opus", "anthropic/claude-opus-4-20250514"),
        ("haiku", "anthropic/claude-haiku"),
        ("claude-haiku", "anthropic/claude-haiku"),
        ("minimax", "minimax/minimax-m2.1"),
        ("minimax-m2", "minimax/minimax-m2.1"),
        ("gpt-4", "openai/gpt-4"),
        ("gpt-4o", "openai/gpt-4o"),
        ("gpt-4-turbo", "openai/gpt-4-turbo"),
        ("o1", "openai/o1"),
        ("o3", "openai/o3"),
        ("gemini", "google/gemini-2.5-pro"),
        ("gemini-pro", "google/gemini-2.5-pro"),
        ("gemini-flash", "google/gemini-2.5-flash"),
        ("grok", "xai/grok-3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Inputs to the routing decision.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub prompt: &'a str,
    pub agent_type: &'a str,
    pub files: &'a [String],
    pub metadata: &'a TaskMetadata,
    pub model: Option<&'a str>,
    pub model_ref: Option<&'a str>,
    pub target_agent_name: Option<&'a str>,
    pub worker_personality: Option<&'a str>,
}

/// The resolved routing decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub complexity: Complexity,
    pub model_tier: ModelTier,
    pub model_ref: Option<ModelRef>,
    pub model_source: ModelSource,
    pub target_agent_name: Option<String>,
    pub worker_personality: Option<String>,
    pub required_capabilities: Vec<String>,
}

/// Keywords that mark intent requiring a deeper model (+2 each).
const DEEP_HINTS: &[&str] = &[
    "refactor",
    "architecture",
    "distributed",
    "migration",
    "multi-step",
    "orchestrat",
    "incident",
    "root cause",
    "benchmark",
    "performance",
    "security",
    "long running",
];

/// Keywords that mark quick edits (−1 each).
const QUICK_HINTS: &[&str] =
    &["typo", "rename", "quick", "small", "minor", "lint", "format", "readme", "one line"];

/// Agent types that imply planning or orchestration work.
const HEAVY_AGENT_TYPES: &[&str] = &["swarm", "ralph", "plan", "architect"];

fn infer_complexity(req: &RouteRequest<'_>, config: &RoutingConfig) -> Complexity {
    // Explicit complexity in metadata overrides inference.
    if let Some(explicit) = req.metadata.complexity {
        return explicit;
    }
    if let Some(explicit) = req.metadata.str_hint(&["complexity"]).and_then(Complexity::parse) {
        return explicit;
    }

    let text = req.prompt.to_lowercase();
    let mut score: i32 = 0;

    let prompt_len = req.prompt.len();
    if prompt_len > 3500 {
        score += 4;
    } else if prompt_len > 1200 {
        score += 2;
    } else if prompt_len < 200 {
        score -= 1;
    }

    let file_count = req.files.len();
    if file_count >= 12 {
        score += 3;
    } else if file_count >= 5 {
        score += 1;
    }

    if req.metadata.str_hint(&["resume_session_id"]).is_some() {
        score += 1;
    }

    if HEAVY_AGENT_TYPES.contains(&req.agent_type) {
        score += 2;
    }

    for hint in DEEP_HINTS {
        if text.contains(hint) {
            score += 2;
        }
    }
    for hint in QUICK_HINTS {
        if text.contains(hint) {
            score -= 1;
        }
    }

    if score <= config.quick_max_score {
        Complexity::Quick
    } else if score >= config.deep_min_score {
        Complexity::Deep
    } else {
        Complexity::Standard
    }
}

fn opt_min(a: Option<ModelTier>, b: Option<ModelTier>) -> Option<ModelTier> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn opt_max(a: Option<ModelTier>, b: Option<ModelTier>) -> Option<ModelTier> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn resolve_model_tier(complexity: Complexity, metadata: &TaskMetadata) -> ModelTier {
    let mut tier = ModelTier::baseline(complexity);

    // Explicit tier override (typed field first, then hint aliases).
    if let Some(explicit) = metadata.model_tier {
        tier = explicit;
    } else if let Some(explicit) = metadata
        .str_hint(&["model_tier", "tier", "routing_model_tier"])
        .and_then(ModelTier::parse_alias)
    {
        tier = explicit;
    }

    // Guard-rails: quick tasks stay on fast models unless explicitly forced,
    // deep tasks never drop below balanced.
    let mut min_tier = None;
    let mut max_tier = None;
    match complexity {
        Complexity::Quick => max_tier = Some(ModelTier::Fast),
        Complexity::Deep => min_tier = Some(ModelTier::Balanced),
        Complexity::Standard => {}
    }

    if let Some(budget) = metadata.str_hint(&["budget_tier", "budget", "routing_budget"]) {
        let budget = budget.to_lowercase();
        if matches!(budget.as_str(), "low" | "cheap" | "cost" | "minimal" | "strict") {
            max_tier = opt_min(max_tier, Some(ModelTier::Balanced));
        }
        if matches!(budget.as_str(), "minimal" | "strict") {
            max_tier = opt_min(max_tier, Some(ModelTier::Fast));
        }
        if matches!(budget.as_str(), "high" | "premium") {
            min_tier = opt_max(min_tier, Some(ModelTier::Balanced));
        }
    }

    if let Some(latency) =
        metadata.str_hint(&["latency_preference", "latency", "latency_sla", "routing_latency"])
    {
        let latency = latency.to_lowercase();
        if matches!(latency.as_str(), "low" | "urgent" | "realtime" | "realtime_ms") {
            max_tier = opt_min(max_tier, Some(ModelTier::Balanced));
        }
        if matches!(latency.as_str(), "batch" | "throughput" | "quality") {
            min_tier = opt_max(min_tier, Some(ModelTier::Balanced));
        }
    }

    if let Some(quality) =
        metadata.str_hint(&["quality_preference", "quality", "routing_quality"])
    {
        match quality.to_lowercase().as_str() {
            "max" | "highest" | "best" => min_tier = opt_max(min_tier, Some(ModelTier::Heavy)),
            "high" | "accuracy" => min_tier = opt_max(min_tier, Some(ModelTier::Balanced)),
            _ => {}
        }
    }

    min_tier =
        opt_max(min_tier, metadata.str_hint(&["min_model_tier"]).and_then(ModelTier::parse_alias));
    max_tier =
        opt_min(max_tier, metadata.str_hint(&["max_model_tier"]).and_then(ModelTier::parse_alias));

    tier.clamp(min_tier, max_tier)
}

fn personality_from_inputs(req: &RouteRequest<'_>) -> Option<String> {
    req.worker_personality
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            req.metadata.str_hint(&["worker_personality", "personality", "agent_personality"])
        })
        .map(str::to_string)
}

/// Build a routing decision and the enriched metadata to persist with it.
///
/// Model resolution priority:
/// 1. Explicit `model_ref`/`model` on the request or in metadata
/// 2. Personality→model mapping
/// 3. Tier→model mapping (only when auto-model is enabled)
/// 4. Unresolved — the worker chooses
pub fn route(req: RouteRequest<'_>, config: &RoutingConfig) -> (RoutingDecision, TaskMetadata) {
    let complexity = infer_complexity(&req, config);
    let model_tier = resolve_model_tier(complexity, req.metadata);
    let personality = personality_from_inputs(&req);

    // Target agent: explicit value, then metadata, then personality mapping
    // (a personality with no mapping targets an agent of the same name).
    let target_agent_name = req
        .target_agent_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            req.metadata
                .str_hint(&["target_agent_name", "agent_name"])
                .map(str::to_string)
        })
        .or_else(|| {
            personality.as_ref().map(|p| {
                config
                    .personality_agents
                    .get(&p.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| p.clone())
            })
        });

    let explicit_ref = config
        .normalize_model_ref(req.model_ref)
        .or_else(|| config.normalize_model_ref(req.model))
        .or_else(|| config.normalize_model_ref(req.metadata.model_ref.as_deref()))
        .or_else(|| config.normalize_model_ref(req.metadata.model.as_deref()));

    let mut model_ref = explicit_ref;
    let mut model_source =
        if model_ref.is_some() { ModelSource::Explicit } else { ModelSource::Unresolved };

    if model_ref.is_none() {
        if let Some(p) = &personality {
            model_ref = config
                .personality_models
                .get(&p.to_lowercase())
                .and_then(|m| config.normalize_model_ref(Some(m)));
            if model_ref.is_some() {
                model_source = ModelSource::PersonalityMap;
            }
        }
    }

    if model_ref.is_none() && config.auto_model {
        model_ref = config.normalize_model_ref(config.tier_model(model_tier));
        if model_ref.is_some() {
            model_source = ModelSource::TierMap;
        }
    }

    let decision = RoutingDecision {
        complexity,
        model_tier,
        model_ref,
        model_source,
        target_agent_name,
        worker_personality: personality,
        required_capabilities: req.metadata.required_capabilities(),
    };

    let enriched = enrich_metadata(req.metadata, &decision);
    (decision, enriched)
}

/// Write the decision into a copy of the source metadata: a `routing`
/// sub-object plus top-level mirrors for downstream consumers.
fn enrich_metadata(source: &TaskMetadata, decision: &RoutingDecision) -> TaskMetadata {
    let mut metadata = source.clone();

    let routing = metadata.routing.get_or_insert_with(RoutingMeta::default);
    routing.complexity = Some(decision.complexity);
    routing.model_tier = Some(decision.model_tier);
    routing.model_ref = decision.model_ref.as_ref().map(ModelRef::canonical);
    routing.model_source = Some(decision.model_source);
    routing.target_agent_name = decision.target_agent_name.clone();
    routing.worker_personality = decision.worker_personality.clone();
    routing.policy = Some(POLICY_VERSION.to_string());

    metadata.complexity = Some(decision.complexity);
    metadata.model_tier = Some(decision.model_tier);

    if metadata.worker_personality.is_none() {
        metadata.worker_personality = decision.worker_personality.clone();
    }
    if metadata.target_agent_name.is_none() {
        metadata.target_agent_name = decision.target_agent_name.clone();
    }
    if let Some(model_ref) = &decision.model_ref {
        metadata.model_ref = Some(model_ref.canonical());
        if metadata.model.is_none() {
            metadata.model = Some(model_ref.wire());
        }
    }

    metadata
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
