// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn unknown_keys_survive_round_trip() {
    let source = json!({
        "model_ref": "anthropic:claude-sonnet-4",
        "customer_ticket": "T-1234",
        "nested": {"a": [1, 2, 3]},
    });
    let metadata = TaskMetadata::from_value(source);
    assert_eq!(metadata.model_ref.as_deref(), Some("anthropic:claude-sonnet-4"));
    assert_eq!(metadata.extras["customer_ticket"], "T-1234");

    let back = metadata.to_value();
    assert_eq!(back["customer_ticket"], "T-1234");
    assert_eq!(back["nested"]["a"][1], 2);
}

#[test]
fn str_hint_checks_typed_then_extras_then_routing() {
    let metadata = TaskMetadata::from_value(json!({
        "worker_personality": "reviewer",
        "budget_tier": "low",
        "routing": {"custom_hint": "deep"},
    }));
    assert_eq!(metadata.str_hint(&["worker_personality"]), Some("reviewer"));
    assert_eq!(metadata.str_hint(&["budget_tier", "budget"]), Some("low"));
    assert_eq!(metadata.str_hint(&["custom_hint"]), Some("deep"));
    assert_eq!(metadata.str_hint(&["missing"]), None);
}

#[test]
fn str_hint_ignores_empty_strings() {
    let metadata = TaskMetadata::from_value(json!({"budget": "   "}));
    assert_eq!(metadata.str_hint(&["budget"]), None);
}

#[test]
fn flag_accepts_bool_and_truthy_strings() {
    let metadata = TaskMetadata::from_value(json!({
        "knative": true,
        "force": "yes",
        "dry_run": "0",
    }));
    assert!(metadata.flag("knative"));
    assert!(metadata.flag("force"));
    assert!(!metadata.flag("dry_run"));
    assert!(!metadata.flag("absent"));
}

#[test]
fn required_capabilities_parses_string_list() {
    let metadata = TaskMetadata::from_value(json!({
        "required_capabilities": ["build", "gpu", 42],
    }));
    assert_eq!(metadata.required_capabilities(), vec!["build".to_string(), "gpu".to_string()]);
}

#[test]
fn delivery_reads_routing_stamp() {
    let mut metadata = TaskMetadata::default();
    assert_eq!(metadata.delivery(), None);
    metadata.routing_mut().delivery = Some(DeliveryRoute::Events);
    assert_eq!(metadata.delivery(), Some(DeliveryRoute::Events));

    let json = metadata.to_value();
    assert_eq!(json["routing"]["delivery"], "events");
}
