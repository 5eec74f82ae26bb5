// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    canonical = { "anthropic:claude-sonnet-4", "anthropic", "claude-sonnet-4" },
    wire = { "anthropic/claude-sonnet-4", "anthropic", "claude-sonnet-4" },
    padded = { "  openai:gpt-4o  ", "openai", "gpt-4o" },
    model_with_slash = { "openrouter:meta/llama-3", "openrouter", "meta/llama-3" },
)]
fn parse_accepts_both_forms(input: &str, provider: &str, model: &str) {
    let parsed = ModelRef::parse(input).unwrap();
    assert_eq!(parsed.provider(), provider);
    assert_eq!(parsed.model(), model);
}

#[parameterized(
    bare = { "sonnet" },
    empty = { "" },
    empty_provider = { ":model" },
    empty_model = { "provider:" },
)]
fn parse_rejects_malformed(input: &str) {
    assert!(ModelRef::parse(input).is_err());
}

#[test]
fn parse_opt_is_lenient() {
    assert!(ModelRef::parse_opt(None).is_none());
    assert!(ModelRef::parse_opt(Some("")).is_none());
    assert!(ModelRef::parse_opt(Some("sonnet")).is_none());
    assert!(ModelRef::parse_opt(Some("a:b")).is_some());
}

#[test]
fn canonical_and_wire_renderings() {
    let parsed = ModelRef::parse("minimax/minimax-m2.1").unwrap();
    assert_eq!(parsed.canonical(), "minimax:minimax-m2.1");
    assert_eq!(parsed.wire(), "minimax/minimax-m2.1");
}

#[test]
fn serde_uses_canonical_form() {
    let parsed = ModelRef::parse("google/gemini-2.5-pro").unwrap();
    let json = serde_json::to_string(&parsed).unwrap();
    assert_eq!(json, "\"google:gemini-2.5-pro\"");
    let back: ModelRef = serde_json::from_str(&json).unwrap();
    assert_eq!(back, parsed);
}

proptest! {
    // to_wire(to_canonical(ref)) == ref for valid provider/model strings,
    // and the converse for provider:model strings.
    #[test]
    fn round_trip_wire_to_canonical(
        provider in "[a-z][a-z0-9-]{0,15}",
        model in "[a-z0-9][a-z0-9.-]{0,23}",
    ) {
        let wire = format!("{}/{}", provider, model);
        let parsed = ModelRef::parse(&wire).unwrap();
        prop_assert_eq!(parsed.wire(), wire.clone());

        let canonical = parsed.canonical();
        let reparsed = ModelRef::parse(&canonical).unwrap();
        prop_assert_eq!(reparsed.wire(), wire);
    }
}
