// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::TaskId;
use std::collections::HashMap;

#[test]
fn generated_ids_have_prefix_and_fixed_length() {
    let id = TaskId::new();
    assert!(id.as_str().starts_with("tsk-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = TaskId::from_string("tsk-abc123");
    assert_eq!(id.as_str(), "tsk-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn suffix_without_prefix_returns_whole() {
    let id = TaskId::from_string("weird-id");
    assert_eq!(id.suffix(), "weird-id");
}

#[test]
fn short_truncates() {
    let id = TaskId::from_string("tsk-abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefgh");
}

#[test]
fn idbuf_hash_matches_str_for_map_lookup() {
    let mut map: HashMap<TaskId, u32> = HashMap::new();
    let id = TaskId::from_string("tsk-lookup");
    map.insert(id, 7);
    // Borrow<str> lookup must hash identically to the owned key.
    assert_eq!(map.get("tsk-lookup"), Some(&7));
}

#[test]
fn idbuf_serde_round_trip() {
    let id = TaskId::from_string("tsk-serde");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"tsk-serde\"");
    let parsed: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn idbuf_rejects_oversized_on_deserialize() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    let parsed: Result<TaskId, _> = serde_json::from_str(&long);
    assert!(parsed.is_err());
}

#[test]
fn short_helper_truncates_free_strings() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}
