// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn worker_with_codebases(codebases: &[&str]) -> Worker {
    Worker::builder()
        .codebases(codebases.iter().map(|s| s.to_string()).collect())
        .build()
}

#[test]
fn serves_declared_codebase() {
    let worker = worker_with_codebases(&["cbs-one", "cbs-two"]);
    assert!(worker.serves_codebase(&CodebaseId::from_string("cbs-one")));
    assert!(!worker.serves_codebase(&CodebaseId::from_string("cbs-three")));
}

#[test]
fn empty_declaration_opts_into_global_pool() {
    let worker = worker_with_codebases(&[]);
    assert!(worker.serves_global_pool());
}

#[test]
fn global_sentinel_opts_into_global_pool() {
    let worker = worker_with_codebases(&["global", "cbs-one"]);
    assert!(worker.serves_global_pool());
}

#[test]
fn declared_codebases_exclude_global_pool() {
    let worker = worker_with_codebases(&["cbs-one"]);
    assert!(!worker.serves_global_pool());
}

#[test]
fn capability_superset_check() {
    let worker = Worker::builder()
        .capabilities(["build".to_string(), "review".to_string()].into_iter().collect())
        .build();
    assert!(worker.has_capabilities(&[]));
    assert!(worker.has_capabilities(&["build".to_string()]));
    assert!(worker.has_capabilities(&["build".to_string(), "review".to_string()]));
    assert!(!worker.has_capabilities(&["deploy".to_string()]));
}

#[test]
fn worker_id_borrows_as_str() {
    let id = WorkerId::new("worker-7");
    assert_eq!(id, "worker-7");
    assert_eq!(id.to_string(), "worker-7");
}
