// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared Kubernetes plumbing for the spawner and the cron reconciler.

use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;

/// Build a dynamic API handle for a custom resource.
pub fn dynamic_api(
    client: Client,
    namespace: &str,
    group: &str,
    version: &str,
    kind: &str,
    plural: &str,
) -> Api<DynamicObject> {
    let gvk = GroupVersionKind::gvk(group, version, kind);
    let resource = ApiResource::from_gvk_with_plural(&gvk, plural);
    Api::namespaced_with(client, namespace, &resource)
}

/// HTTP status of a Kubernetes API error, when one is attached.
pub fn api_status(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

/// Validate a value destined for textual substitution into a manifest.
///
/// Substituted values are constrained to DNS-label characters before they
/// touch a template, which closes off placeholder injection via tenant or
/// session identifiers.
pub fn is_dns_label_safe(value: &str) -> bool {
    if value.is_empty() || value.len() > 63 {
        return false;
    }
    let bytes = value.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes.iter().all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        simple = { "abc123", true },
        hyphenated = { "sess-abc-1", true },
        single = { "a", true },
        empty = { "", false },
        leading_hyphen = { "-abc", false },
        trailing_hyphen = { "abc-", false },
        uppercase = { "Abc", false },
        underscore = { "a_b", false },
        injection = { "a\nkind: Secret", false },
    )]
    fn dns_label_validation(value: &str, expected: bool) {
        assert_eq!(is_dns_label_safe(value), expected);
    }

    #[test]
    fn overlong_label_rejected() {
        assert!(!is_dns_label_safe(&"a".repeat(64)));
        assert!(is_dns_label_safe(&"a".repeat(63)));
    }
}
