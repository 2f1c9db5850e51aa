//! Namespace Resolution Property Tests
//!
//! Tests validate:
//! - A non-empty secret namespace always wins
//! - An empty secret namespace falls back to the global one
//! - The resolved namespace is what the fetch request carries

use proptest::prelude::*;
use secrets_sync::{resolve_namespace, FileTarget, Secret, TemplateEntry};
use std::time::Duration;
use sync_vault_client::KvVersion;
use test_utils::namespace_strategy;

fn secret(namespace: String) -> Secret {
    Secret {
        name: "app".to_string(),
        key: "app/config".to_string(),
        namespace,
        mount_path: "secret".to_string(),
        kv_version: KvVersion::V2,
        refresh_interval: Duration::from_secs(60),
        version: None,
        templates: vec![TemplateEntry::new("config", "{{ .value }}")],
        files: vec![FileTarget::new("/secrets/app", 0o600)],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_secret_namespace_overrides_global(
        secret_ns in namespace_strategy(),
        global_ns in namespace_strategy(),
    ) {
        let expected = if secret_ns.is_empty() { global_ns.clone() } else { secret_ns.clone() };
        prop_assert_eq!(resolve_namespace(&secret_ns, &global_ns), expected.as_str());

        let secret = secret(secret_ns);
        prop_assert_eq!(secret.resolve_namespace(&global_ns), expected.as_str());
        prop_assert_eq!(secret.fetch_request(&global_ns).namespace, expected);
    }
}

#[test]
fn test_all_four_combinations() {
    assert_eq!(resolve_namespace("team-a", "global"), "team-a");
    assert_eq!(resolve_namespace("", "global"), "global");
    assert_eq!(resolve_namespace("team-a", ""), "team-a");
    assert_eq!(resolve_namespace("", ""), "");
}
