//! Configuration Unit Tests
//!
//! Tests for loading, defaults, environment expansion and validation.

use secrecy::ExposeSecret;
use secrets_sync::config::{Config, ConfigError, DEFAULT_FILE_MODE};
use std::path::PathBuf;
use std::time::Duration;
use sync_vault_client::{AuthMethod, KvVersion};
use test_utils::fixtures::{INVALID_CONFIG_YAML, VALID_CONFIG_YAML};

const STORE: &str = r#"
  address: "https://vault.example.com"
  authMethod: "token"
  token: "root"
"#;

const SECRET: &str = r#"
  - name: "app"
    key: "app/config"
    refreshInterval: "5m"
    template:
      data:
        config: '{{ .value }}'
    files:
      - path: "/secrets/app"
"#;

fn yaml(store: &str, secrets: &str) -> String {
    format!("secretStore:{store}\nsecrets:{secrets}")
}

fn env(name: &str) -> Option<String> {
    match name {
        "VAULT_TOKEN" => Some("s.from-env".to_string()),
        _ => None,
    }
}

fn parse(text: &str) -> Result<Config, ConfigError> {
    Config::from_yaml_with(text, env)
}

fn with_secret_line(line: &str) -> String {
    yaml(STORE, &SECRET.replace("    key: \"app/config\"\n", &format!("    key: \"app/config\"\n    {line}\n")))
}

#[test]
fn test_valid_config_loads() {
    let config = parse(VALID_CONFIG_YAML).unwrap();

    assert_eq!(config.secret_store.address, "https://vault.example.com");
    match &config.secret_store.auth {
        AuthMethod::Token(token) => assert_eq!(token.expose_secret(), "s.from-env"),
        other => panic!("expected token auth, got {other:?}"),
    }
    assert_eq!(config.secrets.len(), 2);

    let tls = &config.secrets[0];
    assert_eq!(tls.name, "tls-cert");
    assert_eq!(tls.key, "common/tls/example-cert");
    assert_eq!(tls.refresh_interval, Duration::from_secs(30 * 60));
    assert_eq!(tls.templates[0].label, "tls.crt");
    assert_eq!(tls.files[0].path, PathBuf::from("/secrets/tls.crt"));
    assert_eq!(tls.files[0].mode, 0o644);
    assert_eq!(tls.files[1].mode, 0o600);

    let db = &config.secrets[1];
    assert_eq!(db.key, "database/prod/credentials");
    assert_eq!(db.namespace, "team-db");
    assert_eq!(db.refresh_interval, Duration::from_secs(3600));
    assert_eq!(db.files[0].mode, DEFAULT_FILE_MODE);
    assert_eq!(db.files[1].mode, 0o600);
}

#[test]
fn test_unset_variable_expands_empty() {
    let err = Config::from_yaml_with(VALID_CONFIG_YAML, |_| None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingToken));
}

#[test]
fn test_invalid_config_rejected() {
    assert!(parse(INVALID_CONFIG_YAML).is_err());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml(STORE, SECRET)).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.secrets[0].name, "app");
}

#[test]
fn test_load_missing_file() {
    let err = Config::load("/nonexistent/secrets-sync/config.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_malformed_yaml() {
    let err = parse("secretStore: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_positional_binding_keeps_declared_order() {
    let secrets = r#"
  - name: "ordered"
    key: "app/ordered"
    template:
      data:
        zeta: '{{ .z }}'
        alpha: '{{ .a }}'
    files:
      - path: "/secrets/first"
      - path: "/secrets/second"
"#;
    let config = parse(&yaml(STORE, secrets)).unwrap();
    let pairs: Vec<_> = config.secrets[0]
        .bindings()
        .map(|(t, f)| (t.label.clone(), f.path.clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("zeta".to_string(), PathBuf::from("/secrets/first")),
            ("alpha".to_string(), PathBuf::from("/secrets/second")),
        ]
    );
}

#[test]
fn test_missing_address() {
    let store = STORE.replace("https://vault.example.com", "");
    assert!(matches!(parse(&yaml(&store, SECRET)), Err(ConfigError::MissingAddress)));
}

#[test]
fn test_invalid_auth_method() {
    let store = STORE.replace("\"token\"\n", "\"kerberos\"\n");
    let err = parse(&yaml(&store, SECRET)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAuthMethod(ref m) if m == "kerberos"));
}

#[test]
fn test_token_required() {
    let store = STORE.replace("  token: \"root\"\n", "");
    assert!(matches!(parse(&yaml(&store, SECRET)), Err(ConfigError::MissingToken)));
}

#[test]
fn test_approle_requires_credentials() {
    let store = r#"
  address: "https://vault.example.com"
  authMethod: "approle"
  roleId: "role"
"#;
    assert!(matches!(
        parse(&yaml(store, SECRET)),
        Err(ConfigError::MissingAppRoleCredentials)
    ));

    let store = format!("{store}  secretId: \"secret\"\n");
    let config = parse(&yaml(&store, SECRET)).unwrap();
    assert_eq!(config.secret_store.auth.name(), "approle");
}

#[test]
fn test_no_secrets() {
    assert!(matches!(parse(&yaml(STORE, " []")), Err(ConfigError::NoSecrets)));
}

#[test]
fn test_missing_name() {
    let secrets = SECRET.replace("  - name: \"app\"\n    key:", "  - key:");
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "name", .. }));
}

#[test]
fn test_missing_key() {
    let secrets = SECRET.replace("    key: \"app/config\"\n", "");
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "key", ref secret } if secret == "app"));
}

#[test]
fn test_missing_mount_path() {
    let store = format!("{STORE}  mountPath: \"\"\n");
    let err = parse(&yaml(&store, SECRET)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "mountPath", .. }));
}

#[test]
fn test_kv_versions() {
    for (value, valid) in [("v1", true), ("v2", true), ("v3", false)] {
        let result = parse(&with_secret_line(&format!("kvVersion: \"{value}\"")));
        assert_eq!(result.is_ok(), valid, "kvVersion {value}");
    }

    let config = parse(&with_secret_line("kvVersion: \"v1\"")).unwrap();
    assert_eq!(config.secrets[0].kv_version, KvVersion::V1);

    let store = format!("{STORE}  kvVersion: \"\"\n");
    let err = parse(&yaml(&store, SECRET)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidKvVersion { ref scope, .. } if scope == "secretStore"));
}

#[test]
fn test_invalid_refresh_interval() {
    let secrets = SECRET.replace("\"5m\"", "\"soon\"");
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDuration { .. }));
}

#[test]
fn test_zero_refresh_interval() {
    for interval in ["\"0s\"", "0"] {
        let secrets = SECRET.replace("\"5m\"", interval);
        let err = parse(&yaml(STORE, &secrets)).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveInterval { .. }), "interval {interval}");
    }
}

#[test]
fn test_interval_in_seconds() {
    let secrets = SECRET.replace("\"5m\"", "90");
    let config = parse(&yaml(STORE, &secrets)).unwrap();
    assert_eq!(config.secrets[0].refresh_interval, Duration::from_secs(90));
}

#[test]
fn test_no_files() {
    let secrets = r#"
  - name: "empty"
    key: "app/empty"
    template:
      data: {}
    files: []
"#;
    let err = parse(&yaml(STORE, secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::NoFiles { .. }));
}

#[test]
fn test_template_file_mismatch() {
    let secrets = SECRET.replace(
        "        config: '{{ .value }}'\n",
        "        config: '{{ .value }}'\n        extra: '{{ .other }}'\n",
    );
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::TemplateFileMismatch {
            templates: 2,
            files: 1,
            ..
        }
    ));
}

#[test]
fn test_invalid_mode() {
    let secrets = SECRET.replace("      - path: \"/secrets/app\"\n", "      - path: \"/secrets/app\"\n        mode: \"0999\"\n");
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidMode { .. }));
}

#[test]
fn test_integer_mode_reads_as_octal() {
    let secrets = SECRET.replace("      - path: \"/secrets/app\"\n", "      - path: \"/secrets/app\"\n        mode: 640\n");
    let config = parse(&yaml(STORE, &secrets)).unwrap();
    assert_eq!(config.secrets[0].files[0].mode, 0o640);
}

#[test]
fn test_duplicate_secret_name() {
    let second = SECRET.replace("/secrets/app", "/secrets/other");
    let err = parse(&yaml(STORE, &format!("{SECRET}{second}"))).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateSecretName(ref n) if n == "app"));
}

#[test]
fn test_duplicate_target_path() {
    let second = SECRET.replace("\"app\"", "\"other\"");
    let err = parse(&yaml(STORE, &format!("{SECRET}{second}"))).unwrap_err();
    match err {
        ConfigError::DuplicatePath { path, first, second } => {
            assert_eq!(path, PathBuf::from("/secrets/app"));
            assert_eq!(first, "app");
            assert_eq!(second, "other");
        }
        other => panic!("expected DuplicatePath, got {other:?}"),
    }
}

#[test]
fn test_version_pin() {
    let config = parse(&with_secret_line("version: 3")).unwrap();
    assert_eq!(config.secrets[0].version, Some(3));

    let text = with_secret_line("version: 3\n    kvVersion: \"v1\"");
    let err = parse(&text).unwrap_err();
    assert!(matches!(err, ConfigError::VersionPinRequiresV2 { .. }));
}

#[test]
fn test_invalid_template_rejected_at_load() {
    let secrets = SECRET.replace("'{{ .value }}'", "'{{ .value'");
    let err = parse(&yaml(STORE, &secrets)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTemplate { ref secret, .. } if secret == "app"));
}

#[test]
fn test_namespace_resolution_from_config() {
    let store = format!("{STORE}  namespace: \"platform\"\n");
    let secrets = format!(
        "{SECRET}{}",
        SECRET
            .replace("\"app\"", "\"scoped\"")
            .replace("/secrets/app", "/secrets/scoped")
            .replace("    key: \"app/config\"\n", "    key: \"app/config\"\n    namespace: \"team-a\"\n")
    );
    let config = parse(&yaml(&store, &secrets)).unwrap();
    let global = config.secret_store.namespace.as_str();

    assert_eq!(config.secrets[0].resolve_namespace(global), "platform");
    assert_eq!(config.secrets[1].resolve_namespace(global), "team-a");
    assert_eq!(config.secrets[1].fetch_request(global).namespace, "team-a");
}
