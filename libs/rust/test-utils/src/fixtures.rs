//! Test fixtures with sample data.
//!
//! Sample fetch results match the secrets declared in [`VALID_CONFIG_YAML`].

use sync_vault_client::{FetchResult, SecretVersion};

/// Store path of the sample TLS secret.
pub const TLS_SECRET_PATH: &str = "common/tls/example-cert";

/// Store path of the sample database secret.
pub const DB_SECRET_PATH: &str = "database/prod/credentials";

/// A complete, valid configuration with two secrets. `VAULT_TOKEN` is
/// expanded from the environment.
pub const VALID_CONFIG_YAML: &str = r#"
secretStore:
  address: "https://vault.example.com"
  authMethod: "token"
  token: "${VAULT_TOKEN}"
  kvVersion: "v2"
  mountPath: "secret"

secrets:
  - name: "tls-cert"
    key: "common/tls/example-cert"
    refreshInterval: "30m"
    template:
      data:
        tls.crt: '{{ .tlsCrt }}'
        tls.key: '{{ .tlsKey }}'
    files:
      - path: "/secrets/tls.crt"
        mode: "0644"
      - path: "/secrets/tls.key"
        mode: "0600"

  - name: "database-creds"
    path: "database/prod/credentials"
    namespace: "team-db"
    refreshInterval: "1h"
    template:
      data:
        username: '{{ .username }}'
        password: '{{ .password }}'
    files:
      - path: "/secrets/db-username"
      - path: "/secrets/db-password"
        mode: 0600
"#;

/// A configuration that parses but fails validation (no address, bad auth
/// method, template/file count mismatch).
pub const INVALID_CONFIG_YAML: &str = r#"
secretStore:
  address: ""
  authMethod: "kerberos"

secrets:
  - name: "broken"
    key: "app/config"
    template:
      data:
        a: '{{ .a }}'
        b: '{{ .b }}'
    files:
      - path: "/secrets/a"
"#;

/// Fetched values for the sample TLS secret.
#[must_use]
pub fn tls_fetch_result() -> FetchResult {
    FetchResult::new(
        [("tlsCrt", "AAA"), ("tlsKey", "BBB")],
        SecretVersion::Version(1),
    )
}

/// Fetched values for the sample database secret.
#[must_use]
pub fn db_fetch_result() -> FetchResult {
    FetchResult::new(
        [("username", "app_user"), ("password", "db-password-xyz")],
        SecretVersion::Version(7),
    )
}
