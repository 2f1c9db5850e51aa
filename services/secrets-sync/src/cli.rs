//! Command-line interface.

use crate::config::{parse_duration, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Keep files in sync with secrets stored in Vault or OpenBao.
#[derive(Debug, Parser)]
#[command(name = "secrets-sync", version, about)]
pub struct Cli {
    /// Command to run; defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "SECRETS_SYNC_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        global = true
    )]
    pub config: PathBuf,

    /// Run every secret once and exit; non-zero exit if any failed
    #[arg(long, global = true)]
    pub once: bool,

    /// Delay before the first cycle, e.g. `10s`
    #[arg(long, value_parser = parse_duration_arg, global = true)]
    pub initial_delay: Option<Duration>,

    /// How long to wait for refresh loops on shutdown
    #[arg(long, value_parser = parse_duration_arg, default_value = "30s", global = true)]
    pub shutdown_timeout: Duration,

    /// Log filter, e.g. `info` or `secrets_sync=debug`
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,
}

/// Subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sync secrets (default)
    Run,
    /// Print a sample configuration
    Init,
    /// Print version information
    Version,
}

impl Cli {
    /// The command to run, with `run` as the default.
    #[must_use]
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value)
}

/// Build metadata reported by `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Git commit, `dev` for local builds
    pub git_commit: &'static str,
    /// Build date
    pub build_date: &'static str,
}

impl BuildInfo {
    /// Metadata of this binary. `GIT_COMMIT` and `BUILD_DATE` are read from
    /// the build environment.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_commit: match option_env!("GIT_COMMIT") {
                Some(commit) => commit,
                None => "dev",
            },
            build_date: match option_env!("BUILD_DATE") {
                Some(date) => date,
                None => "unknown",
            },
        }
    }

    /// Version string; commit builds report `dev-<commit>`.
    #[must_use]
    pub fn version_string(&self) -> String {
        if self.git_commit.is_empty() || self.git_commit == "dev" {
            self.version.to_string()
        } else {
            format!("dev-{}", self.git_commit)
        }
    }

    /// Text printed by the `version` command.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "secrets-sync version {}\n  Build date: {}\n  OS/Arch:    {}/{}\n",
            self.version_string(),
            self.build_date,
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

/// Annotated configuration printed by `init`.
pub const SAMPLE_CONFIG: &str = r#"# secrets-sync configuration
#
# Values may reference environment variables as ${NAME} or $NAME.

secretStore:
  # Vault or OpenBao server
  address: "https://vault.example.com"

  # token or approle
  authMethod: "token"
  token: "${VAULT_TOKEN}"

  # approle credentials
  # roleId: "${VAULT_ROLE_ID}"
  # secretId: "${VAULT_SECRET_ID}"

  # Defaults for every secret; secrets may override both
  kvVersion: "v2"
  mountPath: "secret"

  # Enterprise namespace; secrets may set their own
  # namespace: "team-a"

  # TLS
  # tlsCACert: "/certs/ca-bundle.pem"
  # tlsCAPath: "/etc/ssl/certs"
  # tlsSkipVerify: false
  # tlsClientCert: "/certs/client.pem"
  # tlsClientKey: "/certs/client-key.pem"

# Templates bind to files by position: the first template.data entry is
# written to the first file, the second to the second, and so on. The labels
# under template.data are only names.
secrets:
  - name: "tls-cert"
    path: "common/tls/example-cert"
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
    refreshInterval: "1h"
    template:
      data:
        username: '{{ .username }}'
        password: '{{ .password }}'
    files:
      - path: "/secrets/db-username"
        mode: "0600"
      - path: "/secrets/db-password"
        mode: "0600"

  - name: "api-keys"
    path: "app/config"
    refreshInterval: "2h"
    template:
      data:
        apiKey: '{{ index . "api-key" }}'
        apiSecret: '{{ index . "api-secret" }}'
    files:
      - path: "/secrets/api-key"
        mode: "0600"
      - path: "/secrets/api-secret"
        mode: "0600"
"#;
