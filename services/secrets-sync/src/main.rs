//! secrets-sync entry point.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use secrets_sync::cli::{BuildInfo, Cli, Command, SAMPLE_CONFIG};
use secrets_sync::{Config, Scheduler, SchedulerOptions};
use std::sync::Arc;
use sync_common::{init_tracing, TracingConfig};
use sync_vault_client::VaultClient;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.selected_command() {
        Command::Init => {
            print!("{SAMPLE_CONFIG}");
            Ok(())
        }
        Command::Version => {
            print!("{}", BuildInfo::current().render());
            Ok(())
        }
        Command::Run => run(cli).await,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let tracing_config = TracingConfig::default()
        .with_log_level(&cli.log_level)
        .with_json_output(cli.log_json);
    init_tracing(&tracing_config).map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    let build = BuildInfo::current();
    info!(version = %build.version_string(), config = %cli.config.display(), "Starting secrets-sync");

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    info!(
        address = %config.secret_store.address,
        auth = config.secret_store.auth.name(),
        secrets = config.secrets.len(),
        "Configuration loaded"
    );

    let client = VaultClient::new(config.secret_store.vault_config()).context("Failed to create secret store client")?;

    let options = SchedulerOptions::default()
        .with_initial_delay(cli.initial_delay.unwrap_or_default())
        .with_shutdown_timeout(cli.shutdown_timeout)
        .with_global_namespace(&config.secret_store.namespace);
    let mut scheduler = Scheduler::new(Arc::new(client), config.secrets, options);

    if cli.once {
        let failed = scheduler
            .run_once()
            .await
            .into_iter()
            .filter(|(_, result)| result.is_err())
            .count();
        if failed > 0 {
            bail!("{failed} secret(s) failed to sync");
        }
        info!("All secrets synced");
        return Ok(());
    }

    let signal = secrets_sync::shutdown::wait_for_signal();
    tokio::pin!(signal);

    let early_signal = tokio::select! {
        started = scheduler.start() => {
            started.context("Failed to start scheduler")?;
            None
        }
        received = &mut signal => Some(received),
    };

    let received = match early_signal {
        Some(received) => received,
        None => {
            info!("Ready");
            signal.await
        }
    };
    if let Ok(name) = &received {
        info!(signal = *name, "Shutdown signal received");
    }

    scheduler.stop().await;
    received
        .map(|_| ())
        .context("Failed to listen for shutdown signals")
}
