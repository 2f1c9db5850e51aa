//! Graceful shutdown.
//!
//! Tracks refresh tasks in a `JoinSet` and fans a single shutdown flag out
//! to them over a watch channel. Tasks decide where they observe the flag.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Owns background tasks and the flag that stops them.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new coordinator.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawns a tracked task. The task is responsible for watching its
    /// [`ShutdownSignal`].
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(future);
    }

    /// Whether shutdown has been initiated.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signals shutdown and waits up to `timeout` for tasks to finish, then
    /// aborts the rest. Returns the number of aborted tasks.
    pub async fn shutdown(&mut self, timeout: Duration) -> usize {
        info!("Initiating graceful shutdown");
        self.shutdown_tx.send_replace(true);

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        let aborted = self.tasks.len();
        if drained.is_err() {
            warn!(remaining = aborted, "Shutdown timeout reached, aborting remaining tasks");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        info!("Shutdown complete");
        aborted
    }

    /// Returns the number of active tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown is signaled, immediately if it already was.
    pub async fn cancelled(&mut self) {
        // A dropped coordinator counts as shutdown.
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }

    /// Checks if shutdown has been signaled (non-blocking).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Waits for SIGTERM or SIGINT and returns the signal name.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<()>>();

    tokio::select! {
        result = signal::ctrl_c() => result.map(|()| "SIGINT"),
        result = terminate => result.map(|()| "SIGTERM"),
    }
}
