//! Per-secret refresh scheduling.
//!
//! Every secret runs on its own task with its own timer. A cycle fetches the
//! secret, renders its templates and writes its files, in that order; the
//! next cycle is only armed once the previous one has returned, so cycles of
//! one secret never overlap. Failures are logged and recorded in the
//! secret's status and never affect other secrets.
//!
//! Shutdown cancels timers and in-flight fetches. Writes already handed to
//! the blocking pool run to completion.

use crate::error::{CycleError, RenderError, SchedulerError};
use crate::materializer::FileMaterializer;
use crate::render::{RenderedFile, SecretRenderer};
use crate::secret::Secret;
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sync_vault_client::{FetchErrorKind, SecretStore, SecretVersion};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Delay before each secret's first cycle
    pub initial_delay: Duration,
    /// How long `stop` waits for tasks before aborting them
    pub shutdown_timeout: Duration,
    /// Namespace for secrets that do not set their own
    pub global_namespace: String,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(30),
            global_namespace: String::new(),
        }
    }
}

impl SchedulerOptions {
    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the global namespace.
    #[must_use]
    pub fn with_global_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.global_namespace = namespace.into();
        self
    }
}

/// Where a secret is in its refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// Reading from the store
    Fetching,
    /// Evaluating templates
    Rendering,
    /// Writing files
    Writing,
    /// Loop ended by shutdown
    Stopped,
}

impl CycleState {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Rendering => "rendering",
            Self::Writing => "writing",
            Self::Stopped => "stopped",
        }
    }
}

/// Observable state of one secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretStatus {
    /// Current loop state
    pub state: CycleState,
    /// Completed cycles, successful or not
    pub cycles: u64,
    /// Version written by the last successful cycle
    pub last_version: Option<SecretVersion>,
    /// Time of the last successful cycle
    pub last_success: Option<DateTime<Utc>>,
    /// Error of the last cycle, cleared on success
    pub last_error: Option<String>,
    /// Failed cycles since the last success
    pub consecutive_failures: u32,
    /// Files replaced over the process lifetime
    pub files_written: u64,
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Version that was rendered
    pub version: SecretVersion,
    /// Files whose content was replaced
    pub files_changed: usize,
    /// Files already up to date
    pub files_unchanged: usize,
}

type StatusMap = Arc<RwLock<HashMap<String, SecretStatus>>>;

/// Drives refresh cycles for a set of secrets.
pub struct Scheduler {
    store: Arc<dyn SecretStore>,
    secrets: Vec<Arc<Secret>>,
    options: SchedulerOptions,
    materializer: FileMaterializer,
    statuses: StatusMap,
    ready_tx: Arc<watch::Sender<usize>>,
    coordinator: ShutdownCoordinator,
    started: bool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("secrets", &self.secrets.len())
            .field("options", &self.options)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until [`Scheduler::start`].
    pub fn new(store: Arc<dyn SecretStore>, secrets: Vec<Secret>, options: SchedulerOptions) -> Self {
        let statuses = secrets
            .iter()
            .map(|s| (s.name.clone(), SecretStatus::default()))
            .collect();
        let (ready_tx, _) = watch::channel(0);
        Self {
            store,
            secrets: secrets.into_iter().map(Arc::new).collect(),
            options,
            materializer: FileMaterializer::new(),
            statuses: Arc::new(RwLock::new(statuses)),
            ready_tx: Arc::new(ready_tx),
            coordinator: ShutdownCoordinator::new(),
            started: false,
        }
    }

    /// Use a custom materializer.
    #[must_use]
    pub fn with_materializer(mut self, materializer: FileMaterializer) -> Self {
        self.materializer = materializer;
        self
    }

    /// Spawn one refresh loop per secret and wait until every secret has
    /// finished its first cycle, successful or not.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoSecrets`] with nothing to schedule,
    /// [`SchedulerError::ZeroInterval`] for a secret that would never wait
    /// between cycles and [`SchedulerError::AlreadyStarted`] on a second call.
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        if self.secrets.is_empty() {
            return Err(SchedulerError::NoSecrets);
        }
        if let Some(secret) = self.secrets.iter().find(|s| s.refresh_interval.is_zero()) {
            return Err(SchedulerError::ZeroInterval {
                secret: secret.name.clone(),
            });
        }
        self.started = true;

        info!(
            secrets = self.secrets.len(),
            initial_delay_ms = u64::try_from(self.options.initial_delay.as_millis()).unwrap_or(u64::MAX),
            "Starting refresh loops"
        );
        for secret in &self.secrets {
            let worker = self.worker(secret);
            let signal = self.coordinator.subscribe();
            let ready = FirstCycle::new(&secret.name, Arc::clone(&self.ready_tx));
            let initial_delay = self.options.initial_delay;
            self.coordinator
                .spawn(worker.run(signal, initial_delay, ready));
        }

        self.ready().await;
        info!("All secrets completed their first cycle");
        Ok(())
    }

    /// Resolves once every secret has finished its first cycle.
    pub async fn ready(&self) {
        let total = self.secrets.len();
        let mut rx = self.ready_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|done| *done >= total).await;
    }

    /// Whether every secret has finished its first cycle.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.started && *self.ready_tx.borrow() >= self.secrets.len()
    }

    /// Cancel timers and in-flight fetches, then wait for the loops to end.
    /// Loops still running after the shutdown timeout are aborted.
    pub async fn stop(&mut self) {
        let aborted = self.coordinator.shutdown(self.options.shutdown_timeout).await;
        if aborted > 0 {
            warn!(aborted, "Refresh loops aborted after shutdown timeout");
        }
        for status in self.statuses.write().values_mut() {
            status.state = CycleState::Stopped;
        }
    }

    /// Status of one secret.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<SecretStatus> {
        self.statuses.read().get(name).cloned()
    }

    /// Status of every secret, in declaration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(String, SecretStatus)> {
        let statuses = self.statuses.read();
        self.secrets
            .iter()
            .filter_map(|s| statuses.get(&s.name).map(|st| (s.name.clone(), st.clone())))
            .collect()
    }

    /// Run a single cycle for `secret` outside the refresh loops.
    ///
    /// # Errors
    ///
    /// Returns the [`CycleError`] of the failed stage.
    pub async fn run_cycle(&self, secret: &Secret) -> Result<CycleReport, CycleError> {
        let worker = self.worker(&Arc::new(secret.clone()));
        let mut signal = self.coordinator.subscribe();
        let result = worker.cycle(&mut signal).await;
        worker.record(&result);
        result
    }

    /// Run one cycle for every secret concurrently and return the results in
    /// declaration order.
    pub async fn run_once(&self) -> Vec<(String, Result<CycleReport, CycleError>)> {
        let handles: Vec<_> = self
            .secrets
            .iter()
            .map(|secret| {
                let worker = self.worker(secret);
                let mut signal = self.coordinator.subscribe();
                tokio::spawn(async move {
                    let result = worker.cycle(&mut signal).await;
                    worker.record(&result);
                    result
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (secret, handle) in self.secrets.iter().zip(handles) {
            let result = handle.await.unwrap_or_else(|e| {
                error!(secret = %secret.name, error = %e, "Cycle task panicked");
                let err = CycleError::Panicked(e.to_string());
                self.record_panic(&secret.name, &err);
                Err(err)
            });
            results.push((secret.name.clone(), result));
        }
        results
    }

    fn record_panic(&self, name: &str, err: &CycleError) {
        let mut statuses = self.statuses.write();
        let status = statuses.entry(name.to_string()).or_default();
        status.state = CycleState::Idle;
        status.cycles += 1;
        status.last_error = Some(err.to_string());
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
    }

    fn worker(&self, secret: &Arc<Secret>) -> SecretWorker {
        SecretWorker {
            renderer: SecretRenderer::new(secret),
            secret: Arc::clone(secret),
            store: Arc::clone(&self.store),
            materializer: self.materializer.clone(),
            namespace: secret.resolve_namespace(&self.options.global_namespace).to_string(),
            statuses: Arc::clone(&self.statuses),
        }
    }
}

/// Counts a secret towards readiness exactly once: after its first cycle, or
/// when its loop ends without one (shutdown during the initial delay, panic).
struct FirstCycle {
    secret: String,
    ready: Arc<watch::Sender<usize>>,
    done: bool,
}

impl FirstCycle {
    fn new(secret: &str, ready: Arc<watch::Sender<usize>>) -> Self {
        Self {
            secret: secret.to_string(),
            ready,
            done: false,
        }
    }

    fn complete(&mut self) {
        if !self.done {
            self.done = true;
            self.ready.send_modify(|count| *count += 1);
        }
    }
}

impl Drop for FirstCycle {
    fn drop(&mut self) {
        if !self.done {
            warn!(secret = %self.secret, "Refresh loop ended before its first cycle");
            self.complete();
        }
    }
}

struct SecretWorker {
    secret: Arc<Secret>,
    renderer: Result<SecretRenderer, RenderError>,
    store: Arc<dyn SecretStore>,
    materializer: FileMaterializer,
    namespace: String,
    statuses: StatusMap,
}

impl SecretWorker {
    async fn run(self, mut signal: ShutdownSignal, initial_delay: Duration, mut first_cycle: FirstCycle) {
        let name = self.secret.name.as_str();

        if !initial_delay.is_zero() {
            tokio::select! {
                biased;
                () = signal.cancelled() => {
                    first_cycle.complete();
                    self.set_state(CycleState::Stopped);
                    return;
                }
                () = tokio::time::sleep(initial_delay) => {}
            }
        }

        let period = self.secret.refresh_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let result = self.cycle(&mut signal).await;
            self.record(&result);
            first_cycle.complete();
            if matches!(result, Err(CycleError::Cancelled)) {
                break;
            }

            tokio::select! {
                biased;
                () = signal.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        debug!(secret = name, "Refresh loop stopped");
        self.set_state(CycleState::Stopped);
    }

    async fn cycle(&self, signal: &mut ShutdownSignal) -> Result<CycleReport, CycleError> {
        let request = self.secret.fetch_request(&self.namespace);

        self.set_state(CycleState::Fetching);
        let fetched = tokio::select! {
            biased;
            () = signal.cancelled() => return Err(CycleError::Cancelled),
            result = self.store.fetch(&request) => result?,
        };

        self.set_state(CycleState::Rendering);
        let renderer = self.renderer.as_ref().map_err(Clone::clone)?;
        let files = renderer.render(&fetched)?;

        self.set_state(CycleState::Writing);
        let (files_changed, files_unchanged) = self.write_all(files).await?;

        Ok(CycleReport {
            version: fetched.version,
            files_changed,
            files_unchanged,
        })
    }

    // Every file is attempted; the first failure is reported.
    async fn write_all(&self, files: Vec<RenderedFile>) -> Result<(usize, usize), CycleError> {
        let materializer = self.materializer.clone();
        let results = tokio::task::spawn_blocking(move || {
            files
                .iter()
                .map(|file| materializer.write(file))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| CycleError::WriteTask(e.to_string()))?;

        let total = results.len();
        let (mut changed, mut unchanged, mut failed) = (0, 0, 0);
        let mut first_error = None;
        for result in results {
            match result {
                Ok(true) => changed += 1,
                Ok(false) => unchanged += 1,
                Err(e) => {
                    error!(
                        secret = %self.secret.name,
                        path = %e.path().display(),
                        stage = "write",
                        error = %e,
                        "Failed to write file"
                    );
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(first) => Err(CycleError::Write { first, failed, total }),
            None => Ok((changed, unchanged)),
        }
    }

    fn set_state(&self, state: CycleState) {
        if let Some(status) = self.statuses.write().get_mut(&self.secret.name) {
            status.state = state;
        }
    }

    fn record(&self, result: &Result<CycleReport, CycleError>) {
        let name = self.secret.name.as_str();
        match result {
            Ok(report) if report.files_changed > 0 => info!(
                secret = name,
                version = %report.version,
                changed = report.files_changed,
                unchanged = report.files_unchanged,
                "Secret refreshed"
            ),
            Ok(report) => debug!(
                secret = name,
                version = %report.version,
                changed = 0,
                "Secret unchanged"
            ),
            Err(CycleError::Cancelled) => debug!(secret = name, "Cycle cancelled"),
            Err(CycleError::Fetch(e)) if e.kind() == FetchErrorKind::NotFound => warn!(
                secret = name,
                path = %self.secret.key,
                stage = "fetch",
                error = %e,
                "Secret not found, leaving files untouched"
            ),
            Err(e) => error!(
                secret = name,
                path = %self.secret.key,
                stage = e.stage().map_or("unknown", |s| s.as_str()),
                error = %e,
                "Refresh cycle failed"
            ),
        }

        let mut statuses = self.statuses.write();
        let status = statuses.entry(name.to_string()).or_default();
        status.state = CycleState::Idle;
        match result {
            Ok(report) => {
                status.cycles += 1;
                status.last_version = Some(report.version);
                status.last_success = Some(Utc::now());
                status.last_error = None;
                status.consecutive_failures = 0;
                status.files_written += report.files_changed as u64;
            }
            Err(CycleError::Cancelled) => {}
            Err(e) => {
                status.cycles += 1;
                status.last_error = Some(e.to_string());
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            }
        }
    }
}
