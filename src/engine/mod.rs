//! The load-generation engine: orchestration, workers, metrics.
//!
//! The orchestrator owns an explicit run registry (scenario id → run state)
//! and an explicit invoker built from config — no process-wide mutable
//! globals — so distinct scenarios can run concurrently and tests can build
//! isolated engines. A single-test-at-a-time policy, if wanted, belongs to
//! the caller.

pub mod classify;
pub mod invoker;
pub mod journey;
pub mod metrics;
pub mod ramp;
pub mod worker;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::domain::{LoadShape, Scenario};
use crate::report::{Report, ReportStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub use invoker::{HttpInvoker, Outcome};
pub use metrics::{FailureSample, Metrics, Snapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("scenario `{0}` is already running")]
    AlreadyRunning(String),

    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
}

/// Active runs, shared between the orchestrator and each run's driver task
/// (which removes its own entry on completion).
type RunRegistry = Arc<Mutex<HashMap<String, Arc<RunState>>>>;

/// Mutable state of one active scenario run. Exists only while the scenario
/// executes; dropped from the registry on completion.
pub struct RunState {
    pub run_id: Uuid,
    pub scenario_id: String,
    running: AtomicBool,
    started: Instant,
    deadline: Instant,
    started_at: DateTime<Utc>,
    live_workers: AtomicUsize,
    metrics: Arc<Metrics>,
}

impl RunState {
    fn new(scenario_id: &str, total: Duration) -> Self {
        let now = Instant::now();
        Self {
            run_id: Uuid::new_v4(),
            scenario_id: scenario_id.to_string(),
            running: AtomicBool::new(true),
            started: now,
            deadline: now + total,
            started_at: Utc::now(),
            live_workers: AtomicUsize::new(0),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Whether workers may dispatch new requests: the stop flag is clear and
    /// the wall-clock deadline has not passed. Polled at loop boundaries —
    /// cancellation is cooperative, nothing in flight is aborted.
    pub fn is_live(&self) -> bool {
        self.running.load(Ordering::Relaxed) && Instant::now() < self.deadline
    }

    pub fn halt(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.metrics.snapshot(self.elapsed())
    }

    pub(crate) fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_finished(&self) {
        self.live_workers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Receives the live snapshot on a fixed interval while a run is active.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, scenario_id: &str, live_workers: usize, snapshot: &Snapshot);
}

/// Default sink: structured log lines.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, scenario_id: &str, live_workers: usize, snapshot: &Snapshot) {
        info!(
            scenario = scenario_id,
            vus = live_workers,
            total = snapshot.total,
            failed = snapshot.failed,
            expected = snapshot.expected_errors,
            rps = format_args!("{:.1}", snapshot.rps),
            p95_ms = snapshot.p95_ms,
            "progress"
        );
    }
}

/// Per-start overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOptions {
    pub vus: Option<usize>,
    pub seed: Option<u64>,
}

/// Handle to a dispatched run.
pub struct RunHandle {
    state: Arc<RunState>,
    driver: JoinHandle<()>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.state.run_id)
            .field("scenario_id", &self.state.scenario_id)
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    pub fn state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    /// Await natural completion (deadline, stages exhausted, or stop); the
    /// final report has been persisted when this returns.
    pub async fn wait(self) {
        let _ = self.driver.await;
    }
}

pub struct Orchestrator {
    catalog: Catalog,
    invoker: Arc<HttpInvoker>,
    store: Arc<dyn ReportStore>,
    progress: Arc<dyn ProgressSink>,
    progress_interval: Duration,
    default_seed: Option<u64>,
    runs: RunRegistry,
}

impl Orchestrator {
    pub fn new(
        cfg: &Config,
        catalog: Catalog,
        store: Arc<dyn ReportStore>,
        progress: Arc<dyn ProgressSink>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            catalog,
            invoker: Arc::new(HttpInvoker::new(cfg)?),
            store,
            progress,
            progress_interval: Duration::from_secs(cfg.engine.progress_interval_seconds.max(1)),
            default_seed: cfg.engine.seed,
            runs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Start a scenario. Rejects an id that already has an active run without
    /// touching its state; the registry check-and-insert happens under one
    /// lock, so two racing starts cannot both win.
    pub fn start(&self, scenario_id: &str, opts: RunOptions) -> Result<RunHandle, EngineError> {
        let scenario = self
            .catalog
            .scenario(scenario_id)
            .ok_or_else(|| EngineError::UnknownScenario(scenario_id.to_string()))?
            .clone();

        let state = {
            let mut runs = self.runs.lock();
            if runs.contains_key(scenario_id) {
                return Err(EngineError::AlreadyRunning(scenario_id.to_string()));
            }
            let state = Arc::new(RunState::new(scenario_id, scenario.shape.total_duration()));
            runs.insert(scenario_id.to_string(), Arc::clone(&state));
            state
        };

        let vus = opts.vus.unwrap_or(scenario.default_vus);
        let seed = opts.seed.or(self.default_seed);

        info!(
            scenario = scenario_id,
            run_id = %state.run_id,
            vus,
            duration_ms = scenario.shape.total_duration().as_millis() as u64,
            seed,
            "starting run"
        );

        let driver = tokio::spawn(drive(DriverContext {
            registry: Arc::clone(&self.runs),
            invoker: Arc::clone(&self.invoker),
            store: Arc::clone(&self.store),
            progress: Arc::clone(&self.progress),
            progress_interval: self.progress_interval,
            scenario,
            state: Arc::clone(&state),
            vus,
            seed,
        }));

        Ok(RunHandle { state, driver })
    }

    /// Clear the run's flag and return its current snapshot. No new requests
    /// dispatch after this returns; in-flight ones finish and are recorded,
    /// and the driver still persists a partial report.
    pub fn stop(&self, scenario_id: &str) -> Option<Snapshot> {
        let state = self.runs.lock().get(scenario_id).cloned()?;
        state.halt();
        info!(scenario = scenario_id, run_id = %state.run_id, "stop requested");
        Some(state.snapshot())
    }

    pub fn stop_all(&self) {
        for state in self.runs.lock().values() {
            state.halt();
        }
    }

    /// The last persisted report for the scenario; `None` if it has never
    /// completed a run. Store failures are logged and treated as no data —
    /// this call never errors.
    pub async fn report(&self, scenario_id: &str) -> Option<Report> {
        match self.store.load(scenario_id).await {
            Ok(report) => report,
            Err(err) => {
                warn!(scenario = scenario_id, error = %err, "report lookup failed");
                None
            }
        }
    }

    pub fn run_state(&self, scenario_id: &str) -> Option<Arc<RunState>> {
        self.runs.lock().get(scenario_id).cloned()
    }

    pub fn active_scenarios(&self) -> Vec<String> {
        self.runs.lock().keys().cloned().collect()
    }
}

struct DriverContext {
    registry: RunRegistry,
    invoker: Arc<HttpInvoker>,
    store: Arc<dyn ReportStore>,
    progress: Arc<dyn ProgressSink>,
    progress_interval: Duration,
    scenario: Scenario,
    state: Arc<RunState>,
    vus: usize,
    seed: Option<u64>,
}

/// Owns one run from dispatch to persisted report.
async fn drive(ctx: DriverContext) {
    let DriverContext {
        registry,
        invoker,
        store,
        progress,
        progress_interval,
        scenario,
        state,
        vus,
        seed,
    } = ctx;

    let env = Arc::new(worker::WorkerEnv {
        invoker: Arc::clone(&invoker),
        metrics: Arc::clone(&state.metrics),
        run: Arc::clone(&state),
        workload: scenario.workload.clone(),
        think_time: scenario.think_time,
        seed,
    });

    let ticker = tokio::spawn(progress_loop(
        Arc::clone(&state),
        progress,
        progress_interval,
    ));

    match &scenario.shape {
        LoadShape::Flat { .. } => ramp::run_flat(env, vus).await,
        LoadShape::Ramp { stages } => ramp::run_ramped(env, stages).await,
    }

    state.halt();
    ticker.abort();
    let _ = ticker.await;

    let snapshot = state.snapshot();
    let report = Report::from_run(
        &state.scenario_id,
        invoker.base_url(),
        scenario.shape.peak_vus(vus),
        state.started_at,
        &snapshot,
    );
    if let Err(err) = store.save(&report).await {
        warn!(scenario = %state.scenario_id, error = %err, "failed to persist report");
    }

    registry.lock().remove(&state.scenario_id);
    info!(
        scenario = %state.scenario_id,
        run_id = %state.run_id,
        total = snapshot.total,
        failed = snapshot.failed,
        error_rate = format_args!("{:.4}", snapshot.error_rate),
        p95_ms = snapshot.p95_ms,
        "run complete"
    );
}

async fn progress_loop(state: Arc<RunState>, sink: Arc<dyn ProgressSink>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so consumers only see
    // snapshots with some data behind them.
    interval.tick().await;
    loop {
        interval.tick().await;
        if !state.is_live() {
            break;
        }
        sink.on_progress(&state.scenario_id, state.live_workers(), &state.snapshot());
    }
}
