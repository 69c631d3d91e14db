//! One virtual user's request/sleep cycle.

use super::invoker::HttpInvoker;
use super::journey;
use super::metrics::Metrics;
use super::RunState;
use crate::domain::{ThinkTime, Workload};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything a run's workers share: the pooled invoker, the metrics
/// aggregator, the run's liveness state, and what to do each iteration.
pub(crate) struct WorkerEnv {
    pub invoker: Arc<HttpInvoker>,
    pub metrics: Arc<Metrics>,
    pub run: Arc<RunState>,
    pub workload: Workload,
    pub think_time: ThinkTime,
    pub seed: Option<u64>,
}

/// A spawned worker plus its cooperative retirement flag. Flipping `active`
/// lets the worker finish its in-flight request and exit at the next loop
/// boundary; nothing is aborted mid-request.
pub(crate) struct WorkerHandle {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn retire(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

pub(crate) fn spawn_worker(env: &Arc<WorkerEnv>, index: usize) -> WorkerHandle {
    let active = Arc::new(AtomicBool::new(true));
    // Derived seeds keep every worker's stream distinct while the whole run
    // stays reproducible from one configured seed.
    let rng = match env.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => StdRng::from_entropy(),
    };

    env.run.worker_started();
    let handle = tokio::spawn(worker_loop(Arc::clone(env), Arc::clone(&active), rng));
    WorkerHandle { active, handle }
}

async fn worker_loop(env: Arc<WorkerEnv>, active: Arc<AtomicBool>, mut rng: StdRng) {
    while active.load(Ordering::Relaxed) && env.run.is_live() {
        match &env.workload {
            Workload::Endpoints(endpoints) => {
                let Some(endpoint) = endpoints.choose(&mut rng) else {
                    break;
                };
                // Generators resolve here, per iteration, so every hit gets
                // fresh randomized values.
                let request = endpoint.resolve(&mut rng);
                let outcome = env.invoker.invoke(&request).await;
                env.metrics.record(&request.path, &outcome);
            }
            Workload::Journey(kind) => {
                journey::run_session(&env, *kind, &mut rng, &active).await;
            }
        }

        let pause = env.think_time.sample(&mut rng);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
            // Deadline or stop may have hit while sleeping; the loop
            // condition re-checks before dispatching anything new.
        }
    }
    env.run.worker_finished();
}
