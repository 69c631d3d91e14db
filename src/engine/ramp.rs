//! Worker pool supervision and staged concurrency ramps.

use super::worker::{spawn_worker, WorkerEnv, WorkerHandle};
use crate::domain::Stage;
use std::sync::Arc;
use tracing::debug;

/// Owns the live workers of one run and adjusts their count toward a target.
///
/// Growing spawns fresh workers; shrinking retires the newest ones
/// cooperatively, so an in-flight request always finishes and is recorded.
pub(crate) struct WorkerPool {
    env: Arc<WorkerEnv>,
    workers: Vec<WorkerHandle>,
    /// Monotonic across respawns so derived rng seeds never repeat within a
    /// run.
    next_index: usize,
}

impl WorkerPool {
    pub fn new(env: Arc<WorkerEnv>) -> Self {
        Self {
            env,
            workers: Vec::new(),
            next_index: 0,
        }
    }

    pub fn resize(&mut self, target: usize) {
        while self.workers.len() < target {
            let handle = spawn_worker(&self.env, self.next_index);
            self.next_index += 1;
            self.workers.push(handle);
        }
        while self.workers.len() > target {
            if let Some(worker) = self.workers.pop() {
                worker.retire();
                // The task unregisters itself from the live count when its
                // current request completes; no join needed here.
            }
        }
    }

    pub fn retire_all(&self) {
        for worker in &self.workers {
            worker.retire();
        }
    }

    /// Await every worker the pool still tracks. Retired workers that
    /// already exited resolve immediately.
    pub async fn join(self) {
        futures::future::join_all(self.workers.into_iter().map(WorkerHandle::join)).await;
    }
}

/// Flat concurrency: spawn the full worker count at once and let the run
/// deadline (or a stop) end them.
pub(crate) async fn run_flat(env: Arc<WorkerEnv>, vus: usize) {
    let mut pool = WorkerPool::new(env);
    pool.resize(vus);
    pool.join().await;
}

/// Staged ramp: step the live worker count toward each stage's target, hold
/// for the stage duration, then move on. After the final stage every
/// remaining worker is signalled inactive and awaited before the caller
/// finalizes the report.
pub(crate) async fn run_ramped(env: Arc<WorkerEnv>, stages: &[Stage]) {
    let mut pool = WorkerPool::new(env);
    for stage in stages {
        if !pool.env.run.is_live() {
            break;
        }
        debug!(
            target_vus = stage.target_vus,
            hold_ms = stage.duration.as_millis() as u64,
            "entering ramp stage"
        );
        pool.resize(stage.target_vus);
        tokio::time::sleep(stage.duration).await;
    }
    pool.retire_all();
    pool.join().await;
}
