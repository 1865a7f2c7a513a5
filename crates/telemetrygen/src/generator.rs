//! Run orchestration.
//!
//! [`Generator::run`] validates the configuration, spawns one task per worker
//! into a `JoinSet` and joins every one of them before returning:
//!
//! - **Count-bounded** runs join immediately; workers stop on their own.
//! - **Duration-bounded** runs sleep once for the full duration, clear the
//!   stop flag, then join. Workers finish the emission they are in.
//! - On the **first fatal error** the run is aborted (stop flag cleared and
//!   pending token waits cancelled), the remaining workers are still joined,
//!   and that first error is returned.

use crate::config::{GenerationConfig, Termination};
use crate::error::GenerateError;
use crate::rate_limiter::{RateLimit, TokenBucketLimiter};
use crate::record::{RecordBuilder, Resource};
use crate::sink::LogSinkBoxed;
use crate::state::RunState;
use crate::worker::{Worker, WorkerStats};
use serde::{Deserialize, Serialize};
use std::future::{self, Future};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, Instrument};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub termination: Termination,
    pub rate: RateLimit,
    /// Per-worker results, ordered by worker index.
    pub workers: Vec<WorkerStats>,
    pub total_records: u64,
    pub elapsed: Duration,
    /// `true` if an external shutdown ended the run before its natural end.
    pub stopped_early: bool,
}

impl RunReport {
    pub fn aggregate_rate(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.total_records as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Drives one generation run against a sink.
pub struct Generator {
    config: GenerationConfig,
    sink: Arc<dyn LogSinkBoxed>,
}

impl Generator {
    pub fn new(config: GenerationConfig, sink: Arc<dyn LogSinkBoxed>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Runs to completion.
    pub async fn run(&self) -> Result<RunReport, GenerateError> {
        self.run_until(future::pending()).await
    }

    /// Runs to completion or until `shutdown` resolves, whichever comes
    /// first. A shutdown stops workers gracefully and still yields a report.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunReport, GenerateError>
    where
        F: Future<Output = ()>,
    {
        let plan = self.config.plan()?;

        match plan.rate {
            RateLimit::Unlimited => info!("generation of logs isn't being throttled"),
            RateLimit::PerSecond(per_second) => {
                info!(per_second, "generation of logs is limited");
            }
        }

        let state = Arc::new(RunState::new());
        let resource = Arc::new(Resource::new(self.config.resource_attributes.clone()));
        let builder = Arc::new(RecordBuilder::new(
            resource,
            self.config.record_attributes.clone(),
        ));

        let start = Instant::now();
        let mut workers: JoinSet<Result<WorkerStats, GenerateError>> = JoinSet::new();
        for (index, quota) in plan.quotas.iter().copied().enumerate() {
            let worker = Worker::new(
                index,
                quota,
                TokenBucketLimiter::new(plan.rate),
                Arc::clone(&builder),
                Arc::clone(&self.sink),
                Arc::clone(&state),
            );
            workers.spawn(worker.run().instrument(info_span!("worker", index)));
        }
        debug!(workers = workers.len(), sink = self.sink.name(), "workers started");

        let deadline = match plan.termination {
            Termination::Duration(d) => Some(d),
            Termination::Count(_) => None,
        };
        let timer = async move {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(timer);
        tokio::pin!(shutdown);

        let mut timer_fired = false;
        let mut shutdown_fired = false;
        let mut stopped_early = false;
        let mut stats = Vec::with_capacity(plan.workers());
        let mut first_error: Option<GenerateError> = None;

        loop {
            tokio::select! {
                () = &mut timer, if !timer_fired => {
                    timer_fired = true;
                    state.stop();
                    debug!("duration elapsed, stopping workers");
                }
                () = &mut shutdown, if !shutdown_fired => {
                    shutdown_fired = true;
                    if state.stop() {
                        stopped_early = true;
                        info!("shutdown requested, stopping workers");
                    }
                }
                joined = workers.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    match joined.map_err(panicked) {
                        Ok(Ok(worker_stats)) => stats.push(worker_stats),
                        Ok(Err(e)) | Err(e) => {
                            if first_error.is_none() {
                                error!(error = %e, "worker failed, aborting run");
                                state.abort();
                                first_error = Some(e);
                            } else {
                                debug!(error = %e, "worker ended after abort");
                            }
                        }
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        stats.sort_by_key(|s| s.worker);
        let total_records = stats.iter().map(|s| s.records).sum();
        let elapsed = start.elapsed();
        info!(
            records = total_records,
            elapsed_ms = elapsed.as_millis() as u64,
            "generation complete"
        );

        Ok(RunReport {
            termination: plan.termination,
            rate: plan.rate,
            workers: stats,
            total_records,
            elapsed,
            stopped_early,
        })
    }
}

fn panicked(e: JoinError) -> GenerateError {
    GenerateError::WorkerPanicked(e.to_string())
}
