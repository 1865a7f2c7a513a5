//! A single generation worker.
//!
//! Each worker runs the loop **check stop → acquire token → build → export →
//! count** until either the shared stop flag is cleared or its quota is
//! reached. Any export or pacing failure is fatal: the worker logs it and
//! returns the error from its task instead of carrying on.

use crate::config::RecordQuota;
use crate::error::{GenerateError, PacingError};
use crate::rate_limiter::RateLimiter;
use crate::record::{LogBatch, RecordBuilder};
use crate::sink::LogSinkBoxed;
use crate::state::RunState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Final counters of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker: usize,
    pub records: u64,
    pub elapsed: Duration,
    pub target_rate: Option<f64>,
}

impl WorkerStats {
    pub fn effective_rate(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.records as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

pub struct Worker<L> {
    index: usize,
    quota: RecordQuota,
    limiter: L,
    builder: Arc<RecordBuilder>,
    sink: Arc<dyn LogSinkBoxed>,
    state: Arc<RunState>,
}

impl<L: RateLimiter> Worker<L> {
    pub fn new(
        index: usize,
        quota: RecordQuota,
        limiter: L,
        builder: Arc<RecordBuilder>,
        sink: Arc<dyn LogSinkBoxed>,
        state: Arc<RunState>,
    ) -> Self {
        Self {
            index,
            quota,
            limiter,
            builder,
            sink,
            state,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs until stopped or the quota is reached, returning final counters.
    pub async fn run(mut self) -> Result<WorkerStats, GenerateError> {
        let start = Instant::now();
        let target_rate = self.limiter.target_rate();
        let mut emitted = 0u64;

        while self.state.is_running() {
            if self.quota.is_reached(emitted) {
                break;
            }

            let acquired = tokio::select! {
                biased;
                () = self.state.aborted() => Err(PacingError::Cancelled),
                res = self.limiter.acquire() => res,
            };
            if let Err(source) = acquired {
                if source == PacingError::Cancelled && self.state.is_aborted() {
                    debug!(records = emitted, "token wait cancelled by run abort");
                } else {
                    error!(error = %source, records = emitted, "limiter wait failed");
                }
                return Err(GenerateError::Pacing {
                    worker: self.index,
                    source,
                });
            }

            let batch = LogBatch::single(self.builder.build_now());
            if let Err(source) = self.sink.export_boxed(batch).await {
                error!(error = %source, sink = self.sink.name(), records = emitted, "exporter failed");
                return Err(GenerateError::Export {
                    worker: self.index,
                    source,
                });
            }

            emitted += 1;
        }

        debug_assert!(
            match self.quota {
                RecordQuota::Limited(n) => emitted <= n,
                RecordQuota::Unbounded => true,
            },
            "worker {} emitted {} records, over its quota {:?}",
            self.index,
            emitted,
            self.quota
        );

        info!(records = emitted, "logs generated");
        Ok(WorkerStats {
            worker: self.index,
            records: emitted,
            elapsed: start.elapsed(),
            target_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::TokenBucketLimiter;
    use crate::record::{default_record_attributes, Resource};
    use crate::sink::{FailingSink, TestSink};
    use std::collections::BTreeMap;

    fn builder() -> Arc<RecordBuilder> {
        let resource = Resource::new(BTreeMap::from([(
            "service.name".to_string(),
            "worker-test".to_string(),
        )]));
        Arc::new(RecordBuilder::new(Arc::new(resource), default_record_attributes()))
    }

    fn worker(
        quota: RecordQuota,
        limiter: TokenBucketLimiter,
        sink: Arc<dyn LogSinkBoxed>,
        state: Arc<RunState>,
    ) -> Worker<TokenBucketLimiter> {
        Worker::new(0, quota, limiter, builder(), sink, state)
    }

    #[tokio::test]
    async fn test_worker_stops_at_quota() {
        let sink = Arc::new(TestSink::new());
        let state = Arc::new(RunState::new());
        let stats = worker(
            RecordQuota::Limited(5),
            TokenBucketLimiter::unlimited(),
            sink.clone(),
            Arc::clone(&state),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.records, 5);
        assert_eq!(sink.export_calls(), 5);
        assert!(sink.batches().iter().all(|b| b.len() == 1));
        assert!(state.is_running(), "count-bound worker must not touch the stop flag");
    }

    #[tokio::test]
    async fn test_zero_quota_emits_nothing() {
        let sink = Arc::new(TestSink::new());
        let stats = worker(
            RecordQuota::Limited(0),
            TokenBucketLimiter::unlimited(),
            sink.clone(),
            Arc::new(RunState::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.records, 0);
        assert_eq!(sink.export_calls(), 0);
    }

    #[tokio::test]
    async fn test_worker_stops_on_flag() {
        let sink = Arc::new(TestSink::new());
        let state = Arc::new(RunState::new());
        let handle = tokio::spawn(
            worker(
                RecordQuota::Unbounded,
                TokenBucketLimiter::unlimited(),
                sink.clone(),
                Arc::clone(&state),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        state.stop();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();
        assert!(stats.records > 0);
        assert_eq!(stats.records as usize, sink.export_calls());
    }

    #[tokio::test]
    async fn test_stopped_before_start_emits_nothing() {
        let sink = Arc::new(TestSink::new());
        let state = Arc::new(RunState::new());
        state.stop();

        let stats = worker(RecordQuota::Unbounded, TokenBucketLimiter::unlimited(), sink.clone(), state)
            .run()
            .await
            .unwrap();
        assert_eq!(stats.records, 0);
    }

    #[tokio::test]
    async fn test_export_failure_is_fatal() {
        let sink = Arc::new(FailingSink::new(2));
        let err = worker(
            RecordQuota::Limited(10),
            TokenBucketLimiter::unlimited(),
            sink.clone(),
            Arc::new(RunState::new()),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, GenerateError::Export { worker: 0, .. }));
        assert_eq!(sink.attempts(), 3, "no export attempted after the failure");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_cancels_token_wait() {
        let sink = Arc::new(TestSink::new());
        let state = Arc::new(RunState::new());
        // One record per minute: the second acquire parks for a long time
        let handle = tokio::spawn(
            worker(
                RecordQuota::Unbounded,
                TokenBucketLimiter::from_rate(1.0 / 60.0),
                sink.clone(),
                Arc::clone(&state),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.export_calls(), 1);

        state.abort();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(sink.export_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_worker_spacing() {
        let sink = Arc::new(TestSink::new());
        let start = tokio::time::Instant::now();
        let stats = worker(
            RecordQuota::Limited(5),
            TokenBucketLimiter::from_rate(10.0),
            sink.clone(),
            Arc::new(RunState::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(stats.records, 5);
        assert_eq!(stats.target_rate, Some(10.0));
        // Five permits at 100ms spacing, the first immediate
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(400));
    }

    #[test]
    fn test_effective_rate() {
        let stats = WorkerStats {
            worker: 1,
            records: 50,
            elapsed: Duration::from_secs(2),
            target_rate: None,
        };
        assert_eq!(stats.effective_rate(), 25.0);

        let idle = WorkerStats {
            elapsed: Duration::ZERO,
            ..stats
        };
        assert_eq!(idle.effective_rate(), 0.0);
    }
}
