//! Synthetic Log Load Generator
//!
//! Produces a configurable volume of log records at a bounded rate, for a
//! bounded duration or a bounded count, and delivers them to a pluggable sink.
//!
//! # Architecture
//!
//! - **Workers**: N independent Tokio tasks, each owning a burst-1 token
//!   bucket, looping *acquire → build → export* until told to stop
//! - **Run state**: one atomic stop flag written only by the orchestrator,
//!   plus an abort signal used to cancel token waits on a fatal error
//! - **Orchestrator**: [`Generator`] spawns the pool into a `JoinSet`, stops it
//!   on a timer for duration runs, and joins every worker before returning
//! - **Sinks**: anything implementing [`LogSink`]; a failed export is fatal to
//!   the whole run (no retries, no buffering)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use telemetrygen::{GenerationConfig, Generator, NullSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), telemetrygen::GenerateError> {
//!     let config = GenerationConfig::count(1_000)
//!         .with_workers(4)
//!         .with_rate(50.0)
//!         .with_resource_attribute("service.name", "checkout");
//!
//!     let report = Generator::new(config, Arc::new(NullSink::new())).run().await?;
//!     println!("sent {} records", report.total_records);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod rate_limiter;
pub mod record;
pub mod sink;
pub mod state;
pub mod worker;

pub use config::{
    parse_attribute, parse_duration, CountSplit, GenerationConfig, RecordQuota, RunPlan, Termination,
};
pub use error::{ConfigError, GenerateError, PacingError};
pub use generator::{Generator, RunReport};
pub use rate_limiter::{RateLimit, RateLimiter, RateLimiterBoxed, TokenBucketLimiter};
pub use record::{AttributeValue, LogBatch, LogRecord, RecordBuilder, Resource, Severity};
pub use sink::{ExportError, JsonLinesFileSink, LogSink, LogSinkBoxed, NullSink, StdoutSink};
pub use state::RunState;
pub use worker::{Worker, WorkerStats};
