//! Generation parameters and their resolution into a run plan.

use crate::error::ConfigError;
use crate::rate_limiter::RateLimit;
use crate::record::{default_record_attributes, AttributeValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How a record count is spread over the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSplit {
    /// The count is the run total, divided as evenly as possible.
    #[default]
    Divide,
    /// Every worker emits the full count (total = count × workers).
    PerWorker,
}

/// Parameters of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Number of records to emit. `0` leaves termination to `duration`.
    ///
    /// Default: 0
    pub num_records: u64,

    /// How long to run. Takes precedence over `num_records` when non-zero.
    ///
    /// Default: 0
    pub duration: Duration,

    /// Number of concurrent workers.
    ///
    /// Default: 1
    pub workers: usize,

    /// Records per second, per worker. `0` means unlimited.
    ///
    /// Default: 0
    pub rate_per_sec: f64,

    /// Attributes describing the emitting entity, copied onto every record.
    pub resource_attributes: BTreeMap<String, String>,

    /// Record-scoped attributes.
    ///
    /// Default: `app=server`
    pub record_attributes: BTreeMap<String, AttributeValue>,

    /// Default: [`CountSplit::Divide`]
    pub count_split: CountSplit,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_records: 0,
            duration: Duration::ZERO,
            workers: 1,
            rate_per_sec: 0.0,
            resource_attributes: BTreeMap::new(),
            record_attributes: default_record_attributes(),
            count_split: CountSplit::Divide,
        }
    }
}

impl GenerationConfig {
    /// A count-bounded run.
    pub fn count(num_records: u64) -> Self {
        Self {
            num_records,
            ..Self::default()
        }
    }

    /// A duration-bounded run.
    pub fn timed(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_num_records(mut self, num_records: u64) -> Self {
        self.num_records = num_records;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_rate(mut self, rate_per_sec: f64) -> Self {
        self.rate_per_sec = rate_per_sec;
        self
    }

    pub fn with_resource_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_record_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.record_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_count_split(mut self, split: CountSplit) -> Self {
        self.count_split = split;
        self
    }

    /// Validates the parameters and resolves the termination policy, the
    /// effective rate and the per-worker quotas.
    pub fn plan(&self) -> Result<RunPlan, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        // A positive rate must resolve to a non-zero permit period.
        if !self.rate_per_sec.is_finite()
            || self.rate_per_sec < 0.0
            || (self.rate_per_sec > 0.0 && RateLimit::PerSecond(self.rate_per_sec).period().is_none())
        {
            return Err(ConfigError::InvalidRate(self.rate_per_sec));
        }

        let termination = if !self.duration.is_zero() {
            // Duration wins; any configured count is ignored.
            Termination::Duration(self.duration)
        } else if self.num_records > 0 {
            Termination::Count(self.num_records)
        } else {
            return Err(ConfigError::NothingToGenerate);
        };

        let quotas = match termination {
            Termination::Duration(_) => vec![RecordQuota::Unbounded; self.workers],
            Termination::Count(total) => split_count(total, self.workers, self.count_split),
        };

        Ok(RunPlan {
            termination,
            rate: RateLimit::from_rate(self.rate_per_sec),
            quotas,
        })
    }
}

/// What ends a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Workers stop on their own after emitting their quota.
    Count(u64),
    /// The orchestrator stops all workers once the duration has elapsed.
    Duration(Duration),
}

/// A worker's share of the records to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordQuota {
    /// Never self-terminate; the stop flag governs.
    Unbounded,
    /// Stop after this many records. `Limited(0)` emits nothing.
    Limited(u64),
}

impl RecordQuota {
    #[inline]
    pub fn is_reached(self, emitted: u64) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Limited(n) => emitted >= n,
        }
    }
}

/// Resolved, validated form of a [`GenerationConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub termination: Termination,
    pub rate: RateLimit,
    /// One entry per worker, indexed by worker id.
    pub quotas: Vec<RecordQuota>,
}

impl RunPlan {
    pub fn workers(&self) -> usize {
        self.quotas.len()
    }

    /// Effective record count handed to workers; `0` for duration runs.
    pub fn effective_count(&self) -> u64 {
        match self.termination {
            Termination::Count(n) => n,
            Termination::Duration(_) => 0,
        }
    }

    /// Total records the run will emit, if bounded. Saturates at `u64::MAX`.
    pub fn expected_total(&self) -> Option<u64> {
        self.quotas.iter().try_fold(0u64, |acc, quota| match quota {
            RecordQuota::Unbounded => None,
            RecordQuota::Limited(n) => Some(acc.saturating_add(*n)),
        })
    }
}

fn split_count(total: u64, workers: usize, split: CountSplit) -> Vec<RecordQuota> {
    match split {
        CountSplit::PerWorker => vec![RecordQuota::Limited(total); workers],
        CountSplit::Divide => {
            let w = workers as u64;
            let (base, remainder) = (total / w, total % w);
            (0..w)
                .map(|i| RecordQuota::Limited(base + u64::from(i < remainder)))
                .collect()
        }
    }
}

/// Parses a human duration such as `250ms`, `30s`, `5m`, `1h` or a bare
/// number of seconds. `0` is accepted and means "no duration".
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let (number, unit_secs) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1.0)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60.0)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(value * unit_secs).map_err(|_| invalid())
}

/// Parses a `key=value` attribute. Surrounding double quotes on the value are
/// stripped, so `service.name="checkout"` and `service.name=checkout` agree.
pub fn parse_attribute(s: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidAttribute(s.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidAttribute(s.to_string()));
    }
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Ok((key.to_string(), value.to_string()))
}
