use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Attribute value types for record metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Log severity, numbered as in the OpenTelemetry log data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// OpenTelemetry `SeverityNumber` for the first level of this range.
    pub fn number(self) -> u8 {
        match self {
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warn => "Warn",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
        }
    }
}

/// Attributes describing the emitting entity, shared by every record of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub attributes: BTreeMap<String, String>,
}

impl Resource {
    pub fn new(attributes: BTreeMap<String, String>) -> Self {
        Self { attributes }
    }
}

/// A single synthetic log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Resource attributes, copied from the run-level resource
    pub resource: BTreeMap<String, String>,
    /// Emission time (Unix nanoseconds)
    pub time_unix_nano: u64,
    /// Observation time (Unix nanoseconds); generated records use the
    /// emission time
    pub observed_time_unix_nano: u64,
    pub severity_number: u8,
    pub severity_text: String,
    pub dropped_attributes_count: u32,
    /// Record-scoped attributes
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Batch of records for export
#[derive(Debug, Clone)]
pub struct LogBatch {
    /// All records in this batch
    pub records: Vec<LogRecord>,
    /// Batch creation timestamp
    pub timestamp: SystemTime,
}

impl LogBatch {
    /// Creates a new empty batch
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a batch holding a single record
    pub fn single(record: LogRecord) -> Self {
        Self {
            records: vec![record],
            timestamp: SystemTime::now(),
        }
    }

    pub fn add(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for LogBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the records emitted by workers.
///
/// Every record carries a verbatim copy of the resource attributes, the
/// emission timestamp, severity `Info`, a dropped-attribute count of 1 (marks
/// the data as synthetic) and the configured record attributes.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    resource: Arc<Resource>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl RecordBuilder {
    pub fn new(resource: Arc<Resource>, attributes: BTreeMap<String, AttributeValue>) -> Self {
        Self {
            resource,
            attributes,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Builds one record stamped with `timestamp`.
    pub fn build(&self, timestamp: SystemTime) -> LogRecord {
        let time_unix_nano = unix_nanos(timestamp);
        LogRecord {
            resource: self.resource.attributes.clone(),
            time_unix_nano,
            observed_time_unix_nano: time_unix_nano,
            severity_number: Severity::Info.number(),
            severity_text: Severity::Info.text().to_string(),
            dropped_attributes_count: 1,
            attributes: self.attributes.clone(),
        }
    }

    /// Builds one record stamped with the current wall-clock time.
    pub fn build_now(&self) -> LogRecord {
        self.build(SystemTime::now())
    }
}

/// Default record-scoped attributes.
pub fn default_record_attributes() -> BTreeMap<String, AttributeValue> {
    BTreeMap::from([("app".to_string(), AttributeValue::from("server"))])
}

fn unix_nanos(t: SystemTime) -> u64 {
    // Clocks set before the epoch clamp to zero rather than failing the run.
    t.duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
