use crate::record::LogBatch;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Error types for log export operations
#[derive(Debug, Error, Clone)]
pub enum ExportError {
    /// Transport-layer error (network, gRPC, HTTP, file I/O)
    #[error("transport error: {0}")]
    Transport(String),
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Destination for generated log batches.
///
/// Uses native async fn in traits; `Send + Sync` so that every worker can
/// call the same sink through an `Arc` without extra locking.
///
/// # Note on Object Safety
///
/// This trait uses `impl Future` return types which are not object-safe.
/// For dynamic dispatch, use `Arc<dyn LogSinkBoxed>`.
pub trait LogSink: Send + Sync {
    /// Delivers a batch. Failures are returned as-is; there is no retry.
    fn export(&self, batch: LogBatch) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Returns the sink name for debugging.
    fn name(&self) -> &str;
}

/// Object-safe version of LogSink for dynamic dispatch.
pub trait LogSinkBoxed: Send + Sync {
    fn export_boxed(
        &self,
        batch: LogBatch,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    fn name(&self) -> &str;
}

/// Blanket implementation: any LogSink can be used as LogSinkBoxed
impl<T: LogSink> LogSinkBoxed for T {
    fn export_boxed(
        &self,
        batch: LogBatch,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.export(batch))
    }

    fn name(&self) -> &str {
        LogSink::name(self)
    }
}

fn encode_lines(batch: &LogBatch, pretty: bool) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::with_capacity(256 * batch.len());
    for record in &batch.records {
        if pretty {
            serde_json::to_writer_pretty(&mut out, record)
        } else {
            serde_json::to_writer(&mut out, record)
        }
        .map_err(|e| ExportError::Serialization(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Writes each record to stdout as one JSON document per line.
pub struct StdoutSink {
    pretty: bool,
    stdout: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new(pretty: bool) -> Self {
        Self {
            pretty,
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl LogSink for StdoutSink {
    async fn export(&self, batch: LogBatch) -> Result<(), ExportError> {
        let bytes = encode_lines(&batch, self.pretty)?;
        // Held across the write so lines from concurrent workers never interleave.
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(&bytes)
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Appends records to a file as JSON lines.
///
/// The file is opened (created if missing) on the first export and kept open
/// for the lifetime of the sink.
pub struct JsonLinesFileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonLinesFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonLinesFileSink {
    async fn export(&self, batch: LogBatch) -> Result<(), ExportError> {
        let bytes = encode_lines(&batch, false)?;

        let mut guard = self.file.lock().await;
        let mut file = match guard.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| ExportError::Transport(format!("{}: {}", self.path.display(), e)))?,
        };

        file.write_all(&bytes)
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        *guard = Some(file);
        Ok(())
    }

    fn name(&self) -> &str {
        "json_file"
    }
}

/// Null sink that discards all records (for benchmarking)
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for NullSink {
    async fn export(&self, _batch: LogBatch) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Test sink that records every exported batch for verification
#[cfg(test)]
pub struct TestSink {
    batches: std::sync::Mutex<Vec<LogBatch>>,
}

#[cfg(test)]
impl TestSink {
    pub fn new() -> Self {
        Self {
            batches: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn export_calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn exported_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(LogBatch::len).sum()
    }

    pub fn batches(&self) -> Vec<LogBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl LogSink for TestSink {
    async fn export(&self, batch: LogBatch) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Sink that fails every export after `succeed_first` successes
#[cfg(test)]
pub struct FailingSink {
    succeed_first: usize,
    attempts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FailingSink {
    pub fn new(succeed_first: usize) -> Self {
        Self {
            succeed_first,
            attempts: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl LogSink for FailingSink {
    async fn export(&self, _batch: LogBatch) -> Result<(), ExportError> {
        let n = self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n < self.succeed_first {
            Ok(())
        } else {
            Err(ExportError::Transport("connection refused".to_string()))
        }
    }

    fn name(&self) -> &str {
        "failing"
    }
}
