//! telemetrygen - synthetic log load generator
//!
//! Usage:
//!   telemetrygen --logs 1000 --workers 4
//!   telemetrygen --duration 30s --rate 200 --workers 8 --output null
//!   telemetrygen --duration 5m --otlp-attributes env=staging --output file --file logs.jsonl

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetrygen::{
    parse_attribute, parse_duration, CountSplit, GenerationConfig, Generator, JsonLinesFileSink,
    LogSinkBoxed, NullSink, StdoutSink,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "telemetrygen")]
#[command(about = "Generate synthetic log records at a controlled rate")]
struct Cli {
    /// Number of log records to generate (ignored when --duration is set)
    #[arg(long, default_value_t = 0)]
    logs: u64,

    /// How long to generate for (e.g. 500ms, 30s, 5m, 1h)
    #[arg(long, default_value = "0", value_parser = parse_duration)]
    duration: Duration,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Records per second, per worker (0 = unlimited)
    #[arg(long, default_value_t = 0.0)]
    rate: f64,

    /// Resource attribute as key=value; repeatable
    #[arg(long = "otlp-attributes", value_parser = parse_attribute)]
    otlp_attributes: Vec<(String, String)>,

    /// Value of the `service.name` resource attribute
    #[arg(long, default_value = "telemetrygen")]
    service: String,

    /// Give every worker the full --logs count instead of splitting it
    #[arg(long)]
    per_worker_count: bool,

    /// Where to send records
    #[arg(long, value_enum, default_value_t = Output::Stdout)]
    output: Output,

    /// Output file for --output file
    #[arg(long, default_value = "telemetrygen.jsonl")]
    file: PathBuf,

    /// Pretty-print JSON on stdout
    #[arg(long)]
    pretty: bool,

    /// Print the run report as JSON on stderr when done
    #[arg(long)]
    report: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Output {
    Stdout,
    File,
    Null,
}

impl Cli {
    fn generation_config(&self) -> GenerationConfig {
        let mut config = GenerationConfig::count(self.logs)
            .with_duration(self.duration)
            .with_workers(self.workers)
            .with_rate(self.rate)
            .with_resource_attribute("service.name", self.service.clone());
        for (key, value) in &self.otlp_attributes {
            config = config.with_resource_attribute(key.clone(), value.clone());
        }
        if self.per_worker_count {
            config = config.with_count_split(CountSplit::PerWorker);
        }
        config
    }

    fn sink(&self) -> Arc<dyn LogSinkBoxed> {
        match self.output {
            Output::Stdout => Arc::new(StdoutSink::new(self.pretty)),
            Output::File => Arc::new(JsonLinesFileSink::new(self.file.clone())),
            Output::Null => Arc::new(NullSink::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Records may go to stdout, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.log_level.into()))
        .init();

    let generator = Generator::new(cli.generation_config(), cli.sink());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C; run will not stop early");
            std::future::pending::<()>().await;
        }
    };

    let report = generator
        .run_until(shutdown)
        .await
        .context("log generation failed")?;

    if cli.report {
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
