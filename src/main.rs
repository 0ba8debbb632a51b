// src/main.rs
//! Pipes stdin into Elasticsearch, one document per line:
//! - load `~/.es_config.json`, apply flags, save it back if anything changed
//! - build the store client
//! - `--test`: insert one sample document into `sample-index` and exit
//! - otherwise: read stdin line by line and fan the lines out to N workers
//!
//! Run: `some-tool | es-pipe --es_host http://localhost:9200 --tool some-tool`

mod client;
mod config;
mod indexing;
mod ingest;
mod transform;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::TypedValueParser;
use tracing_subscriber::EnvFilter;

use crate::client::es_client::EsClient;
use crate::config::{ConfigOverrides, StoreConfig, load_or_create};
use crate::indexing::IngestReport;
use crate::ingest::line_source::{DEFAULT_MAX_LINE_BYTES, LineSource};
use crate::ingest::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, PoolSettings};

/// Send each line of stdin to Elasticsearch as a document.
#[derive(Parser, Debug)]
#[command(name = "es-pipe")]
#[command(about = "Index stdin lines into Elasticsearch, one document per line")]
struct Args {
    /// Elasticsearch host URL
    #[arg(long = "es_host", visible_alias = "es-host")]
    es_host: Option<String>,

    /// Elasticsearch username
    #[arg(long)]
    username: Option<String>,

    /// Elasticsearch password
    #[arg(long)]
    password: Option<String>,

    /// Elasticsearch index name
    #[arg(long = "indexname", visible_alias = "index-name", default_value = "my-index")]
    index_name: String,

    /// Tool name stored with every document
    #[arg(long, default_value = "tool")]
    tool: String,

    /// Test Elasticsearch connection
    #[arg(long)]
    test: bool,

    /// Number of concurrent workers
    #[arg(long, default_value_t = DEFAULT_WORKERS, value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize))]
    workers: usize,

    /// Lines buffered between stdin and the workers
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize))]
    queue_capacity: usize,

    /// Per-insert HTTP timeout in seconds (no timeout if unset)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Longest accepted input line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES, value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize))]
    max_line_bytes: usize,

    /// Config file path (default: ~/.es_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            es_host: self.es_host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => StoreConfig::default_path().context("Error loading config")?,
    };
    let cfg = load_or_create(&config_path, &args.overrides()).context("Error loading config")?;

    let mut es = EsClient::new(&cfg).context("Error creating Elasticsearch client")?;
    if let Some(secs) = args.timeout_secs {
        es = es
            .with_timeout_secs(secs)
            .context("Error creating Elasticsearch client")?;
    }

    if args.test {
        indexing::connectivity_test(&es).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let settings = PoolSettings::new(args.index_name, args.tool)
        .with_workers(args.workers)
        .with_queue_capacity(args.queue_capacity);
    tracing::info!(
        "Indexing stdin into '{}' at {} with {} workers",
        settings.index,
        es.base_url(),
        settings.workers
    );

    let source = LineSource::stdin(args.max_line_bytes);
    let report = indexing::ingest(Arc::new(es), source, settings).await?;

    tracing::info!(
        "done: read {} lines, attempted {}, inserted {}, failed {}",
        report.lines_read,
        report.summary.attempted(),
        report.summary.inserted,
        report.summary.failed
    );

    Ok(exit_code(&report))
}

/// A broken input stream fails the run even though earlier lines were indexed.
fn exit_code(report: &IngestReport) -> ExitCode {
    if report.source_error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::line_source::SourceError;
    use crate::ingest::pool::PoolSummary;

    #[test]
    fn defaults_match_legacy_flags() {
        let args = Args::try_parse_from(["es-pipe"]).unwrap();
        assert_eq!(args.index_name, "my-index");
        assert_eq!(args.tool, "tool");
        assert_eq!(args.workers, 5);
        assert!(!args.test);
        assert!(args.es_host.is_none());
    }

    #[test]
    fn accepts_legacy_flag_names() {
        let args = Args::try_parse_from([
            "es-pipe",
            "--es_host",
            "http://es:9200",
            "--indexname",
            "idx",
            "--tool",
            "x",
            "--workers",
            "2",
            "--test",
        ])
        .unwrap();
        assert_eq!(args.es_host.as_deref(), Some("http://es:9200"));
        assert_eq!(args.index_name, "idx");
        assert_eq!(args.workers, 2);
        assert!(args.test);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(Args::try_parse_from(["es-pipe", "--workers", "0"]).is_err());
    }

    #[test]
    fn overrides_carry_only_supplied_flags() {
        let args = Args::try_parse_from(["es-pipe", "--username", "V"]).unwrap();
        let o = args.overrides();
        assert_eq!(o.username.as_deref(), Some("V"));
        assert!(o.es_host.is_none());
        assert!(o.password.is_none());
    }

    fn report(source_error: Option<SourceError>) -> IngestReport {
        IngestReport {
            lines_read: 2,
            summary: PoolSummary {
                inserted: 1,
                failed: 1,
            },
            source_error,
        }
    }

    #[test]
    fn insert_failures_still_exit_successfully() {
        assert_eq!(exit_code(&report(None)), ExitCode::SUCCESS);
    }

    #[test]
    fn input_stream_error_exits_with_failure() {
        let read = SourceError::Read(std::io::Error::other("stdin closed badly"));
        assert_eq!(exit_code(&report(Some(read))), ExitCode::FAILURE);

        let too_long = SourceError::LineTooLong { limit: 8 };
        assert_eq!(exit_code(&report(Some(too_long))), ExitCode::FAILURE);
    }

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
