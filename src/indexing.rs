//! Wires the pipeline together:
//! - start the worker pool
//! - read lines from the source and submit each one as soon as it is read
//! - close the queue at end of input and wait for the workers to drain
//! - report a broken input stream only after the drain
//!
//! Also hosts the one-shot connectivity check, which never starts the pool.

use std::pin::pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncBufRead;
use tokio_stream::StreamExt;

use crate::client::store::Store;
use crate::ingest::line_source::{LineSource, SourceError};
use crate::ingest::pool::{IngestPool, PoolSettings, PoolSummary};
use crate::transform::document::Document;

pub const SAMPLE_INDEX: &str = "sample-index";
pub const SAMPLE_OUTPUT: &str = "Sample output for testing";
pub const SAMPLE_TOOL: &str = "sample-tool";

/// What happened during one ingestion run.
#[derive(Debug)]
pub struct IngestReport {
    pub lines_read: usize,
    pub summary: PoolSummary,
    /// Set when the input stream failed; lines read before it were still inserted.
    pub source_error: Option<SourceError>,
}

pub async fn ingest<S, R>(
    store: Arc<S>,
    source: LineSource<R>,
    settings: PoolSettings,
) -> Result<IngestReport>
where
    S: Store,
    R: AsyncBufRead + Unpin,
{
    let pool = IngestPool::start(store, settings).context("failed to start ingestion pool")?;
    tracing::debug!("started {} ingestion workers", pool.worker_count());

    let mut lines_read = 0usize;
    let mut source_error = None;
    let mut lines = pin!(source.into_stream());
    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                lines_read += 1;
                if let Err(e) = pool.submit(line).await {
                    // Only happens if every worker is gone; stop reading.
                    tracing::error!("dropping remaining input: {e}");
                    break;
                }
            }
            Err(e) => {
                source_error = Some(e);
                break;
            }
        }
    }

    let summary = pool.join().await;
    if let Some(e) = &source_error {
        tracing::error!("Error reading from stdin: {e}");
    }

    Ok(IngestReport {
        lines_read,
        summary,
        source_error,
    })
}

/// Insert one fixed sample document into `sample-index`.
pub async fn connectivity_test<S: Store>(store: &S) -> Result<()> {
    tracing::info!("Testing Elasticsearch connection by inserting sample data...");
    let doc = Document::now(SAMPLE_OUTPUT, SAMPLE_TOOL);
    store
        .insert(SAMPLE_INDEX, &doc)
        .await
        .context("Test failed")?;
    tracing::info!("Test succeeded: Sample document inserted into '{SAMPLE_INDEX}'");
    Ok(())
}
