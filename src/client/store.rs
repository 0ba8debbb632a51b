//! The boundary the ingestion pool writes through.
//!
//! The pool only needs one operation: put a document into an index. It never
//! retries, batches or reorders, and it does not care whether a failure came
//! from the transport or from the store itself.

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;

use crate::transform::document::Document;

#[derive(Error, Debug)]
pub enum InsertError {
    #[error("http error")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
}

/// A document sink shared by every worker.
///
/// Implementations must be safe to call from many tasks at once.
pub trait Store: Send + Sync + 'static {
    fn insert(
        &self,
        index: &str,
        doc: &Document,
    ) -> impl Future<Output = Result<(), InsertError>> + Send;
}
