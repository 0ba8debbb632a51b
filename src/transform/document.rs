//! document.rs
//!
//! Wraps a raw input line into the JSON envelope that gets indexed.
//!
//! Responsibilities:
//! - Stamp the document with the time it is built (not the time it was read)
//! - Carry the line text through untouched
//! - Attach the per-run tool label
//!
//! A `Document` is never mutated after construction.

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;

/// One indexed unit: a single input line plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub date: String,
    pub output: String,
    /// Serialized as `toolname` to stay compatible with existing index mappings.
    #[serde(rename = "toolname")]
    pub tool_name: String,
}

impl Document {
    /// Build a document stamped with the current local time.
    pub fn now(output: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::at(Local::now(), output, tool_name)
    }

    pub fn at(
        when: DateTime<Local>,
        output: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            date: when.to_rfc3339_opts(SecondsFormat::Secs, true),
            output: output.into(),
            tool_name: tool_name.into(),
        }
    }
}
