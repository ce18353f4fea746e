//! Run report input.
//!
//! A `RunReport` is the JSON document a managed node submits after each
//! configuration run. Only the fields snowgate reads are modelled; unknown
//! fields are ignored.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{catalog_compilation_failure, ResourceStatuses, RunStatus};
use crate::error::{Result, SnowgateError};
use crate::util::read_to_string_limited;

/// One log line emitted during the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogEntry {
    pub level: String,
    pub source: String,
    pub message: String,
}

/// A completed configuration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    /// Certname of the node that ran.
    pub host: String,
    /// Environment the node ran in.
    #[serde(default)]
    pub environment: String,
    /// Overall run status.
    #[serde(default)]
    pub status: RunStatus,
    /// True when a noop run found changes it would have made.
    #[serde(default)]
    pub noop_pending: bool,
    /// False when the run aborted before evaluating any resource.
    #[serde(default = "default_true")]
    pub transaction_completed: bool,
    /// When the run started.
    pub time: DateTime<Utc>,
    /// Run metrics; only the total run time is read.
    #[serde(default)]
    pub metrics: serde_json::Value,
    /// Per-resource statuses.
    #[serde(default)]
    pub resource_statuses: ResourceStatuses,
    /// Log output of the run.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Node facts at run time.
    #[serde(default)]
    pub facts: serde_json::Map<String, serde_json::Value>,
    /// Name of the server that processed the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

fn default_true() -> bool {
    true
}

impl RunReport {
    /// Create a minimal report.
    pub fn new(host: impl Into<String>, status: RunStatus, time: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            environment: "production".to_string(),
            status,
            noop_pending: false,
            transaction_completed: true,
            time,
            metrics: serde_json::Value::Null,
            resource_statuses: ResourceStatuses::new(),
            logs: Vec::new(),
            facts: serde_json::Map::new(),
            server: None,
        }
    }

    /// Parse a report from JSON.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| SnowgateError::serde(format!("invalid run report: {}", e)))
    }

    /// Load a report from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string_limited(path)?;
        Self::from_json(&content)
    }

    /// Whether the run aborted before evaluating any resource.
    pub fn catalog_failure(&self) -> bool {
        catalog_compilation_failure(&self.resource_statuses, self.transaction_completed)
    }

    /// Status as shown to humans: `pending changes` for noop runs with changes.
    pub fn display_status(&self) -> &str {
        if self.noop_pending {
            "pending changes"
        } else {
            self.status.as_str()
        }
    }

    /// Total run time in seconds, if the metrics carry it.
    ///
    /// Accepts both `{"time": {"total": 1.5}}` and the agent's native
    /// `{"time": {"values": [["total", "Total", 1.5], ...]}}` layout.
    pub fn total_run_time(&self) -> Option<f64> {
        let time = self.metrics.get("time")?;
        if let Some(total) = time.get("total").and_then(|v| v.as_f64()) {
            return Some(total);
        }
        time.get("values")?
            .as_array()?
            .iter()
            .filter_map(|row| row.as_array())
            .find(|row| row.first().and_then(|n| n.as_str()) == Some("total"))
            .and_then(|row| row.get(2))
            .and_then(|v| v.as_f64())
    }

    /// Timestamp of the end of the run, e.g. `2024-03-01 10:15:30 Z`.
    ///
    /// A run time that does not fit a timestamp is ignored and the start
    /// time is used instead.
    pub fn formatted_timestamp(&self) -> String {
        let end = self
            .total_run_time()
            .map(|secs| secs * 1000.0)
            .filter(|millis| millis.is_finite() && millis.abs() < i64::MAX as f64)
            .and_then(|millis| Duration::try_milliseconds(millis as i64))
            .and_then(|elapsed| self.time.checked_add_signed(elapsed))
            .unwrap_or(self.time);
        end.format("%F %H:%M:%S %Z").to_string().replace("UTC", "Z")
    }

    /// All log messages joined by newlines.
    pub fn log_messages(&self) -> String {
        self.logs
            .iter()
            .map(|entry| entry.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
