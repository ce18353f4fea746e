//! Outcome of processing one run report.
//!
//! This is the JSON the CLI prints to stdout.

use serde::{Deserialize, Serialize};

use crate::config::OperationMode;
use crate::error::{exit_codes, Result};

/// What happened to a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Processing is switched off in the settings.
    Disabled,
    /// The run's environment is filtered out.
    Blocked,
    /// No trigger condition was satisfied.
    NotTriggered,
    /// A payload was built but not sent.
    DryRun,
    /// The record was accepted by ServiceNow.
    Sent,
    /// Processing failed; see `message`.
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Blocked => "blocked",
            Self::NotTriggered => "not_triggered",
            Self::DryRun => "dry_run",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Result of processing one run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OperationMode>,
    /// Satisfied trigger names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub satisfied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Incident number returned by ServiceNow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    /// Request body, kept for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessOutcome {
    fn with_status(status: OutcomeStatus) -> Self {
        Self {
            status,
            mode: None,
            satisfied: Vec::new(),
            endpoint: None,
            record: None,
            payload: None,
            message: None,
        }
    }

    pub fn disabled() -> Self {
        Self::with_status(OutcomeStatus::Disabled)
    }

    pub fn blocked(environment: &str) -> Self {
        Self {
            message: Some(format!("environment '{}' is blocked", environment)),
            ..Self::with_status(OutcomeStatus::Blocked)
        }
    }

    pub fn not_triggered(mode: OperationMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::with_status(OutcomeStatus::NotTriggered)
        }
    }

    pub fn dry_run(
        mode: OperationMode,
        satisfied: Vec<String>,
        endpoint: String,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            mode: Some(mode),
            satisfied,
            endpoint: Some(endpoint),
            payload: Some(payload),
            ..Self::with_status(OutcomeStatus::DryRun)
        }
    }

    pub fn sent(
        mode: OperationMode,
        satisfied: Vec<String>,
        endpoint: String,
        record: Option<String>,
    ) -> Self {
        Self {
            mode: Some(mode),
            satisfied,
            endpoint: Some(endpoint),
            record,
            ..Self::with_status(OutcomeStatus::Sent)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::with_status(OutcomeStatus::Failed)
        }
    }

    /// Whether a record was (or, for dry runs, would have been) sent.
    pub fn notified(&self) -> bool {
        matches!(self.status, OutcomeStatus::Sent | OutcomeStatus::DryRun)
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            OutcomeStatus::Failed => exit_codes::ERROR,
            _ => exit_codes::OK,
        }
    }
}

/// Serialize an outcome to compact JSON.
pub fn to_json<T: Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string(output)?)
}

/// Serialize an outcome to pretty JSON.
pub fn to_json_pretty<T: Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}
