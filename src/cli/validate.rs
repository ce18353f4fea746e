//! Validate command for snowgate.
//!
//! Checks that the console URL answers and that the ServiceNow credentials
//! can read a table.

use serde::{Deserialize, Serialize};

use crate::processor::ReportProcessor;
use crate::transport::Transport;

/// Table read when no other is given.
pub const DEFAULT_VALIDATION_TABLE: &str = "incident";

/// Options for the validate command.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Table used to check credentials; empty skips the check.
    pub table: String,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            json: false,
            quiet: false,
            table: DEFAULT_VALIDATION_TABLE.to_string(),
        }
    }
}

/// Output format for the validate command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidateOutput {
    /// Whether validation passed.
    pub success: bool,
    /// Whether the credentials were checked.
    pub credentials_checked: bool,
    /// Error message if validation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The validate command implementation.
pub struct ValidateCommand<T: Transport> {
    processor: ReportProcessor<T>,
}

impl<T: Transport> ValidateCommand<T> {
    /// Create a new validate command.
    pub fn new(processor: ReportProcessor<T>) -> Self {
        Self { processor }
    }

    /// Run the validate command.
    pub fn run(&self, options: &ValidateOptions) -> ValidateOutput {
        let credentials_checked = !options.table.is_empty();
        match self.processor.validate(&options.table) {
            Ok(()) => ValidateOutput {
                success: true,
                credentials_checked,
                error: None,
            },
            Err(e) => ValidateOutput {
                success: false,
                credentials_checked,
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ValidateOutput, options: &ValidateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        match (&output.error, output.credentials_checked) {
            (Some(error), _) => format!("Validation failed: {}\n", error),
            (None, true) => format!(
                "Settings are valid (console reachable, credentials accepted by table '{}').\n",
                options.table
            ),
            (None, false) => "Settings are valid (console reachable).\n".to_string(),
        }
    }
}
