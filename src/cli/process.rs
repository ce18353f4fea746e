//! Process command for snowgate.
//!
//! Runs one report through the full pipeline and reports what happened.

use crate::output::{to_json_pretty, OutcomeStatus, ProcessOutcome};
use crate::processor::ReportProcessor;
use crate::report::RunReport;
use crate::transport::Transport;

/// Options for the process command.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Build the payload without sending it.
    pub dry_run: bool,
}

/// The process command implementation.
pub struct ProcessCommand<T: Transport> {
    processor: ReportProcessor<T>,
}

impl<T: Transport> ProcessCommand<T> {
    /// Create a new process command.
    pub fn new(processor: ReportProcessor<T>) -> Self {
        Self { processor }
    }

    /// Run the process command. Never fails; errors become a failed outcome.
    pub fn run(&self, report: &RunReport) -> ProcessOutcome {
        self.processor.process_fail_open(report)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ProcessOutcome, options: &ProcessOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            to_json_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            format_human_readable(output)
        }
    }
}

fn format_human_readable(output: &ProcessOutcome) -> String {
    let endpoint = output.endpoint.as_deref().unwrap_or("<unknown>");
    match output.status {
        OutcomeStatus::Disabled => "Processing is disabled; nothing sent.\n".to_string(),
        OutcomeStatus::Blocked => format!(
            "Skipped: {}.\n",
            output.message.as_deref().unwrap_or("environment is blocked")
        ),
        OutcomeStatus::NotTriggered => "No trigger condition satisfied; nothing sent.\n".to_string(),
        OutcomeStatus::DryRun => {
            let payload = output
                .payload
                .as_ref()
                .and_then(|p| serde_json::to_string_pretty(p).ok())
                .unwrap_or_default();
            format!(
                "Dry run: would POST to {} (satisfied: {})\n{}\n",
                endpoint,
                output.satisfied.join(", "),
                payload
            )
        }
        OutcomeStatus::Sent => match &output.record {
            Some(record) => format!("Created incident {} via {}\n", record, endpoint),
            None => format!("Sent to {}\n", endpoint),
        },
        OutcomeStatus::Failed => format!(
            "Processing failed: {}\n",
            output.message.as_deref().unwrap_or("unknown error")
        ),
    }
}
