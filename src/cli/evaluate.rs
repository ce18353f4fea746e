//! Evaluate command for snowgate.
//!
//! Runs the environment filter and the trigger decision for one report
//! without building or sending anything.

use serde::{Deserialize, Serialize};

use crate::config::{OperationMode, Settings};
use crate::core::{decide, EventConditionSet};
use crate::error::Result;
use crate::report::RunReport;

/// Options for the evaluate command.
#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the evaluate command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluateOutput {
    /// Whether evaluation succeeded.
    pub success: bool,
    pub host: String,
    pub environment: String,
    pub mode: OperationMode,
    /// Whether the environment filter blocks the run.
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<EventConditionSet>,
    pub catalog_failure: bool,
    /// Satisfied trigger names, in configured order.
    pub satisfied: Vec<String>,
    /// Whether a notification would be sent.
    pub notify: bool,
    /// Error message if evaluation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluateOutput {
    fn for_report(report: &RunReport, mode: OperationMode) -> Self {
        Self {
            success: true,
            host: report.host.clone(),
            environment: report.environment.clone(),
            mode,
            blocked: false,
            conditions: None,
            catalog_failure: false,
            satisfied: Vec::new(),
            notify: false,
            error: None,
        }
    }
}

/// The evaluate command implementation.
pub struct EvaluateCommand {
    settings: Settings,
}

impl EvaluateCommand {
    /// Create a new evaluate command.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run the evaluate command.
    pub fn run(&self, report: &RunReport) -> EvaluateOutput {
        let mode = self.settings.operation_mode;
        match self.evaluate(report) {
            Ok(output) => output,
            Err(e) => EvaluateOutput {
                success: false,
                error: Some(e.to_string()),
                ..EvaluateOutput::for_report(report, mode)
            },
        }
    }

    fn evaluate(&self, report: &RunReport) -> Result<EvaluateOutput> {
        let mut output = EvaluateOutput::for_report(report, self.settings.operation_mode);
        let triggers = self.settings.trigger_conditions()?;

        output.blocked = self
            .settings
            .environment_filter()
            .is_blocked(&report.environment)?;

        let decision = decide(
            report.status,
            &report.resource_statuses,
            &triggers,
            report.transaction_completed,
        );
        output.notify = !self.settings.disabled && !output.blocked && decision.notify();
        output.conditions = Some(decision.conditions);
        output.catalog_failure = decision.catalog_failure;
        output.satisfied = decision.satisfied;
        Ok(output)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &EvaluateOutput, options: &EvaluateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &EvaluateOutput) -> String {
        if !output.success {
            return format!(
                "Evaluation failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = vec![format!(
            "Report for {} (environment {}), mode {}",
            output.host,
            output.environment,
            output.mode.as_str()
        )];

        if let Some(conditions) = &output.conditions {
            let present: Vec<&str> = conditions.present().iter().map(|c| c.as_str()).collect();
            if present.is_empty() {
                lines.push("  Conditions: none".to_string());
            } else {
                lines.push(format!("  Conditions: {}", present.join(", ")));
            }
        }
        if output.catalog_failure {
            lines.push("  Catalog compilation failed".to_string());
        }
        if output.blocked {
            lines.push("  Environment is blocked".to_string());
        }
        if self.settings.disabled {
            lines.push("  Processing is disabled".to_string());
        }
        if output.satisfied.is_empty() {
            lines.push("  Satisfied: none".to_string());
        } else {
            lines.push(format!("  Satisfied: {}", output.satisfied.join(", ")));
        }
        lines.push(format!(
            "  Decision: {}",
            if output.notify { "notify" } else { "do not notify" }
        ));

        lines.join("\n") + "\n"
    }
}
