//! Report processor.
//!
//! Runs one report through the pipeline: disabled switch, environment
//! filter, trigger decision, payload construction and delivery.

use serde_json::Value;

use crate::config::{OperationMode, Settings};
use crate::core::{decide, Decision};
use crate::error::{FailOpen, Result, SnowgateError};
use crate::notify::{EventPayload, IncidentPayload};
use crate::output::ProcessOutcome;
use crate::report::RunReport;
use crate::transport::{endpoint, Auth, HttpMethod, Transport, EVENT_PATH, INCIDENT_PATH};
use crate::util::{log_entry, LOG_PREFIX};

/// Stable PE console endpoint used to check the console URL.
pub const CONSOLE_PROBE_PATH: &str = "/auth/favicon.ico";

/// `result.number` of an incident table insert response.
fn incident_number(body: &str, url: &str) -> Result<Option<String>> {
    let response: Value = serde_json::from_str(body)
        .map_err(|e| SnowgateError::serde(format!("invalid response from {}: {}", url, e)))?;
    Ok(response
        .pointer("/result/number")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Processes run reports against one ServiceNow instance.
pub struct ReportProcessor<T: Transport> {
    transport: T,
    settings: Settings,
    dry_run: bool,
}

impl<T: Transport> ReportProcessor<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
            dry_run: false,
        }
    }

    /// Build payloads without sending them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Process a report, logging and swallowing any error.
    pub fn process_fail_open(&self, report: &RunReport) -> ProcessOutcome {
        match self.process(report) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(host = %report.host, "{} error: {}", LOG_PREFIX, err);
                ProcessOutcome::failed(err.to_string())
            }
        }
    }

    /// Process a report.
    ///
    /// Trigger lists are validated before the environment filter, so a
    /// malformed list is reported even for blocked environments.
    pub fn process(&self, report: &RunReport) -> Result<ProcessOutcome> {
        if self.settings.disabled {
            tracing::info!("{}", log_entry("processing is disabled"));
            return Ok(ProcessOutcome::disabled());
        }

        let mode = self.settings.operation_mode;
        let triggers = self.settings.trigger_conditions()?;

        if self
            .settings
            .environment_filter()
            .is_blocked(&report.environment)?
        {
            tracing::info!(
                environment = %report.environment,
                "{}",
                log_entry(&format!("environment {} is blocked", report.environment))
            );
            return Ok(ProcessOutcome::blocked(&report.environment));
        }

        tracing::info!(
            "{}",
            log_entry(&format!("{}: {}", mode.conditions_key().replace('_', " "), triggers))
        );

        let decision = decide(
            report.status,
            &report.resource_statuses,
            &triggers,
            report.transaction_completed,
        );

        if !decision.notify() {
            let verdict = match mode {
                OperationMode::IncidentManagement => "decision: Do not create incident",
                OperationMode::EventManagement => "decision: Do not send event",
            };
            tracing::info!("{}", log_entry(verdict));
            return Ok(ProcessOutcome::not_triggered(mode));
        }

        match mode {
            OperationMode::IncidentManagement => self.create_incident(report, decision),
            OperationMode::EventManagement => self.send_event(report, decision),
        }
    }

    fn create_incident(&self, report: &RunReport, decision: Decision) -> Result<ProcessOutcome> {
        let url = endpoint(&self.settings.instance, INCIDENT_PATH);
        let body = serde_json::to_value(IncidentPayload::build(report, &decision, &self.settings)?)?;
        let mode = OperationMode::IncidentManagement;

        if self.dry_run {
            tracing::info!("{}", log_entry(&format!("dry run: would create incident on {}", url)));
            return Ok(ProcessOutcome::dry_run(mode, decision.satisfied, url, body));
        }

        tracing::info!("{}", log_entry(&format!("attempting to create incident on {}", url)));
        let response = self.post(&url, &body, "Incident creation failed")?;

        // The incident exists at this point, so an unreadable body is not a failure.
        let number = incident_number(&response, &url).fail_open_default("reading incident number");
        tracing::info!(
            "{}",
            log_entry(&format!(
                "created incident {}",
                number.as_deref().unwrap_or("<unknown>")
            ))
        );

        Ok(ProcessOutcome::sent(mode, decision.satisfied, url, number))
    }

    fn send_event(&self, report: &RunReport, decision: Decision) -> Result<ProcessOutcome> {
        let url = endpoint(&self.settings.instance, EVENT_PATH);
        let event = EventPayload::build(report, &decision, &self.settings)?;
        let body = event.records()?;
        let mode = OperationMode::EventManagement;

        if self.dry_run {
            tracing::info!(
                "{}",
                log_entry(&format!("dry run: would send the {} event on {}", event.event_type, url))
            );
            return Ok(ProcessOutcome::dry_run(mode, decision.satisfied, url, body));
        }

        tracing::info!(
            "{}",
            log_entry(&format!("attempting to send the {} event on {}", event.event_type, url))
        );
        self.post(&url, &body, "Failed to send the event")?;
        tracing::info!("{}", log_entry("successfully sent the event"));

        Ok(ProcessOutcome::sent(mode, decision.satisfied, url, None))
    }

    /// POST a body with the configured credentials and return the response body.
    fn post(&self, url: &str, body: &Value, failure: &str) -> Result<String> {
        if self.settings.instance.trim().is_empty() {
            return Err(SnowgateError::config("settings['instance'] must be set"));
        }

        let auth = Auth::from_settings(&self.settings);
        let response = self.transport.send(HttpMethod::Post, url, Some(body), &auth)?;
        if !response.is_success() {
            return Err(SnowgateError::api(failure, url, response.status, response.body));
        }
        Ok(response.body)
    }

    /// Check the console URL and, unless `table` is empty, the ServiceNow
    /// credentials against that table.
    pub fn validate(&self, table: &str) -> Result<()> {
        self.settings.validate()?;

        let console_url = self.settings.pe_console_url.trim_end_matches('/');
        let probe = format!("{}{}", console_url, CONSOLE_PROBE_PATH);
        let console_failure = |reason: String| {
            SnowgateError::config(format!(
                "failed to validate the PE console url '{}' via the '{}' endpoint: {}",
                console_url, CONSOLE_PROBE_PATH, reason
            ))
        };
        let response = self
            .transport
            .send(HttpMethod::Get, &probe, None, &Auth::None)
            .map_err(|e| console_failure(e.to_string()))?;
        if response.status >= 400 {
            return Err(console_failure(
                "the URL points to an invalid PE console instance".to_string(),
            ));
        }
        tracing::info!("{}", log_entry(&format!("validated the PE console url {}", console_url)));

        if table.is_empty() {
            return Ok(());
        }

        let url = endpoint(
            &self.settings.instance,
            &format!("/api/now/table/{}?sysparm_limit=1", table),
        );
        let credentials_failure = |reason: String| {
            SnowgateError::config(format!("failed to validate the ServiceNow credentials: {}", reason))
        };
        let response = self
            .transport
            .send(HttpMethod::Get, &url, None, &Auth::from_settings(&self.settings))
            .map_err(|e| credentials_failure(e.to_string()))?;
        if response.status >= 400 {
            return Err(credentials_failure(format!(
                "received error response from endpoint {} (status: {}): {}",
                url, response.status, response.body
            )));
        }
        tracing::info!("{}", log_entry(&format!("validated the ServiceNow credentials on {}", url)));
        Ok(())
    }
}
