//! Incident and event request bodies.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::config::{IncidentFields, Settings};
use crate::core::{event_severity, Condition, Decision, RunStatus};
use crate::error::Result;
use crate::notify::description::{label_names, report_description, selected_facts};
use crate::report::RunReport;

/// Event fields that do not affect whether two runs are the same.
const VOLATILE_EVENT_FIELDS: &[&str] = &["historical_value", "message", "time", "redacted"];

/// Event source reported to ServiceNow.
pub const EVENT_SOURCE: &str = "Puppet";

/// Body of an incident table insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentPayload {
    pub short_description: String,
    pub description: String,
    #[serde(flatten)]
    pub fields: IncidentFields,
}

impl IncidentPayload {
    pub fn build(report: &RunReport, decision: &Decision, settings: &Settings) -> Result<Self> {
        Ok(Self {
            short_description: short_description(report),
            description: report_description(report, decision, settings)?,
            fields: settings.incident.clone(),
        })
    }
}

/// `Puppet run report (status: ...) for node ... environment ... (report time: ...)`.
pub fn short_description(report: &RunReport) -> String {
    format!(
        "Puppet run report (status: {}) for node {} environment {} (report time: {})",
        report.display_status(),
        report.host,
        report.environment,
        report.formatted_timestamp()
    )
}

/// One event for the event management API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventPayload {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Severity as a decimal string, as the API expects.
    pub severity: String,
    pub node: String,
    /// Shown as "Source Instance" in ServiceNow.
    pub event_class: String,
    pub description: String,
    /// Pretty JSON with environment, labels, flags and facts.
    pub additional_info: String,
    pub message_key: String,
}

impl EventPayload {
    pub fn build(report: &RunReport, decision: &Decision, settings: &Settings) -> Result<Self> {
        let severity = event_severity(
            &decision.conditions,
            decision.catalog_failure,
            &settings.severities,
        );

        Ok(Self {
            source: EVENT_SOURCE.to_string(),
            event_type: format!("node_report_{}", event_type_label(report.status, decision)),
            severity: severity.to_string(),
            node: report.host.clone(),
            event_class: report
                .server
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            description: report_description(report, decision, settings)?,
            additional_info: additional_info(report, decision, settings)?,
            message_key: message_key(report)?,
        })
    }

    /// The `{"records": [event]}` envelope the API takes.
    pub fn records(&self) -> Result<Value> {
        Ok(json!({ "records": [serde_json::to_value(self)?] }))
    }
}

/// Suffix of the event type.
///
/// `failed` for failed runs and catalog failures, else the first raised
/// change flag (corrective before intentional, applied before pending),
/// else the run status.
pub fn event_type_label(status: RunStatus, decision: &Decision) -> String {
    if status == RunStatus::Failed || decision.catalog_failure {
        return RunStatus::Failed.as_str().to_string();
    }
    [
        Condition::CorrectiveChanges,
        Condition::IntentionalChanges,
        Condition::PendingCorrectiveChanges,
        Condition::PendingIntentionalChanges,
    ]
    .into_iter()
    .find(|c| decision.conditions.get(*c))
    .map(|c| c.as_str().to_string())
    .unwrap_or_else(|| status.as_str().to_string())
}

/// Machine-readable details attached to an event.
pub fn additional_info(report: &RunReport, decision: &Decision, settings: &Settings) -> Result<String> {
    let mut info = Map::new();
    info.insert("environment".to_string(), json!(report.environment));
    info.insert(
        "report_labels".to_string(),
        json!(label_names(&decision.conditions, decision.catalog_failure).join(",")),
    );
    for (condition, raised) in decision.conditions.iter() {
        info.insert(condition.as_str().to_string(), json!(raised));
    }
    info.extend(selected_facts(&report.facts, &settings.include_facts));
    Ok(serde_json::to_string_pretty(&info)?)
}

/// Deduplication key of a run: SHA-256 over the sorted characters of the
/// compact JSON of the node, the status and the stable event fields.
///
/// Sorting the characters makes the key independent of event and field
/// order.
pub fn message_key(report: &RunReport) -> Result<String> {
    let mut resource_events = Vec::new();
    for event in report.resource_statuses.values().flat_map(|r| r.events.iter()) {
        let mut event = serde_json::to_value(event)?;
        if let Some(fields) = event.as_object_mut() {
            for field in VOLATILE_EVENT_FIELDS {
                fields.remove(*field);
            }
        }
        resource_events.push(event);
    }

    let key_source = json!({
        "node": report.host,
        "report": {
            "status": report.status,
            "resource_events": resource_events,
        },
    });

    let mut chars: Vec<char> = serde_json::to_string(&key_source)?.chars().collect();
    chars.sort_unstable();
    let sorted: String = chars.into_iter().collect();

    Ok(hex::encode(Sha256::digest(sorted.as_bytes())))
}
