//! Human-readable report descriptions.

use serde_json::{Map, Value};

use crate::config::{FactsFormat, Settings};
use crate::core::{Decision, EventConditionSet, ResourceStatuses};
use crate::error::{Result, SnowgateError};
use crate::report::RunReport;

/// Label added when the catalog failed to compile.
pub const CATALOG_FAILURE_LABEL: &str = "catalog_failure";

/// One line per event of every out-of-sync or failed resource, followed by
/// where the resource was declared.
pub fn human_readable_event_summary(resource_statuses: &ResourceStatuses) -> String {
    let mut summary = String::new();
    for resource in resource_statuses
        .values()
        .filter(|r| r.out_of_sync || r.failed)
    {
        for event in &resource.events {
            let mut parts: Vec<&str> = vec![""];
            parts.extend(resource.containment_path.iter().map(String::as_str));
            let change = format!(
                "{}: {}",
                event.property.as_deref().unwrap_or_default(),
                event.message.as_deref().unwrap_or_default()
            );
            parts.push(&change);
            summary.push_str(&parts.join("/"));
            summary.push('\n');
        }
        summary.push_str(&format!(
            "  Resource Definition: {}:{}\n",
            resource.file.as_deref().unwrap_or_default(),
            resource.line.map(|l| l.to_string()).unwrap_or_default()
        ));
    }
    summary
}

/// Names of the raised flags, plus `catalog_failure` when set.
pub fn label_names(conditions: &EventConditionSet, catalog_failure: bool) -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = conditions.present().iter().map(|c| c.as_str()).collect();
    if catalog_failure {
        labels.push(CATALOG_FAILURE_LABEL);
    }
    labels
}

/// The `Report Labels:` block, or `None` when there are no labels.
pub fn report_labels(conditions: &EventConditionSet, catalog_failure: bool) -> Option<String> {
    let present = conditions.present();
    let mut labels: Vec<String> = present.iter().map(|c| format!("  {}", c)).collect();
    if catalog_failure {
        labels.push(CATALOG_FAILURE_LABEL.to_string());
    }
    if labels.is_empty() {
        None
    } else {
        Some(format!("Report Labels:\n\t{}", labels.join("\n\t")))
    }
}

/// Pick facts by dotted name.
///
/// `["all"]` selects every fact. Otherwise each name is looked up as a
/// nested path (`os.distro` → `facts["os"]["distro"]`) and stored under the
/// dotted name; missing facts are left out.
pub fn selected_facts(facts: &Map<String, Value>, include_facts: &[String]) -> Map<String, Value> {
    if include_facts.first().map(String::as_str) == Some("all") {
        return facts.clone();
    }

    let mut selected = Map::new();
    for name in include_facts {
        let mut segments = name.split('.');
        let mut value = segments.next().and_then(|s| facts.get(s));
        for segment in segments {
            value = value.and_then(|v| v.get(segment));
        }
        if let Some(value) = value.filter(|v| !v.is_null()) {
            selected.insert(name.clone(), value.clone());
        }
    }
    selected
}

/// Copy of `value` with every null removed, at any depth.
fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|v| !v.is_null())
                .map(without_nulls)
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Render selected facts in the configured format.
///
/// TOML has no null, so null facts are dropped from TOML output.
pub fn render_facts(facts: &Map<String, Value>, format: FactsFormat) -> Result<String> {
    match format {
        FactsFormat::PrettyJson => Ok(serde_json::to_string_pretty(facts)?),
        FactsFormat::Json => Ok(serde_json::to_string(facts)?),
        FactsFormat::Toml => toml::to_string(&without_nulls(&Value::Object(facts.clone())))
            .map_err(|e| SnowgateError::serde(format!("cannot render facts as TOML: {}", e))),
    }
}

/// Full description used for incidents and events.
pub fn report_description(
    report: &RunReport,
    decision: &Decision,
    settings: &Settings,
) -> Result<String> {
    let mut description = format!(
        "See the PE console for the full report. You can access the PE console at {}.",
        settings.pe_console_url
    );

    if let Some(labels) = report_labels(&decision.conditions, decision.catalog_failure) {
        description.push_str(&format!("\n\n{}", labels));
    }
    description.push_str(&format!("\n\nEnvironment: {}", report.environment));

    let summary = human_readable_event_summary(&report.resource_statuses);
    if !summary.is_empty() {
        description.push_str(&format!("\n\nResource Statuses:\n{}", summary));
    }
    if decision.catalog_failure {
        description.push_str(&format!("\n\nLog Output:\n{}", report.log_messages()));
    }

    let facts = selected_facts(&report.facts, &settings.include_facts);
    description.push_str(&format!(
        "\n\n== Facts ==\n{}",
        render_facts(&facts, settings.facts_format)?
    ));
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{decide, EventStatus, ResourceEvent, ResourceStatus, RunStatus, TriggerConditions};
    use crate::report::LogEntry;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn facts() -> Map<String, Value> {
        json!({
            "id": "root",
            "ipaddress": "10.0.0.1",
            "os": {"distro": {"codename": "jammy"}, "family": "Debian"},
            "uptime": null
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn notify_status() -> ResourceStatus {
        let mut status = ResourceStatus::with_events(vec![ResourceEvent::new(
            EventStatus::Success,
            false,
        )
        .with_message("message", "defined 'message' as 'foo'")]);
        status.containment_path = vec![
            "Stage[main]".to_string(),
            "Main".to_string(),
            "Notify[foo]".to_string(),
        ];
        status.file = Some("/etc/site.pp".to_string());
        status.line = Some(2);
        status
    }

    #[test]
    fn test_event_summary() {
        let mut statuses = ResourceStatuses::new();
        statuses.insert("Notify[foo]".to_string(), notify_status());
        statuses.insert("File[/tmp]".to_string(), ResourceStatus::default());

        assert_eq!(
            human_readable_event_summary(&statuses),
            "/Stage[main]/Main/Notify[foo]/message: defined 'message' as 'foo'\n  Resource Definition: /etc/site.pp:2\n"
        );
    }

    #[test]
    fn test_event_summary_empty_for_in_sync_run() {
        let mut statuses = ResourceStatuses::new();
        statuses.insert("File[/tmp]".to_string(), ResourceStatus::default());
        assert!(human_readable_event_summary(&statuses).is_empty());
    }

    #[test]
    fn test_report_labels() {
        let conditions = EventConditionSet {
            corrective_changes: true,
            intentional_changes: true,
            ..Default::default()
        };
        assert_eq!(
            report_labels(&conditions, false).unwrap(),
            "Report Labels:\n\t  corrective_changes\n\t  intentional_changes"
        );
        assert_eq!(
            report_labels(&EventConditionSet::default(), true).unwrap(),
            "Report Labels:\n\tcatalog_failure"
        );
        assert_eq!(report_labels(&EventConditionSet::default(), false), None);
    }

    #[test]
    fn test_label_names() {
        let conditions = EventConditionSet {
            failures: true,
            ..Default::default()
        };
        assert_eq!(label_names(&conditions, true), vec!["failures", "catalog_failure"]);
    }

    #[test]
    fn test_selected_facts_dotted_lookup() {
        let include = vec![
            "id".to_string(),
            "os.distro".to_string(),
            "os.missing".to_string(),
            "id.deeper".to_string(),
            "uptime".to_string(),
            "absent".to_string(),
        ];
        let selected = selected_facts(&facts(), &include);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected["id"], "root");
        assert_eq!(selected["os.distro"], json!({"codename": "jammy"}));
    }

    #[test]
    fn test_selected_facts_all() {
        let selected = selected_facts(&facts(), &["all".to_string()]);
        assert_eq!(selected, facts());
    }

    #[test]
    fn test_render_facts_formats() {
        let mut selected = Map::new();
        selected.insert("id".to_string(), json!("root"));

        assert_eq!(render_facts(&selected, FactsFormat::Json).unwrap(), r#"{"id":"root"}"#);
        assert_eq!(
            render_facts(&selected, FactsFormat::PrettyJson).unwrap(),
            "{\n  \"id\": \"root\"\n}"
        );
        assert!(render_facts(&selected, FactsFormat::Toml)
            .unwrap()
            .contains("id = \"root\""));
    }

    #[test]
    fn test_render_all_facts_as_toml_drops_nested_nulls() {
        let facts = json!({"id": "root", "os": {"distro": null, "family": "Debian"}, "ips": ["10.0.0.1", null]})
            .as_object()
            .cloned()
            .unwrap();
        let selected = selected_facts(&facts, &["all".to_string()]);

        let rendered = render_facts(&selected, FactsFormat::Toml).unwrap();
        assert!(rendered.contains("id = \"root\""));
        assert!(rendered.contains("family = \"Debian\""));
        assert!(rendered.contains("\"10.0.0.1\""));
        assert!(!rendered.contains("distro"));
    }

    #[test]
    fn test_report_description_with_all_facts_as_toml() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let mut report = RunReport::new("agent.example.com", RunStatus::Changed, time);
        report.facts = facts();

        let settings = Settings {
            include_facts: vec!["all".to_string()],
            facts_format: FactsFormat::Toml,
            ..Default::default()
        };
        let decision = decide(
            report.status,
            &report.resource_statuses,
            &TriggerConditions::new(["always"]),
            true,
        );

        let description = report_description(&report, &decision, &settings).unwrap();
        assert!(description.contains("== Facts ==\n"));
        assert!(description.contains("codename = \"jammy\""));
        assert!(!description.contains("uptime"));
    }

    #[test]
    fn test_report_description() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let mut report = RunReport::new("agent.example.com", RunStatus::Changed, time);
        report.resource_statuses.insert("Notify[foo]".to_string(), notify_status());
        report.facts = facts();

        let settings = Settings {
            pe_console_url: "https://console.example.com".to_string(),
            include_facts: vec!["id".to_string()],
            facts_format: FactsFormat::Json,
            ..Default::default()
        };
        let decision = decide(
            report.status,
            &report.resource_statuses,
            &TriggerConditions::new(["always"]),
            true,
        );

        let description = report_description(&report, &decision, &settings).unwrap();
        assert_eq!(
            description,
            "See the PE console for the full report. You can access the PE console at https://console.example.com.\
             \n\nReport Labels:\n\t  intentional_changes\
             \n\nEnvironment: production\
             \n\nResource Statuses:\n/Stage[main]/Main/Notify[foo]/message: defined 'message' as 'foo'\n  Resource Definition: /etc/site.pp:2\n\
             \n\n== Facts ==\n{\"id\":\"root\"}"
        );
    }

    #[test]
    fn test_report_description_includes_logs_on_catalog_failure() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap();
        let mut report = RunReport::new("agent.example.com", RunStatus::Failed, time);
        report.transaction_completed = false;
        report.logs.push(LogEntry {
            level: "err".to_string(),
            source: "Puppet".to_string(),
            message: "Could not retrieve catalog".to_string(),
        });

        let decision = decide(
            report.status,
            &report.resource_statuses,
            &TriggerConditions::new(["failures"]),
            report.transaction_completed,
        );
        let description = report_description(&report, &decision, &Settings::default()).unwrap();

        assert!(description.contains("Report Labels:\n\tcatalog_failure"));
        assert!(description.contains("Log Output:\nCould not retrieve catalog"));
        assert!(!description.contains("Resource Statuses"));
    }
}
