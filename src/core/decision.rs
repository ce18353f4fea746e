//! Decision engine.
//!
//! Evaluates the operator's ordered trigger conditions against one run and
//! decides whether a notification goes out. The classifier runs once per
//! decision, no matter how many trigger conditions are configured.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::conditions::{classify, Condition, EventConditionSet, ResourceStatuses};
use crate::error::{Result, SnowgateError};
use crate::util::log_entry;

/// Trigger token that is always satisfied.
pub const ALWAYS: &str = "always";

/// Trigger token that is never satisfied.
pub const NEVER: &str = "never";

/// Overall status of a configuration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Unchanged,
    Changed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed trigger name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Always,
    Never,
    Event(Condition),
    Unknown(String),
}

impl Trigger {
    pub fn parse(name: &str) -> Self {
        match name {
            ALWAYS => Self::Always,
            NEVER => Self::Never,
            other => match Condition::parse(other) {
                Some(condition) => Self::Event(condition),
                None => Self::Unknown(other.to_string()),
            },
        }
    }
}

/// Ordered list of trigger names from operator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerConditions(Vec<String>);

impl TriggerConditions {
    /// Create a trigger list from names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Validate a raw configuration value as a list of strings.
    ///
    /// Anything else (a bare string, a number, a list holding a non-string)
    /// is a configuration error naming the key and the offending value.
    pub fn from_value(key: &str, value: &serde_json::Value) -> Result<Self> {
        let invalid = || {
            SnowgateError::config(format!(
                "settings['{}'] must be an array of strings, got {}",
                key, value
            ))
        };

        let items = value.as_array().ok_or_else(invalid)?;
        let names = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        Ok(Self(names))
    }

    /// Names in configured order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TriggerConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Whether a run aborted before any resource was evaluated.
///
/// Such runs carry no resource statuses and never complete their
/// transaction, so neither the status nor the event flags reveal them.
pub fn catalog_compilation_failure(
    resource_statuses: &ResourceStatuses,
    transaction_completed: bool,
) -> bool {
    resource_statuses.is_empty() && !transaction_completed
}

/// Result of evaluating trigger conditions against one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Satisfied trigger names, in configured order, without duplicates.
    pub satisfied: Vec<String>,
    /// Classifier flags for the run.
    pub conditions: EventConditionSet,
    /// Whether the run aborted before evaluating any resource.
    pub catalog_failure: bool,
}

impl Decision {
    /// Whether a notification should be sent.
    pub fn notify(&self) -> bool {
        !self.satisfied.is_empty()
    }
}

/// Evaluate trigger conditions against one run.
pub fn decide(
    report_status: RunStatus,
    resource_statuses: &ResourceStatuses,
    trigger_conditions: &TriggerConditions,
    transaction_completed: bool,
) -> Decision {
    let conditions = classify(resource_statuses);
    let catalog_failure = catalog_compilation_failure(resource_statuses, transaction_completed);

    let mut satisfied: Vec<String> = Vec::new();
    for name in trigger_conditions.names() {
        // `never` only ever fails its own entry; other names still count.
        let met = match Trigger::parse(name) {
            Trigger::Always => true,
            Trigger::Never => false,
            Trigger::Event(Condition::Failures) => {
                report_status == RunStatus::Failed || catalog_failure
            }
            Trigger::Event(condition) => conditions.get(condition),
            Trigger::Unknown(unknown) => {
                tracing::warn!(
                    condition = %unknown,
                    "{}",
                    log_entry(&format!("unknown trigger condition: {}", unknown))
                );
                false
            }
        };
        if met && !satisfied.contains(name) {
            satisfied.push(name.clone());
        }
    }

    tracing::info!("{}", log_entry(&format!("satisfied conditions: {:?}", satisfied)));

    Decision {
        satisfied,
        conditions,
        catalog_failure,
    }
}

/// Satisfied trigger names for one run, in configured order.
pub fn satisfied_conditions(
    report_status: RunStatus,
    resource_statuses: &ResourceStatuses,
    trigger_conditions: &TriggerConditions,
    transaction_completed: bool,
) -> Vec<String> {
    decide(
        report_status,
        resource_statuses,
        trigger_conditions,
        transaction_completed,
    )
    .satisfied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conditions::{EventStatus, ResourceEvent, ResourceStatus};
    use tracing_test::traced_test;

    fn statuses(events: Vec<ResourceEvent>) -> ResourceStatuses {
        let mut map = ResourceStatuses::new();
        map.insert("Notify[foo]".to_string(), ResourceStatus::with_events(events));
        map
    }

    fn triggers(names: &[&str]) -> TriggerConditions {
        TriggerConditions::new(names.iter().copied())
    }

    fn intentional() -> ResourceEvent {
        ResourceEvent::new(EventStatus::Success, false)
    }

    #[test]
    fn test_always_is_satisfied_for_quiet_run() {
        let result = satisfied_conditions(
            RunStatus::Unchanged,
            &statuses(vec![]),
            &triggers(&["always"]),
            true,
        );
        assert_eq!(result, vec!["always"]);
    }

    #[test]
    #[traced_test]
    fn test_unknown_condition_is_warned_and_skipped() {
        let result = satisfied_conditions(
            RunStatus::Failed,
            &statuses(vec![]),
            &triggers(&["bogus_condition", "always"]),
            true,
        );

        assert_eq!(result, vec!["always"]);
        assert!(logs_contain("unknown trigger condition: bogus_condition"));
    }

    #[test]
    fn test_never_alone_is_empty() {
        let result = satisfied_conditions(
            RunStatus::Failed,
            &statuses(vec![ResourceEvent::new(EventStatus::Failure, false)]),
            &triggers(&["never"]),
            true,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_never_does_not_short_circuit_other_names() {
        let result = satisfied_conditions(
            RunStatus::Changed,
            &statuses(vec![intentional()]),
            &triggers(&["never", "intentional_changes"]),
            true,
        );
        assert_eq!(result, vec!["intentional_changes"]);
    }

    #[test]
    fn test_failed_status_satisfies_failures() {
        let result = satisfied_conditions(
            RunStatus::Failed,
            &ResourceStatuses::new(),
            &triggers(&["failures"]),
            true,
        );
        assert_eq!(result, vec!["failures"]);
    }

    #[test]
    fn test_catalog_compilation_failure_satisfies_failures() {
        let result = satisfied_conditions(
            RunStatus::Unchanged,
            &ResourceStatuses::new(),
            &triggers(&["failures"]),
            false,
        );
        assert_eq!(result, vec!["failures"]);
    }

    #[test]
    fn test_empty_statuses_with_completed_transaction_is_not_failure() {
        let result = satisfied_conditions(
            RunStatus::Unchanged,
            &ResourceStatuses::new(),
            &triggers(&["failures"]),
            true,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_failure_event_without_failed_status() {
        // `failures` is decided by status and catalog failure, not the event flag
        let result = satisfied_conditions(
            RunStatus::Changed,
            &statuses(vec![ResourceEvent::new(EventStatus::Failure, false)]),
            &triggers(&["failures"]),
            true,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_mixed_events_preserve_configured_order() {
        let events = vec![intentional(), ResourceEvent::new(EventStatus::Failure, false)];
        let result = satisfied_conditions(
            RunStatus::Failed,
            &statuses(events),
            &triggers(&["intentional_changes", "failures"]),
            true,
        );
        assert_eq!(result, vec!["intentional_changes", "failures"]);
    }

    #[test]
    fn test_unknown_condition_is_never_satisfied() {
        let result = satisfied_conditions(
            RunStatus::Failed,
            &statuses(vec![intentional()]),
            &triggers(&["bogus", "intentional_changes"]),
            true,
        );
        assert_eq!(result, vec!["intentional_changes"]);
    }

    #[test]
    fn test_duplicates_reported_once() {
        let result = satisfied_conditions(
            RunStatus::Failed,
            &ResourceStatuses::new(),
            &triggers(&["failures", "always", "failures"]),
            true,
        );
        assert_eq!(result, vec!["failures", "always"]);
    }

    #[test]
    fn test_pending_conditions() {
        let events = vec![
            ResourceEvent::new(EventStatus::Noop, true),
            ResourceEvent::new(EventStatus::Noop, false),
        ];
        let result = satisfied_conditions(
            RunStatus::Unchanged,
            &statuses(events),
            &triggers(&[
                "corrective_changes",
                "pending_corrective_changes",
                "pending_intentional_changes",
            ]),
            true,
        );
        assert_eq!(
            result,
            vec!["pending_corrective_changes", "pending_intentional_changes"]
        );
    }

    #[test]
    fn test_decision_notify_and_flags() {
        let decision = decide(
            RunStatus::Changed,
            &statuses(vec![ResourceEvent::new(EventStatus::Success, true)]),
            &triggers(&["failures"]),
            true,
        );
        assert!(!decision.notify());
        assert!(decision.conditions.corrective_changes);
        assert!(!decision.catalog_failure);
    }

    #[test]
    fn test_empty_trigger_list_never_notifies() {
        let decision = decide(
            RunStatus::Failed,
            &ResourceStatuses::new(),
            &TriggerConditions::default(),
            false,
        );
        assert!(!decision.notify());
        assert!(decision.catalog_failure);
    }

    #[test]
    fn test_from_value_accepts_string_array() {
        let value = serde_json::json!(["failures", "corrective_changes"]);
        let parsed = TriggerConditions::from_value("incident_creation_conditions", &value).unwrap();
        assert_eq!(parsed.names(), &["failures", "corrective_changes"]);
    }

    #[test]
    fn test_from_value_rejects_bare_string() {
        let value = serde_json::json!("not_an_array");
        let err = TriggerConditions::from_value("incident_creation_conditions", &value).unwrap_err();
        assert!(err.is_config());
        let msg = err.to_string();
        assert!(msg.contains("incident_creation_conditions"));
        assert!(msg.contains("not_an_array"));
    }

    #[test]
    fn test_from_value_rejects_non_string_items() {
        let value = serde_json::json!(["failures", 3]);
        let err = TriggerConditions::from_value("event_creation_conditions", &value).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_trigger_parse() {
        assert_eq!(Trigger::parse("always"), Trigger::Always);
        assert_eq!(Trigger::parse("never"), Trigger::Never);
        assert_eq!(
            Trigger::parse("failures"),
            Trigger::Event(Condition::Failures)
        );
        assert_eq!(Trigger::parse("ALWAYS"), Trigger::Unknown("ALWAYS".to_string()));
    }

    #[test]
    fn test_run_status_serde() {
        let status: RunStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, RunStatus::Failed);
        assert_eq!(status.to_string(), "failed");
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_status() -> impl Strategy<Value = RunStatus> {
            prop_oneof![
                Just(RunStatus::Unchanged),
                Just(RunStatus::Changed),
                Just(RunStatus::Failed),
            ]
        }

        fn arb_event() -> impl Strategy<Value = ResourceEvent> {
            (
                prop_oneof![
                    Just(EventStatus::Success),
                    Just(EventStatus::Failure),
                    Just(EventStatus::Noop),
                    Just(EventStatus::Audit),
                ],
                any::<bool>(),
            )
                .prop_map(|(s, c)| ResourceEvent::new(s, c))
        }

        fn arb_name() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("always".to_string()),
                Just("never".to_string()),
                Just("failures".to_string()),
                Just("corrective_changes".to_string()),
                Just("intentional_changes".to_string()),
                Just("pending_corrective_changes".to_string()),
                Just("pending_intentional_changes".to_string()),
                "[a-z_]{1,12}",
            ]
        }

        proptest! {
            // Property: `always` anywhere in the list means a notification
            #[test]
            fn prop_always_notifies(
                status in arb_status(),
                events in prop::collection::vec(arb_event(), 0..10),
                mut names in prop::collection::vec(arb_name(), 0..6),
                completed in any::<bool>(),
            ) {
                names.push("always".to_string());
                let decision = decide(status, &statuses(events), &TriggerConditions::new(names), completed);
                prop_assert!(decision.notify());
            }

            // Property: satisfied names are a subsequence of the configured names
            #[test]
            fn prop_satisfied_is_ordered_subset(
                status in arb_status(),
                events in prop::collection::vec(arb_event(), 0..10),
                names in prop::collection::vec(arb_name(), 0..8),
                completed in any::<bool>(),
            ) {
                let result = satisfied_conditions(status, &statuses(events), &TriggerConditions::new(names.clone()), completed);
                let mut cursor = names.iter();
                for name in &result {
                    prop_assert!(cursor.any(|n| n == name));
                }
                prop_assert!(!result.iter().any(|n| n == "never"));
            }
        }
    }
}
