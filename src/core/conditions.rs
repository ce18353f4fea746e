//! Condition classifier.
//!
//! Scans every resource event of a run exactly once and folds the events
//! into a fixed set of boolean flags. The flags are OR-accumulated, so the
//! result does not depend on event order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one state-change attempt on one managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// The change was applied.
    Success,
    /// The change was attempted and failed.
    Failure,
    /// The change would have been applied, but the run was a dry run.
    Noop,
    /// Informational check only.
    Audit,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Noop => "noop",
            Self::Audit => "audit",
        }
    }
}

/// One observed state-change attempt on one managed resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceEvent {
    /// Event outcome.
    pub status: EventStatus,
    /// True when the event restores drift from a previously enforced state.
    #[serde(default, deserialize_with = "null_as_false")]
    pub corrective_change: bool,
    /// Property that changed (e.g. `ensure`, `content`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Human-readable message from the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Remaining event fields (previous/desired values, timestamps, ...).
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

// Agents emit `"corrective_change": null` for events that never changed anything.
fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl ResourceEvent {
    /// Create an event with the given status and change kind.
    pub fn new(status: EventStatus, corrective_change: bool) -> Self {
        Self {
            status,
            corrective_change,
            property: None,
            message: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Attach a property and message.
    pub fn with_message(mut self, property: impl Into<String>, message: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self.message = Some(message.into());
        self
    }

    /// The condition this event satisfies, if any.
    ///
    /// Audit events satisfy nothing. Failures satisfy only `failures`.
    /// Everything else is a change, pending when the event was a noop.
    pub fn condition(&self) -> Option<Condition> {
        match (self.status, self.corrective_change) {
            (EventStatus::Audit, _) => None,
            (EventStatus::Failure, _) => Some(Condition::Failures),
            (EventStatus::Noop, true) => Some(Condition::PendingCorrectiveChanges),
            (EventStatus::Noop, false) => Some(Condition::PendingIntentionalChanges),
            (EventStatus::Success, true) => Some(Condition::CorrectiveChanges),
            (EventStatus::Success, false) => Some(Condition::IntentionalChanges),
        }
    }
}

/// All events of one managed resource in one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceStatus {
    /// Events recorded for the resource.
    pub events: Vec<ResourceEvent>,
    /// Whether the resource was out of sync.
    pub out_of_sync: bool,
    /// Whether the resource failed.
    pub failed: bool,
    /// Containment path, e.g. `["Stage[main]", "Main", "Notify[foo]"]`.
    pub containment_path: Vec<String>,
    /// File the resource was declared in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line the resource was declared on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ResourceStatus {
    /// Create a resource status holding the given events.
    pub fn with_events(events: Vec<ResourceEvent>) -> Self {
        let failed = events.iter().any(|e| e.status == EventStatus::Failure);
        let out_of_sync = events.iter().any(|e| e.status != EventStatus::Audit);
        Self {
            events,
            out_of_sync,
            failed,
            ..Default::default()
        }
    }
}

/// Resource name → status, ordered by name.
pub type ResourceStatuses = BTreeMap<String, ResourceStatus>;

/// A condition the classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Failures,
    CorrectiveChanges,
    IntentionalChanges,
    PendingCorrectiveChanges,
    PendingIntentionalChanges,
}

impl Condition {
    /// Every condition, in reporting order.
    pub const ALL: [Condition; 5] = [
        Condition::Failures,
        Condition::CorrectiveChanges,
        Condition::IntentionalChanges,
        Condition::PendingCorrectiveChanges,
        Condition::PendingIntentionalChanges,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failures => "failures",
            Self::CorrectiveChanges => "corrective_changes",
            Self::IntentionalChanges => "intentional_changes",
            Self::PendingCorrectiveChanges => "pending_corrective_changes",
            Self::PendingIntentionalChanges => "pending_intentional_changes",
        }
    }

    /// Parse a condition name. Names are exact; no aliases.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's output: one flag per [`Condition`], all always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConditionSet {
    pub failures: bool,
    pub corrective_changes: bool,
    pub intentional_changes: bool,
    pub pending_corrective_changes: bool,
    pub pending_intentional_changes: bool,
}

impl EventConditionSet {
    /// Flag value for a condition.
    pub fn get(&self, condition: Condition) -> bool {
        match condition {
            Condition::Failures => self.failures,
            Condition::CorrectiveChanges => self.corrective_changes,
            Condition::IntentionalChanges => self.intentional_changes,
            Condition::PendingCorrectiveChanges => self.pending_corrective_changes,
            Condition::PendingIntentionalChanges => self.pending_intentional_changes,
        }
    }

    /// Raise the flag for a condition. Flags are never lowered.
    pub fn raise(&mut self, condition: Condition) {
        let flag = match condition {
            Condition::Failures => &mut self.failures,
            Condition::CorrectiveChanges => &mut self.corrective_changes,
            Condition::IntentionalChanges => &mut self.intentional_changes,
            Condition::PendingCorrectiveChanges => &mut self.pending_corrective_changes,
            Condition::PendingIntentionalChanges => &mut self.pending_intentional_changes,
        };
        *flag = true;
    }

    /// Look up a flag by name. `None` when the name is not a known key.
    pub fn lookup(&self, name: &str) -> Option<bool> {
        Condition::parse(name).map(|c| self.get(c))
    }

    /// All `(condition, flag)` pairs in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Condition, bool)> + '_ {
        Condition::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Conditions whose flag is set, in reporting order.
    pub fn present(&self) -> Vec<Condition> {
        self.iter().filter(|(_, set)| *set).map(|(c, _)| c).collect()
    }

    /// Whether any flag is set.
    pub fn any(&self) -> bool {
        self.iter().any(|(_, set)| set)
    }
}

/// Classify a run's resource statuses in a single pass over their events.
pub fn classify(resource_statuses: &ResourceStatuses) -> EventConditionSet {
    let mut conditions = EventConditionSet::default();
    for event in resource_statuses.values().flat_map(|r| r.events.iter()) {
        if let Some(condition) = event.condition() {
            conditions.raise(condition);
        }
    }
    conditions
}
