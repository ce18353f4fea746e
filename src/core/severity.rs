//! Event severity selection for event-management mode.
//!
//! ServiceNow event severities:
//! 0 Clear, 1 OK, 2 Warning, 3 Minor, 4 Major, 5 Critical.

use serde::{Deserialize, Serialize};

use crate::core::conditions::{Condition, EventConditionSet};

/// Configured severity per condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SeverityLevels {
    pub failures_event_severity: u8,
    pub corrective_changes_event_severity: u8,
    pub intentional_changes_event_severity: u8,
    pub pending_corrective_changes_event_severity: u8,
    pub pending_intentional_changes_event_severity: u8,
    pub no_changes_event_severity: u8,
}

/// Highest valid ServiceNow severity.
pub const MAX_SEVERITY: u8 = 5;

impl Default for SeverityLevels {
    fn default() -> Self {
        Self {
            failures_event_severity: 3,
            corrective_changes_event_severity: 2,
            intentional_changes_event_severity: 1,
            pending_corrective_changes_event_severity: 2,
            pending_intentional_changes_event_severity: 1,
            no_changes_event_severity: 1,
        }
    }
}

impl SeverityLevels {
    /// Configured severity for a condition.
    pub fn for_condition(&self, condition: Condition) -> u8 {
        match condition {
            Condition::Failures => self.failures_event_severity,
            Condition::CorrectiveChanges => self.corrective_changes_event_severity,
            Condition::IntentionalChanges => self.intentional_changes_event_severity,
            Condition::PendingCorrectiveChanges => self.pending_corrective_changes_event_severity,
            Condition::PendingIntentionalChanges => {
                self.pending_intentional_changes_event_severity
            }
        }
    }

    /// Check every level is within `0..=MAX_SEVERITY`.
    pub fn is_valid(&self) -> bool {
        Condition::ALL
            .into_iter()
            .map(|c| self.for_condition(c))
            .chain(std::iter::once(self.no_changes_event_severity))
            .all(|s| s <= MAX_SEVERITY)
    }
}

/// Pick the event severity for a run.
///
/// A catalog compilation failure uses the failure severity. A run with no
/// event conditions uses the no-changes severity. Otherwise the lowest
/// configured severity among the present conditions wins.
pub fn event_severity(
    conditions: &EventConditionSet,
    catalog_failure: bool,
    levels: &SeverityLevels,
) -> u8 {
    if catalog_failure {
        return levels.failures_event_severity;
    }
    conditions
        .present()
        .into_iter()
        .map(|c| levels.for_condition(c))
        .min()
        .unwrap_or(levels.no_changes_event_severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> SeverityLevels {
        SeverityLevels {
            failures_event_severity: 5,
            corrective_changes_event_severity: 4,
            intentional_changes_event_severity: 3,
            pending_corrective_changes_event_severity: 2,
            pending_intentional_changes_event_severity: 1,
            no_changes_event_severity: 0,
        }
    }

    #[test]
    fn test_catalog_failure_uses_failure_severity() {
        let conditions = EventConditionSet {
            intentional_changes: true,
            ..Default::default()
        };
        assert_eq!(event_severity(&conditions, true, &levels()), 5);
    }

    #[test]
    fn test_no_conditions_uses_no_changes_severity() {
        assert_eq!(
            event_severity(&EventConditionSet::default(), false, &levels()),
            0
        );
    }

    #[test]
    fn test_lowest_present_severity_wins() {
        let conditions = EventConditionSet {
            failures: true,
            corrective_changes: true,
            ..Default::default()
        };
        assert_eq!(event_severity(&conditions, false, &levels()), 4);
    }

    #[test]
    fn test_single_condition() {
        let conditions = EventConditionSet {
            pending_corrective_changes: true,
            ..Default::default()
        };
        assert_eq!(event_severity(&conditions, false, &levels()), 2);
    }

    #[test]
    fn test_default_levels_valid() {
        assert!(SeverityLevels::default().is_valid());
        let invalid = SeverityLevels {
            failures_event_severity: 9,
            ..Default::default()
        };
        assert!(!invalid.is_valid());
    }
}
