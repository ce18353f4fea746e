//! Core evaluation logic for snowgate.
//!
//! Everything here is a pure function of one run's data plus static
//! configuration: the condition classifier, the decision engine, the
//! environment filter and event severity selection.

pub mod conditions;
pub mod decision;
pub mod filter;
pub mod severity;

pub use conditions::{
    classify, Condition, EventConditionSet, EventStatus, ResourceEvent, ResourceStatus,
    ResourceStatuses,
};
pub use decision::{
    catalog_compilation_failure, decide, satisfied_conditions, Decision, RunStatus, Trigger,
    TriggerConditions, ALWAYS, NEVER,
};
pub use filter::{is_blocked, EnvironmentFilter};
pub use severity::{event_severity, SeverityLevels};
