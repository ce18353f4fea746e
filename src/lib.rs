//! snowgate - ServiceNow report processor
//!
//! snowgate reads the report a managed node submits after each
//! configuration run, decides whether the run warrants attention, and
//! creates a ServiceNow incident or sends an event-management event.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod notify;
pub mod output;
pub mod processor;
pub mod report;
pub mod secrets;
pub mod transport;
pub mod util;

pub use config::{OperationMode, Settings};
pub use core::{
    classify, decide, is_blocked, satisfied_conditions, Condition, Decision, EnvironmentFilter,
    EventConditionSet, EventStatus, ResourceEvent, ResourceStatus, ResourceStatuses, RunStatus,
    TriggerConditions,
};
pub use error::{FailOpen, Result, SnowgateError};
pub use notify::{EventPayload, IncidentPayload};
pub use output::{OutcomeStatus, ProcessOutcome};
pub use processor::ReportProcessor;
pub use report::RunReport;
pub use secrets::{CommandResolver, PassthroughResolver, SecretResolver};
pub use transport::{Auth, HttpMethod, HttpResponse, ServiceNowClient, Transport};

// CLI commands
pub use cli::{EvaluateCommand, ProcessCommand, ValidateCommand};
