//! Notification content: descriptions and request bodies.

pub mod description;
pub mod payload;

pub use description::{
    human_readable_event_summary, render_facts, report_description, report_labels, selected_facts,
};
pub use payload::{
    additional_info, event_type_label, message_key, short_description, EventPayload,
    IncidentPayload,
};
