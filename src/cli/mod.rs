//! CLI commands for snowgate.
//!
//! - **evaluate**: decision only, no network
//! - **process**: full pipeline, optionally as a dry run
//! - **validate**: console and credential checks

pub mod evaluate;
pub mod process;
pub mod validate;

pub use evaluate::{EvaluateCommand, EvaluateOptions, EvaluateOutput};
pub use process::{ProcessCommand, ProcessOptions};
pub use validate::{ValidateCommand, ValidateOptions, ValidateOutput};
