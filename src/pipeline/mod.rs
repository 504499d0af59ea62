//! Pipeline coordination core
//!
//! This module handles:
//! - Workflow templates (immutable stage trees built via `then`)
//! - Per-document job instances and their lifecycle
//! - The coordination engine: submission protocol, outstanding-jobs table,
//!   completion loop and fan-out
//!
//! State lives only in process memory for the duration of one run; the
//! engine never persists or resumes in-flight pipelines.

mod engine;
mod error;
mod job;
mod template;

pub use engine::{Pipeline, PipelineSettings, RunSummary};
pub use error::PipelineError;
#[allow(unused_imports)]
pub use job::{JobInstance, JobState};
pub use template::WorkflowNode;
