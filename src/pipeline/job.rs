//! Per-document job instances

use super::template::WorkflowNode;

/// Lifecycle of one job instance.
///
/// Valid transitions are `Created -> Submitted -> Completed` and
/// `Created -> Submitted -> Abandoned` (the latter only when a run is
/// interrupted with the job still outstanding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Submitted,
    Completed,
    Abandoned,
}

/// A runtime copy of a workflow stage bound to one specific document.
///
/// Instances are stamped out of the template by deep copy, so two documents
/// never share mutable state, and successor instances carry their own
/// independent `document` binding, set exactly once at fan-out time before
/// submission.
#[derive(Debug, Clone)]
pub struct JobInstance {
    stage: String,
    document: Option<String>,
    state: JobState,
    successors: Vec<JobInstance>,
}

impl JobInstance {
    /// Deep-copy a template subtree into an unbound instance tree
    pub fn from_template(node: &WorkflowNode) -> Self {
        Self {
            stage: node.name().to_string(),
            document: None,
            state: JobState::Created,
            successors: node.successors().iter().map(JobInstance::from_template).collect(),
        }
    }

    /// Bind the document reference for this instance. Called exactly once,
    /// before submission.
    pub fn bind_document(&mut self, document: impl Into<String>) {
        debug_assert!(self.document.is_none(), "document bound twice");
        self.document = Some(document.into());
    }

    /// Stage name copied from the originating template node
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Document reference, if already bound
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Advance the lifecycle state
    pub(crate) fn mark(&mut self, state: JobState) {
        self.state = state;
    }

    /// Take ownership of the successor instances for fan-out
    pub(crate) fn take_successors(&mut self) -> Vec<JobInstance> {
        std::mem::take(&mut self.successors)
    }
}
