//! Errors raised by the coordination engine

use crate::manager::TransportError;
use thiserror::Error;

/// Failures that abort a pipeline run.
///
/// Completion events for unknown job identifiers are a logged anomaly, not an
/// error: the manager's at-most-once delivery is assumed but not guaranteed
/// by the transport, so the engine warns and keeps running. Interruption is
/// likewise not an error; it surfaces as an interrupted
/// [`RunSummary`](super::RunSummary).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Could not establish the channels to the manager
    #[error("failed to connect to manager: {0}")]
    Connection(#[source] TransportError),

    /// A submission round trip failed or the reply lacked a job id
    #[error("submission of stage '{stage}' for document '{document}' failed: {source}")]
    Submission {
        stage: String,
        document: String,
        #[source]
        source: TransportError,
    },

    /// The broadcast channel failed mid-run
    #[error("broadcast channel failed: {0}")]
    Broadcast(#[source] TransportError),
}

impl PipelineError {
    /// Create a submission error for a specific job instance
    pub fn submission(
        stage: impl Into<String>,
        document: impl Into<String>,
        source: TransportError,
    ) -> Self {
        Self::Submission {
            stage: stage.into(),
            document: document.into(),
            source,
        }
    }
}
