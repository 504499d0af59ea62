//! Wire messages exchanged with the job manager

use serde::{Deserialize, Serialize};

/// Command value the manager expects for a job submission.
pub const ADD_JOB_COMMAND: &str = "add job";

/// Prefix of completion broadcast messages.
pub const COMPLETION_PREFIX: &str = "job finished: ";

/// Job submission request (client -> manager, request/reply channel)
#[derive(Debug, Clone, Serialize)]
pub struct JobRequest {
    /// Request type, always [`ADD_JOB_COMMAND`]
    pub command: String,

    /// Stage name, understood by the manager as a worker-type selector
    pub worker: String,

    /// Document reference bound to this job
    pub document: String,
}

impl JobRequest {
    /// Build an "add job" request for a stage and document
    pub fn add_job(worker: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            command: ADD_JOB_COMMAND.into(),
            worker: worker.into(),
            document: document.into(),
        }
    }
}

/// Job submission reply (manager -> client)
#[derive(Debug, Clone, Deserialize)]
pub struct JobReply {
    /// Manager-assigned job identifier, unique for the manager session
    #[serde(rename = "job id")]
    pub job_id: String,
}

/// Broadcast topic announcing completion of a specific job
pub fn completion_topic(job_id: &str) -> String {
    format!("{}{}", COMPLETION_PREFIX, job_id)
}

/// Extract the job identifier from a completion broadcast message.
///
/// The identifier ends at the first whitespace; the manager may append
/// detail after it.
pub fn parse_completion(message: &str) -> Option<&str> {
    let rest = message.strip_prefix(COMPLETION_PREFIX)?;
    rest.split_whitespace().next()
}
