//! Coordination engine: submission protocol and completion loop

use super::error::PipelineError;
use super::job::{JobInstance, JobState};
use super::template::WorkflowNode;
use crate::cli::signals::CancellationToken;
use crate::manager::{JobRequest, ManagerTransport, completion_topic, parse_completion};
use std::collections::HashMap;
use std::time::Duration;

/// Tunables for the completion loop
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on one broadcast poll; also how often termination and
    /// cancellation are checked
    pub poll_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs submitted to the manager
    pub submitted: usize,

    /// Jobs whose completion event was processed
    pub completed: usize,

    /// Jobs still outstanding when the run was interrupted
    pub abandoned: usize,

    /// Whether the run ended on an interrupt rather than by draining
    pub interrupted: bool,
}

/// Drives documents through the workflow template.
///
/// One logical task owns the transport and the outstanding-jobs table; both
/// submission and completion handling run on it, so no synchronization is
/// needed. The loop suspends only while awaiting a submission reply and
/// during the bounded broadcast poll.
pub struct Pipeline<T: ManagerTransport> {
    transport: T,
    template: WorkflowNode,
    waiting: HashMap<String, JobInstance>,
    settings: PipelineSettings,
    cancel: CancellationToken,
}

impl<T: ManagerTransport> Pipeline<T> {
    /// Create an engine over a connected transport and a workflow template
    pub fn new(transport: T, template: WorkflowNode) -> Self {
        Self {
            transport,
            template,
            waiting: HashMap::new(),
            settings: PipelineSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the default settings
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attach a cancellation token observed between polls
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every document through the pipeline and block until the
    /// outstanding-jobs table drains (or the run is interrupted).
    ///
    /// The transport is closed on every exit path, including errors.
    pub async fn run(&mut self, documents: &[String]) -> Result<RunSummary, PipelineError> {
        let result = self.run_inner(documents).await;
        self.transport.close();
        result
    }

    async fn run_inner(&mut self, documents: &[String]) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        for document in documents {
            let mut instance = JobInstance::from_template(&self.template);
            instance.bind_document(document.clone());
            self.submit(instance, &mut summary).await?;
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.abandon(summary));
            }

            let message = self
                .transport
                .poll_broadcast(self.settings.poll_interval)
                .await
                .map_err(PipelineError::Broadcast)?;

            if let Some(message) = message {
                match parse_completion(&message) {
                    Some(job_id) => {
                        let job_id = job_id.to_string();
                        self.handle_completion(&job_id, &mut summary).await?;
                    }
                    None => {
                        tracing::warn!(message = %message, "broadcast did not match completion pattern");
                    }
                }
            }

            if self.waiting.is_empty() {
                break;
            }
        }

        tracing::info!(
            submitted = summary.submitted,
            completed = summary.completed,
            "pipeline drained"
        );
        Ok(summary)
    }

    /// Submission protocol for one job instance: request, record the
    /// manager-assigned id in the outstanding table, subscribe to the
    /// completion topic.
    async fn submit(
        &mut self,
        mut instance: JobInstance,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let document = instance.document().unwrap_or_default().to_string();
        let request = JobRequest::add_job(instance.stage(), document.clone());

        let reply = self.transport.request(&request).await.map_err(|source| {
            PipelineError::submission(instance.stage(), document.clone(), source)
        })?;

        tracing::info!(
            job_id = %reply.job_id,
            stage = instance.stage(),
            document = %document,
            "job submitted"
        );

        instance.mark(JobState::Submitted);
        self.waiting.insert(reply.job_id.clone(), instance);
        self.transport.subscribe(&completion_topic(&reply.job_id));
        summary.submitted += 1;
        Ok(())
    }

    /// Process a completion event: fan out successors with the completed
    /// job's document binding, then retire the entry.
    async fn handle_completion(
        &mut self,
        job_id: &str,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let Some(mut instance) = self.waiting.remove(job_id) else {
            tracing::warn!(job_id, "completion event for unknown job, ignoring");
            return Ok(());
        };

        instance.mark(JobState::Completed);
        self.transport.unsubscribe(&completion_topic(job_id));

        let document = instance.document().unwrap_or_default().to_string();
        tracing::info!(
            job_id,
            stage = instance.stage(),
            document = %document,
            outstanding = self.waiting.len(),
            "job finished"
        );

        for mut successor in instance.take_successors() {
            successor.bind_document(document.clone());
            self.submit(successor, summary).await?;
        }

        summary.completed += 1;
        Ok(())
    }

    /// Best-effort shutdown on interrupt: outstanding jobs are abandoned
    /// without raising an error to the caller.
    fn abandon(&mut self, mut summary: RunSummary) -> RunSummary {
        for (job_id, mut instance) in self.waiting.drain() {
            instance.mark(JobState::Abandoned);
            tracing::warn!(job_id = %job_id, stage = instance.stage(), "abandoning outstanding job");
            summary.abandoned += 1;
        }
        summary.interrupted = true;
        summary
    }
}
