use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::{self, JobContext};
use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::error::{CoordError, Result};
use crate::pipeline::message::JobRequest;
use crate::pipeline::Disposition;
use crate::store::job::JobStatus;

/// Pulls job requests, stages their inputs, launches the analysis
/// task, and moves the record Pending→Running.
pub struct SubmissionConsumer {
    services: Services,
    config: CoordinatorConfig,
}

impl SubmissionConsumer {
    pub fn new(services: Services, config: CoordinatorConfig) -> Self {
        Self { services, config }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Submission consumer started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.services.queues.job_requests.receive(self.config.poll_wait) => r,
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Job-request receive failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            if self.handle(&message.body).await == Disposition::Ack {
                if let Err(e) = self
                    .services
                    .queues
                    .job_requests
                    .delete(&message.receipt)
                    .await
                {
                    tracing::warn!(error = %e, "Failed to delete job-request message");
                }
            }
        }
        tracing::info!("Submission consumer stopped");
    }

    /// Process one job-request body.
    pub async fn handle(&self, body: &str) -> Disposition {
        let request: JobRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed job request");
                return Disposition::Ack;
            }
        };
        let job_id = request.job_id;

        let input_path = match self.stage_input(&request).await {
            Ok(path) => path,
            Err(e) => {
                // The record stays Pending; resubmission is the
                // recovery path, so the message is still acknowledged.
                tracing::error!(job_id = %job_id, error = %e, "Input staging failed");
                return Disposition::Ack;
            }
        };

        let ctx = JobContext {
            job_id,
            user_email: request.user_email.clone(),
            job_dir: self.job_dir(job_id),
            input_path,
        };
        analysis::spawn_analysis(self.services.clone(), self.config.clone(), ctx);

        match self
            .services
            .records
            .transition(job_id, JobStatus::Pending, JobStatus::Running)
            .await
        {
            Ok(()) => {
                tracing::info!(job_id = %job_id, "Job running");
                Disposition::Ack
            }
            // Already past Pending: a duplicate delivery lost the
            // conditional write.
            Err(e) if e.is_benign() => {
                tracing::debug!(job_id = %job_id, error = %e, "Transition already applied");
                Disposition::Ack
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job running");
                Disposition::Retry
            }
        }
    }

    fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.config.work_dir.join(job_id.to_string())
    }

    /// Download the input into the job's working directory. Any
    /// partially created state is removed on failure.
    async fn stage_input(&self, request: &JobRequest) -> Result<PathBuf> {
        let job_dir = self.job_dir(request.job_id);

        let staged = async {
            tokio::fs::create_dir_all(&job_dir).await?;
            let bytes = self.services.objects.get(&request.input).await?;
            let input_path = job_dir.join(&request.file_name);
            tokio::fs::write(&input_path, bytes).await?;
            Ok::<_, CoordError>(input_path)
        }
        .await;

        match staged {
            Ok(path) => Ok(path),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&job_dir).await {
                    tracing::warn!(
                        job_id = %request.job_id,
                        error = %cleanup,
                        "Failed to remove partial job directory"
                    );
                }
                Err(CoordError::Staging {
                    job_id: request.job_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}
