use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::pipeline::Disposition;
use crate::store::vault::{RetrievalNotice, RetrievalStatus};

/// Applies retrieval completions: re-uploads the thawed blob to the
/// object store, restores the record's live locator, and removes the
/// archive copy.
///
/// Correlation with the initiating restore is recovered purely from
/// the notice's archive id — no in-process state survives between
/// initiation and completion.
pub struct ThawConsumer {
    services: Services,
    config: CoordinatorConfig,
}

impl ThawConsumer {
    pub fn new(services: Services, config: CoordinatorConfig) -> Self {
        Self { services, config }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Thaw consumer started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.services.queues.retrieval_notices.receive(self.config.poll_wait) => r,
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Retrieval-notice receive failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            if self.handle(&message.body).await == Disposition::Ack {
                if let Err(e) = self
                    .services
                    .queues
                    .retrieval_notices
                    .delete(&message.receipt)
                    .await
                {
                    tracing::warn!(error = %e, "Failed to delete retrieval notice");
                }
            }
        }
        tracing::info!("Thaw consumer stopped");
    }

    /// Process one retrieval-notice body.
    pub async fn handle(&self, body: &str) -> Disposition {
        let notice: RetrievalNotice = match serde_json::from_str(body) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed retrieval notice");
                return Disposition::Ack;
            }
        };

        if notice.status != RetrievalStatus::Succeeded {
            tracing::error!(
                archive_id = %notice.archive_id,
                retrieval_job = %notice.retrieval_job,
                "Retrieval did not succeed, dropping notice"
            );
            return Disposition::Ack;
        }

        let bytes = match self
            .services
            .vault
            .retrieval_output(&notice.retrieval_job)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) if e.is_benign() => {
                tracing::warn!(retrieval_job = %notice.retrieval_job, "Retrieval output gone");
                return Disposition::Ack;
            }
            Err(e) => {
                tracing::warn!(retrieval_job = %notice.retrieval_job, error = %e, "Retrieval download failed");
                return Disposition::Retry;
            }
        };

        let record = match self
            .services
            .records
            .find_by_archive_id(&notice.archive_id)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                // A duplicate notice arriving after the record was
                // already thawed; only the archive copy remains.
                tracing::debug!(archive_id = %notice.archive_id, "No record owns this archive");
                if let Err(e) = self.services.vault.delete_archive(&notice.archive_id).await {
                    tracing::warn!(archive_id = %notice.archive_id, error = %e, "Failed to delete archive");
                }
                return Disposition::Ack;
            }
            Err(e) => {
                tracing::warn!(archive_id = %notice.archive_id, error = %e, "Archive-id lookup failed");
                return Disposition::Retry;
            }
        };

        let result_ref = record
            .input_ref
            .result_sibling(&self.config.results_bucket, &self.config.result_suffix);

        if let Err(e) = self.services.objects.put(&result_ref, bytes).await {
            tracing::error!(job_id = %record.job_id, error = %e, "Re-upload failed, leaving notice for retry");
            return Disposition::Retry;
        }

        if let Err(e) = self
            .services
            .records
            .restore_result(record.job_id, result_ref.clone())
            .await
        {
            tracing::error!(job_id = %record.job_id, error = %e, "Restore record update failed");
            return Disposition::Retry;
        }

        if let Err(e) = self.services.vault.delete_archive(&notice.archive_id).await {
            tracing::warn!(archive_id = %notice.archive_id, error = %e, "Failed to delete archive");
        }

        tracing::info!(job_id = %record.job_id, result = %result_ref, "Result restored");
        Disposition::Ack
    }
}
