use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::pipeline::message::ArchiveRequest;
use crate::pipeline::Disposition;
use crate::store::profile::ServiceTier;

/// Moves completed free-tier results from the object store to the
/// cold vault once their download grace period has passed.
pub struct ArchiveConsumer {
    services: Services,
    config: CoordinatorConfig,
}

impl ArchiveConsumer {
    pub fn new(services: Services, config: CoordinatorConfig) -> Self {
        Self { services, config }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Archive consumer started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.services.queues.archive_requests.receive(self.config.poll_wait) => r,
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Archive-request receive failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            if self.handle(&message.body).await == Disposition::Ack {
                if let Err(e) = self
                    .services
                    .queues
                    .archive_requests
                    .delete(&message.receipt)
                    .await
                {
                    tracing::warn!(error = %e, "Failed to delete archive-request message");
                }
            }
        }
        tracing::info!("Archive consumer stopped");
    }

    /// Process one archive-request body.
    pub async fn handle(&self, body: &str) -> Disposition {
        let request: ArchiveRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed archive request");
                return Disposition::Ack;
            }
        };
        let job_id = request.job_id;

        // The tier may have changed since the request was enqueued; an
        // upgrade cancels the pending archival here.
        let tier = match self.services.profiles.tier_for(&request.user_id).await {
            Ok(tier) => tier,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Tier lookup failed");
                return Disposition::Retry;
            }
        };
        if tier == ServiceTier::Premium {
            tracing::info!(job_id = %job_id, user_id = %request.user_id, "Owner upgraded, skipping archival");
            return Disposition::Ack;
        }

        let bytes = match self.services.objects.get(&request.result_ref).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_benign() => {
                tracing::debug!(job_id = %job_id, "Result already archived");
                return Disposition::Ack;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Result fetch failed");
                return Disposition::Retry;
            }
        };

        let archive_id = match self.services.vault.upload(bytes).await {
            Ok(archive_id) => archive_id,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Vault upload failed");
                return Disposition::Retry;
            }
        };

        match self.services.records.archive_result(job_id, &archive_id).await {
            Ok(()) => {}
            Err(e) if e.is_benign() => {
                // Another consumer won the conditional write; the copy
                // we just uploaded is unreferenced.
                tracing::debug!(job_id = %job_id, error = %e, "Record already archived");
                if let Err(e) = self.services.vault.delete_archive(&archive_id).await {
                    tracing::warn!(archive_id = %archive_id, error = %e, "Failed to drop duplicate archive");
                }
                return Disposition::Ack;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Archive record update failed");
                return Disposition::Retry;
            }
        }

        if let Err(e) = self.services.objects.delete(&request.result_ref).await {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to delete live result copy");
        }

        tracing::info!(job_id = %job_id, archive_id = %archive_id, "Result archived");
        Disposition::Ack
    }
}
