use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::error::CoordError;
use crate::pipeline::message::RestoreRequest;
use crate::pipeline::Disposition;
use crate::store::job::JobRecord;
use crate::store::profile::ServiceTier;
use crate::store::vault::RetrievalTier;

/// Advisory shown on the record while its retrieval is in flight.
pub const RESTORE_IN_PROGRESS: &str = "The file is being restored, please wait.";

/// Reacts to tier upgrades: finds every archived result the user owns
/// and starts a cold-storage retrieval for each, Expedited first with
/// an immediate Standard fallback when capacity is exhausted.
///
/// Initiation only returns a handle; completions arrive on the
/// retrieval-notice queue and are applied by the thaw consumer.
pub struct RestoreOrchestrator {
    services: Services,
    config: CoordinatorConfig,
}

impl RestoreOrchestrator {
    pub fn new(services: Services, config: CoordinatorConfig) -> Self {
        Self { services, config }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Restore orchestrator started");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.services.queues.restore_requests.receive(self.config.poll_wait) => r,
            };

            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Restore-request receive failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            if self.handle(&message.body).await == Disposition::Ack {
                if let Err(e) = self
                    .services
                    .queues
                    .restore_requests
                    .delete(&message.receipt)
                    .await
                {
                    tracing::warn!(error = %e, "Failed to delete restore-request message");
                }
            }
        }
        tracing::info!("Restore orchestrator stopped");
    }

    /// Process one restore-request body.
    pub async fn handle(&self, body: &str) -> Disposition {
        let request: RestoreRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed restore request");
                return Disposition::Ack;
            }
        };

        // Only honored if the upgrade is still in effect.
        let tier = match self.services.profiles.tier_for(&request.user_id).await {
            Ok(tier) => tier,
            Err(e) => {
                tracing::warn!(user_id = %request.user_id, error = %e, "Tier lookup failed");
                return Disposition::Retry;
            }
        };
        if tier != ServiceTier::Premium {
            tracing::debug!(user_id = %request.user_id, "Owner not premium, ignoring restore request");
            return Disposition::Ack;
        }

        let archived = match self
            .services
            .records
            .archived_jobs_for_user(&request.user_id)
            .await
        {
            Ok(archived) => archived,
            Err(e) => {
                tracing::warn!(user_id = %request.user_id, error = %e, "Archived-jobs query failed");
                return Disposition::Retry;
            }
        };

        tracing::info!(
            user_id = %request.user_id,
            count = archived.len(),
            "Initiating retrievals for archived results"
        );

        // A failed initiation is logged and must not keep the user's
        // remaining records frozen.
        for record in &archived {
            if let Err(e) = self.initiate_for_record(record).await {
                tracing::error!(
                    job_id = %record.job_id,
                    error = %e,
                    "Retrieval initiation failed"
                );
            }
        }

        Disposition::Ack
    }

    async fn initiate_for_record(&self, record: &JobRecord) -> crate::error::Result<()> {
        let Some(archive_id) = record.archive_id.as_deref() else {
            return Ok(());
        };

        if let Err(e) = self
            .services
            .records
            .set_restore_message(record.job_id, RESTORE_IN_PROGRESS)
            .await
        {
            tracing::warn!(job_id = %record.job_id, error = %e, "Failed to set restore advisory");
        }

        let notify = self.services.queues.retrieval_notices.clone();
        let handle = match self
            .services
            .vault
            .initiate_retrieval(archive_id, RetrievalTier::Expedited, notify.clone())
            .await
        {
            Ok(handle) => handle,
            Err(CoordError::Capacity) => {
                tracing::info!(
                    job_id = %record.job_id,
                    "Expedited capacity exhausted, falling back to standard"
                );
                self.services
                    .vault
                    .initiate_retrieval(archive_id, RetrievalTier::Standard, notify)
                    .await?
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            job_id = %record.job_id,
            archive_id = %archive_id,
            retrieval_job = %handle,
            "Retrieval initiated"
        );
        Ok(())
    }
}
