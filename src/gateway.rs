//! Boundary helpers for the (out-of-scope) web front end.
//!
//! The front end owns uploads, sessions, and subscription state; these
//! helpers are the only way it touches the pipeline: creating the
//! Pending record plus its job-request message, dispatching a restore
//! after a tier upgrade, sweeping live results to the archive queue
//! after a downgrade, and minting download URLs.

use std::time::Duration;

use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::error::Result;
use crate::pipeline::message::{ArchiveRequest, JobRequest, RestoreRequest};
use crate::store::job::{JobRecord, ObjectRef};

/// Parameters of one incoming submission. The input blob is already in
/// the object store when this is called (the front end uploads it
/// directly).
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub user_email: String,
    pub file_name: String,
    pub input: ObjectRef,
}

/// Create the job record (Pending) and enqueue its job request.
/// Returns the new job id.
pub async fn submit_job(services: &Services, new_job: NewJob) -> Result<Uuid> {
    let job_id = Uuid::new_v4();

    let record = JobRecord::new(
        job_id,
        new_job.user_id,
        new_job.user_email.clone(),
        new_job.input.clone(),
        new_job.file_name.clone(),
    );
    services.records.create(record).await?;

    let request = JobRequest {
        job_id,
        input: new_job.input,
        file_name: new_job.file_name,
        user_email: new_job.user_email,
    };
    services
        .queues
        .job_requests
        .send(serde_json::to_string(&request)?)
        .await?;

    tracing::info!(job_id = %job_id, "Job submitted");
    Ok(job_id)
}

/// Dispatch a restore request after a tier upgrade. The short delay
/// lets the subscription write settle before the orchestrator
/// re-checks it.
pub async fn request_restore(
    services: &Services,
    config: &CoordinatorConfig,
    user_id: &str,
) -> Result<()> {
    let request = RestoreRequest {
        user_id: user_id.to_string(),
    };
    services
        .queues
        .restore_requests
        .send_delayed(
            serde_json::to_string(&request)?,
            config.restore_dispatch_delay,
        )
        .await?;
    tracing::info!(user_id = %user_id, "Restore requested");
    Ok(())
}

/// Enqueue an archive request for every live result the user owns.
/// Called after a downgrade; requests are sent without a grace delay.
/// Returns how many were enqueued.
pub async fn archive_user_results(services: &Services, user_id: &str) -> Result<usize> {
    let live = services.records.live_results_for_user(user_id).await?;
    let mut enqueued = 0;

    for record in live {
        let Some(result_ref) = record.result_ref else {
            continue;
        };
        let request = ArchiveRequest {
            user_id: user_id.to_string(),
            job_id: record.job_id,
            result_ref,
        };
        services
            .queues
            .archive_requests
            .send(serde_json::to_string(&request)?)
            .await?;
        enqueued += 1;
    }

    tracing::info!(user_id = %user_id, count = enqueued, "Archive sweep enqueued");
    Ok(enqueued)
}

/// Presigned download URL for a job's live result, or `None` while the
/// result is archived or not yet produced.
pub async fn result_download_url(
    services: &Services,
    job_id: Uuid,
    expires_in: Duration,
) -> Result<Option<String>> {
    let record = services.records.get(job_id).await?;
    match record.result_ref {
        Some(result_ref) => Ok(Some(
            services
                .objects
                .presigned_get_url(&result_ref, expires_in)
                .await?,
        )),
        None => Ok(None),
    }
}
