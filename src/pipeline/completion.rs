use chrono::Utc;

use crate::analysis::{AnalysisOutput, JobContext};
use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::error::Result;
use crate::pipeline::message::{ArchiveRequest, CompletionNotice};
use crate::store::job::{JobStatus, ObjectRef};
use crate::store::profile::ServiceTier;

/// Finish a job whose analysis task has produced its output files.
///
/// Invoked as the continuation of the analysis task, not via a queue.
/// Uploads are best-effort: a failed upload is logged and the job
/// still completes, since a partial result beats a lost job. The local
/// working directory is removed regardless of upload outcome.
pub async fn complete_job(
    services: &Services,
    config: &CoordinatorConfig,
    ctx: &JobContext,
    output: &AnalysisOutput,
) -> Result<()> {
    let record = services.records.get(ctx.job_id).await?;

    let result_ref = record
        .input_ref
        .result_sibling(&config.results_bucket, &config.result_suffix);
    let log_ref = record
        .input_ref
        .log_sibling(&config.results_bucket, &config.log_suffix);

    upload_file(services, &output.result_path, &result_ref).await;
    upload_file(services, &output.log_path, &log_ref).await;

    if let Err(e) = tokio::fs::remove_dir_all(&ctx.job_dir).await {
        tracing::warn!(job_id = %ctx.job_id, error = %e, "Failed to remove job directory");
    }

    services
        .records
        .record_completion(ctx.job_id, result_ref.clone(), log_ref, Utc::now())
        .await?;
    tracing::info!(job_id = %ctx.job_id, result = %result_ref, "Job completed");

    let notice = CompletionNotice {
        job_id: ctx.job_id,
        user_email: ctx.user_email.clone(),
        status: JobStatus::Completed,
    };
    match serde_json::to_string(&notice) {
        Ok(body) => {
            if let Err(e) = services.queues.completion_notices.send(body).await {
                tracing::error!(job_id = %ctx.job_id, error = %e, "Failed to publish completion notice");
            }
        }
        Err(e) => {
            tracing::error!(job_id = %ctx.job_id, error = %e, "Failed to encode completion notice");
        }
    }

    // Free-tier results are archived after a grace period that lets
    // the owner download them first.
    let tier = services.profiles.tier_for(&record.user_id).await?;
    if tier == ServiceTier::Free {
        let request = ArchiveRequest {
            user_id: record.user_id.clone(),
            job_id: ctx.job_id,
            result_ref,
        };
        services
            .queues
            .archive_requests
            .send_delayed(serde_json::to_string(&request)?, config.archive_grace)
            .await?;
        tracing::info!(
            job_id = %ctx.job_id,
            delay_secs = config.archive_grace.as_secs(),
            "Archive request enqueued"
        );
    }

    Ok(())
}

async fn upload_file(services: &Services, path: &std::path::Path, target: &ObjectRef) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read output file");
            return;
        }
    };
    if let Err(e) = services.objects.put(target, bytes).await {
        tracing::error!(target = %target, error = %e, "Failed to upload output file");
    }
}
