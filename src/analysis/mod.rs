//! Boundary to the black-box analysis tool.
//!
//! The tool itself is an external collaborator; this module defines
//! its launch-and-callback contract. Each job is launched
//! fire-and-forget as a background task that runs the analyzer over
//! the staged input and then continues into the completion handler.
//! A task that fails after launch only logs: the record stays Running
//! and is surfaced by external monitoring, not by this pipeline.

pub mod command;

pub use command::CommandAnalyzer;

use std::path::PathBuf;

use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::coordinator::Services;
use crate::error::Result;
use crate::pipeline::completion;

/// Everything the analysis task needs about one launched job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub user_email: String,
    /// Staged input file inside the job directory.
    pub input_path: PathBuf,
    /// Job-scoped working directory, removed after completion.
    pub job_dir: PathBuf,
}

/// Files the analysis tool produced for one job.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub result_path: PathBuf,
    pub log_path: PathBuf,
}

#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Run the analysis over the staged input and report the output
    /// file locations.
    async fn analyze(&self, ctx: &JobContext) -> Result<AnalysisOutput>;
}

/// Launch the analysis task for a staged job and return immediately.
///
/// The spawned task invokes the completion handler when the analyzer
/// finishes.
pub fn spawn_analysis(services: Services, config: CoordinatorConfig, ctx: JobContext) {
    tokio::spawn(async move {
        tracing::info!(job_id = %ctx.job_id, input = %ctx.input_path.display(), "Analysis task started");
        match services.analyzer.analyze(&ctx).await {
            Ok(output) => {
                if let Err(e) = completion::complete_job(&services, &config, &ctx, &output).await {
                    tracing::error!(job_id = %ctx.job_id, error = %e, "Completion handling failed");
                }
            }
            Err(e) => {
                tracing::error!(
                    job_id = %ctx.job_id,
                    error = %e,
                    "Analysis task failed; record left in its current state"
                );
            }
        }
    });
}
