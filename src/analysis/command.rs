use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::AnalyzerConfig;
use crate::error::{CoordError, Result};

use super::{AnalysisOutput, Analyzer, JobContext};

/// Runs the analysis tool as a subprocess.
///
/// The tool receives the staged input path as its single argument and
/// is expected to write its result and log files next to the input,
/// named by the configured suffixes.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    config: AnalyzerConfig,
}

impl CommandAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    fn expected_outputs(&self, input_path: &Path) -> AnalysisOutput {
        let input = input_path.to_string_lossy();
        let stem = match input.rfind('.') {
            Some(dot) => &input[..dot],
            None => input.as_ref(),
        };
        AnalysisOutput {
            result_path: PathBuf::from(format!("{stem}{}", self.config.result_suffix)),
            log_path: PathBuf::from(format!("{input}{}", self.config.log_suffix)),
        }
    }
}

#[async_trait::async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(&self, ctx: &JobContext) -> Result<AnalysisOutput> {
        let output = Command::new(&self.config.command)
            .arg(&ctx.input_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoordError::Unavailable(format!(
                "analysis tool exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let outputs = self.expected_outputs(&ctx.input_path);
        for path in [&outputs.result_path, &outputs.log_path] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(CoordError::Unavailable(format!(
                    "analysis tool produced no output at {}",
                    path.display()
                )));
            }
        }

        tracing::info!(
            job_id = %ctx.job_id,
            result = %outputs.result_path.display(),
            "Analysis tool finished"
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyzerConfig, CoordinatorConfig};

    fn analyzer() -> CommandAnalyzer {
        CommandAnalyzer::new(AnalyzerConfig::new("true", &CoordinatorConfig::default()))
    }

    #[test]
    fn expected_outputs_derive_from_input_path() {
        let outputs = analyzer().expected_outputs(Path::new("/work/j1/sample.vcf"));
        assert_eq!(
            outputs.result_path,
            PathBuf::from("/work/j1/sample.annot.vcf")
        );
        assert_eq!(
            outputs.log_path,
            PathBuf::from("/work/j1/sample.vcf.count.log")
        );
    }

    #[test]
    fn expected_outputs_without_extension() {
        let outputs = analyzer().expected_outputs(Path::new("/work/j1/sample"));
        assert_eq!(outputs.result_path, PathBuf::from("/work/j1/sample.annot.vcf"));
        assert_eq!(outputs.log_path, PathBuf::from("/work/j1/sample.count.log"));
    }
}
