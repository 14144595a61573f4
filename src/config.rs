use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the lifecycle coordination pipeline.
///
/// Built once at process start and passed explicitly to every
/// component; there is no ambient global configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Local staging area; each job gets its own subdirectory.
    pub work_dir: PathBuf,
    /// Object-store bucket that holds result and log blobs.
    pub results_bucket: String,
    /// Long-poll wait for every queue receive. Bounds the busy-loop
    /// cost; consumers simply poll again on an empty receive.
    pub poll_wait: Duration,
    /// How long a received message stays invisible before the queue
    /// redelivers it to another consumer.
    pub visibility_timeout: Duration,
    /// Grace period before a free-tier result is moved to cold
    /// storage, giving the owner a window to download it.
    pub archive_grace: Duration,
    /// Delay applied to restore-request dispatch after a tier upgrade.
    pub restore_dispatch_delay: Duration,
    /// Appended to the input key's stem to form the result key.
    pub result_suffix: String,
    /// Appended to the full input key to form the log key.
    pub log_suffix: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./work"),
            results_bucket: "coldflow-results".to_string(),
            poll_wait: Duration::from_secs(10),
            visibility_timeout: Duration::from_secs(30),
            archive_grace: Duration::from_secs(300),
            restore_dispatch_delay: Duration::from_secs(10),
            result_suffix: ".annot.vcf".to_string(),
            log_suffix: ".count.log".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(work_dir: impl Into<PathBuf>, results_bucket: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            results_bucket: results_bucket.into(),
            ..Default::default()
        }
    }

    pub fn with_poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_archive_grace(mut self, grace: Duration) -> Self {
        self.archive_grace = grace;
        self
    }
}

/// Configuration for the external analysis tool invoked per job.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Program run for each staged input; receives the input path as
    /// its single argument and writes its outputs next to the input.
    pub command: String,
    /// Suffix of the result file the tool writes (input stem + suffix).
    pub result_suffix: String,
    /// Suffix of the log file the tool writes (input path + suffix).
    pub log_suffix: String,
}

impl AnalyzerConfig {
    pub fn new(command: impl Into<String>, coord: &CoordinatorConfig) -> Self {
        Self {
            command: command.into(),
            result_suffix: coord.result_suffix.clone(),
            log_suffix: coord.log_suffix.clone(),
        }
    }
}
