use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Object-store locator: bucket plus key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Locator of the result blob derived from this input locator:
    /// the key's final extension is replaced by `result_suffix`, in a
    /// sibling bucket of the caller's choosing.
    pub fn result_sibling(&self, results_bucket: &str, result_suffix: &str) -> ObjectRef {
        let stem = match self.key.rfind('.') {
            Some(dot) => &self.key[..dot],
            None => self.key.as_str(),
        };
        ObjectRef::new(results_bucket, format!("{stem}{result_suffix}"))
    }

    /// Locator of the log blob: `log_suffix` appended to the full key.
    pub fn log_sibling(&self, results_bucket: &str, log_suffix: &str) -> ObjectRef {
        ObjectRef::new(results_bucket, format!("{}{log_suffix}", self.key))
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Authoritative state object for one submitted analysis job.
///
/// Created once by the intake path and never deleted; consumers only
/// advance it. A result is either live in the object store
/// (`result_ref` set) or archived (`archive_id` set); a transient
/// overlap during archival/restore is tolerated, never both absent
/// after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub user_id: String,
    pub user_email: String,
    pub status: JobStatus,
    pub input_ref: ObjectRef,
    pub input_file_name: String,
    pub result_ref: Option<ObjectRef>,
    pub log_ref: Option<ObjectRef>,
    pub archive_id: Option<String>,
    pub submit_time: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
    pub restore_message: Option<String>,
}

impl JobRecord {
    pub fn new(
        job_id: Uuid,
        user_id: impl Into<String>,
        user_email: impl Into<String>,
        input_ref: ObjectRef,
        input_file_name: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            user_id: user_id.into(),
            user_email: user_email.into(),
            status: JobStatus::Pending,
            input_ref,
            input_file_name: input_file_name.into(),
            result_ref: None,
            log_ref: None,
            archive_id: None,
            submit_time: Utc::now(),
            complete_time: None,
            restore_message: None,
        }
    }

    /// The result lives only in cold storage.
    pub fn is_archived(&self) -> bool {
        self.archive_id.is_some() && self.result_ref.is_none()
    }

    /// The result is downloadable from the object store.
    pub fn has_live_result(&self) -> bool {
        self.result_ref.is_some() && self.archive_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        let status: JobStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, JobStatus::Pending);
    }

    #[test]
    fn result_sibling_replaces_extension() {
        let input = ObjectRef::new("inputs", "user1/abc~sample.vcf");
        let result = input.result_sibling("results", ".annot.vcf");
        assert_eq!(result.bucket, "results");
        assert_eq!(result.key, "user1/abc~sample.annot.vcf");
    }

    #[test]
    fn result_sibling_without_extension_uses_whole_key() {
        let input = ObjectRef::new("inputs", "user1/sample");
        let result = input.result_sibling("results", ".out");
        assert_eq!(result.key, "user1/sample.out");
    }

    #[test]
    fn log_sibling_appends_to_full_key() {
        let input = ObjectRef::new("inputs", "user1/sample.vcf");
        let log = input.log_sibling("results", ".count.log");
        assert_eq!(log.key, "user1/sample.vcf.count.log");
    }

    #[test]
    fn new_record_starts_pending() {
        let record = JobRecord::new(
            Uuid::new_v4(),
            "user-1",
            "user@example.com",
            ObjectRef::new("inputs", "user-1/sample.vcf"),
            "sample.vcf",
        );
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.result_ref.is_none());
        assert!(record.archive_id.is_none());
        assert!(record.complete_time.is_none());
        assert!(!record.is_archived());
        assert!(!record.has_live_result());
    }
}
