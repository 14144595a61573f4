//! Queue payloads.
//!
//! Every message is a structured JSON document carrying all the fields
//! its consumer needs; nothing is ever derived by parsing compound
//! object keys. Messages are idempotency boundaries: the same payload
//! delivered twice recomputes the same record mutation, and the
//! store's conditional updates absorb the duplicate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::job::{JobStatus, ObjectRef};

/// Asks the submission consumer to stage and launch one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: Uuid,
    pub input: ObjectRef,
    pub file_name: String,
    pub user_email: String,
}

/// Published to the results-notification queue when a job finishes.
/// Consumed by an external notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub job_id: Uuid,
    pub user_email: String,
    pub status: JobStatus,
}

/// Asks the archive consumer to move one result to cold storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub user_id: String,
    pub job_id: Uuid,
    pub result_ref: ObjectRef,
}

/// Emitted on a tier upgrade; the restore orchestrator thaws every
/// archived result the user owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_request_roundtrip_keeps_structured_fields() {
        let req = JobRequest {
            job_id: Uuid::new_v4(),
            input: ObjectRef::new("inputs", "u1/abc~sample.vcf"),
            file_name: "sample.vcf".to_string(),
            user_email: "user@example.com".to_string(),
        };
        let body = serde_json::to_string(&req).unwrap();
        let parsed: JobRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.job_id, req.job_id);
        assert_eq!(parsed.input, req.input);
        assert_eq!(parsed.file_name, "sample.vcf");
    }

    #[test]
    fn completion_notice_uses_wire_status_names() {
        let notice = CompletionNotice {
            job_id: Uuid::new_v4(),
            user_email: "user@example.com".to_string(),
            status: JobStatus::Completed,
        };
        let body = serde_json::to_string(&notice).unwrap();
        assert!(body.contains("\"COMPLETED\""));
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(serde_json::from_str::<ArchiveRequest>("{\"user_id\": 42}").is_err());
    }
}
