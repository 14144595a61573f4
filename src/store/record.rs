//! Job record store: the authoritative state for every submitted job.
//!
//! One-time transitions are conditional writes guarded by the expected
//! prior state, so a duplicate or delayed message can never regress or
//! double-apply a transition. Writes that overwrite with the same
//! final value are unconditional. The conditional guard is the only
//! mutual-exclusion mechanism in the whole pipeline.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{CoordError, Result};
use crate::store::job::{JobRecord, JobStatus, ObjectRef};

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the record. Fails with `Conflict` if the job already
    /// exists — a record is created exactly once.
    async fn create(&self, record: JobRecord) -> Result<()>;

    async fn get(&self, job_id: Uuid) -> Result<JobRecord>;

    /// Conditional status transition: applied only when the current
    /// status equals `expected`, otherwise `Conflict`.
    async fn transition(&self, job_id: Uuid, expected: JobStatus, next: JobStatus) -> Result<()>;

    /// Unconditional completion update: result/log refs, completion
    /// timestamp, status Completed. Idempotent under redelivery.
    async fn record_completion(
        &self,
        job_id: Uuid,
        result_ref: ObjectRef,
        log_ref: ObjectRef,
        complete_time: DateTime<Utc>,
    ) -> Result<()>;

    /// Move the record to the archived state: sets `archive_id` and
    /// clears the live result ref, conditional on a live result ref
    /// being present. `Conflict` means another consumer already
    /// archived it.
    async fn archive_result(&self, job_id: Uuid, archive_id: &str) -> Result<()>;

    /// Inverse of [`archive_result`](Self::archive_result), applied
    /// unconditionally: sets the live result ref and clears
    /// `archive_id` and `restore_message`.
    async fn restore_result(&self, job_id: Uuid, result_ref: ObjectRef) -> Result<()>;

    /// Advisory text shown to the owner while a restore is in flight.
    async fn set_restore_message(&self, job_id: Uuid, message: &str) -> Result<()>;

    /// All of the user's jobs whose result lives only in cold storage.
    async fn archived_jobs_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>>;

    /// All of the user's jobs with a live, non-archived result.
    async fn live_results_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>>;

    /// Recover the owning record from an archive id. The thaw consumer
    /// uses this to correlate a retrieval completion with its job.
    async fn find_by_archive_id(&self, archive_id: &str) -> Result<Option<JobRecord>>;
}

/// In-process record table. Secondary lookups scan; a real backend
/// would use indexes on owner and archive id.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<Uuid, JobRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn missing(job_id: Uuid) -> CoordError {
    CoordError::NotFound(format!("job record {job_id}"))
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: JobRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.job_id) {
            return Err(CoordError::Conflict {
                job_id: record.job_id,
                expected: "no existing record".to_string(),
            });
        }
        records.insert(record.job_id, record);
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<JobRecord> {
        self.records
            .read()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| missing(job_id))
    }

    async fn transition(&self, job_id: Uuid, expected: JobStatus, next: JobStatus) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&job_id).ok_or_else(|| missing(job_id))?;
        if record.status != expected {
            return Err(CoordError::Conflict {
                job_id,
                expected: format!("status {expected}, found {}", record.status),
            });
        }
        record.status = next;
        Ok(())
    }

    async fn record_completion(
        &self,
        job_id: Uuid,
        result_ref: ObjectRef,
        log_ref: ObjectRef,
        complete_time: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&job_id).ok_or_else(|| missing(job_id))?;
        record.result_ref = Some(result_ref);
        record.log_ref = Some(log_ref);
        record.complete_time = Some(complete_time);
        record.status = JobStatus::Completed;
        Ok(())
    }

    async fn archive_result(&self, job_id: Uuid, archive_id: &str) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&job_id).ok_or_else(|| missing(job_id))?;
        if record.result_ref.is_none() {
            return Err(CoordError::Conflict {
                job_id,
                expected: "live result ref".to_string(),
            });
        }
        record.archive_id = Some(archive_id.to_string());
        record.result_ref = None;
        Ok(())
    }

    async fn restore_result(&self, job_id: Uuid, result_ref: ObjectRef) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&job_id).ok_or_else(|| missing(job_id))?;
        record.result_ref = Some(result_ref);
        record.archive_id = None;
        record.restore_message = None;
        Ok(())
    }

    async fn set_restore_message(&self, job_id: Uuid, message: &str) -> Result<()> {
        let mut records = self.records.write();
        let record = records.get_mut(&job_id).ok_or_else(|| missing(job_id))?;
        record.restore_message = Some(message.to_string());
        Ok(())
    }

    async fn archived_jobs_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.user_id == user_id && r.is_archived())
            .cloned()
            .collect())
    }

    async fn live_results_for_user(&self, user_id: &str) -> Result<Vec<JobRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.user_id == user_id && r.has_live_result())
            .cloned()
            .collect())
    }

    async fn find_by_archive_id(&self, archive_id: &str) -> Result<Option<JobRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.archive_id.as_deref() == Some(archive_id))
            .cloned())
    }
}
