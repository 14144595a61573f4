//! Cold-storage tier: write-once archives with asynchronous retrieval.
//!
//! Retrieval is the one genuinely asynchronous external operation in
//! the pipeline: initiation returns a job handle immediately and the
//! outcome arrives later as a message on a notification queue. No
//! in-process state correlates the two ends — the thaw consumer
//! re-queries the record store by archive id when the notice lands.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoordError, Result};
use crate::store::queue::MessageQueue;

/// Retrieval speed tier. Expedited is capacity-constrained and callers
/// fall back to Standard when it is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalTier {
    Expedited,
    Standard,
}

impl std::fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalTier::Expedited => write!(f, "expedited"),
            RetrievalTier::Standard => write!(f, "standard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalStatus {
    Succeeded,
    Failed,
}

/// Posted to the notification queue when a retrieval finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalNotice {
    pub status: RetrievalStatus,
    pub retrieval_job: String,
    pub archive_id: String,
}

#[async_trait::async_trait]
pub trait ColdVault: Send + Sync {
    /// Write a blob to the archive tier, returning its archive id.
    async fn upload(&self, bytes: Vec<u8>) -> Result<String>;

    /// Start an asynchronous retrieval. Returns the retrieval job
    /// handle; completion is announced on `notify` as a serialized
    /// [`RetrievalNotice`]. Fails with `Capacity` when the Expedited
    /// tier has no slots left.
    async fn initiate_retrieval(
        &self,
        archive_id: &str,
        tier: RetrievalTier,
        notify: Arc<dyn MessageQueue>,
    ) -> Result<String>;

    /// Download the blob staged by a finished retrieval job.
    async fn retrieval_output(&self, retrieval_job: &str) -> Result<Vec<u8>>;

    /// Remove an archive. Missing archives are a no-op.
    async fn delete_archive(&self, archive_id: &str) -> Result<()>;
}

struct VaultInner {
    archives: Mutex<HashMap<String, Vec<u8>>>,
    /// Outputs staged by completed retrieval jobs, keyed by handle.
    outputs: Mutex<HashMap<String, Vec<u8>>>,
    expedited_slots: AtomicUsize,
    expedited_delay: Duration,
    standard_delay: Duration,
    initiations: Mutex<Vec<(String, RetrievalTier)>>,
}

/// In-process cold-storage backend.
///
/// Simulates the tier's defining behaviors: retrieval takes time
/// (longer on Standard), completes by posting a notice to a queue, and
/// the Expedited tier has a bounded number of concurrent slots.
pub struct MemoryVault {
    inner: Arc<VaultInner>,
}

impl MemoryVault {
    pub fn new(expedited_slots: usize) -> Self {
        Self::with_delays(
            expedited_slots,
            Duration::from_secs(2),
            Duration::from_secs(20),
        )
    }

    pub fn with_delays(
        expedited_slots: usize,
        expedited_delay: Duration,
        standard_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(VaultInner {
                archives: Mutex::new(HashMap::new()),
                outputs: Mutex::new(HashMap::new()),
                expedited_slots: AtomicUsize::new(expedited_slots),
                expedited_delay,
                standard_delay,
                initiations: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn archive_count(&self) -> usize {
        self.inner.archives.lock().len()
    }

    pub fn contains_archive(&self, archive_id: &str) -> bool {
        self.inner.archives.lock().contains_key(archive_id)
    }

    /// Every retrieval initiation accepted so far, in order.
    pub fn initiations(&self) -> Vec<(String, RetrievalTier)> {
        self.inner.initiations.lock().clone()
    }
}

#[async_trait::async_trait]
impl ColdVault for MemoryVault {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String> {
        let archive_id = Uuid::new_v4().simple().to_string();
        self.inner.archives.lock().insert(archive_id.clone(), bytes);
        Ok(archive_id)
    }

    async fn initiate_retrieval(
        &self,
        archive_id: &str,
        tier: RetrievalTier,
        notify: Arc<dyn MessageQueue>,
    ) -> Result<String> {
        let bytes = self
            .inner
            .archives
            .lock()
            .get(archive_id)
            .cloned()
            .ok_or_else(|| CoordError::NotFound(format!("archive {archive_id}")))?;

        let slot_held = match tier {
            RetrievalTier::Expedited => {
                let acquired = self
                    .inner
                    .expedited_slots
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if !acquired {
                    return Err(CoordError::Capacity);
                }
                true
            }
            RetrievalTier::Standard => false,
        };

        let retrieval_job = Uuid::new_v4().simple().to_string();
        self.inner
            .initiations
            .lock()
            .push((archive_id.to_string(), tier));

        let delay = match tier {
            RetrievalTier::Expedited => self.inner.expedited_delay,
            RetrievalTier::Standard => self.inner.standard_delay,
        };

        let inner = self.inner.clone();
        let job = retrieval_job.clone();
        let archive = archive_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            inner.outputs.lock().insert(job.clone(), bytes);
            if slot_held {
                inner.expedited_slots.fetch_add(1, Ordering::SeqCst);
            }

            let notice = RetrievalNotice {
                status: RetrievalStatus::Succeeded,
                retrieval_job: job.clone(),
                archive_id: archive.clone(),
            };
            let body = match serde_json::to_string(&notice) {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode retrieval notice");
                    return;
                }
            };
            if let Err(e) = notify.send(body).await {
                tracing::error!(
                    archive_id = %archive,
                    retrieval_job = %job,
                    error = %e,
                    "Failed to publish retrieval notice"
                );
            }
        });

        Ok(retrieval_job)
    }

    async fn retrieval_output(&self, retrieval_job: &str) -> Result<Vec<u8>> {
        self.inner
            .outputs
            .lock()
            .get(retrieval_job)
            .cloned()
            .ok_or_else(|| CoordError::NotFound(format!("retrieval job {retrieval_job}")))
    }

    async fn delete_archive(&self, archive_id: &str) -> Result<()> {
        self.inner.archives.lock().remove(archive_id);
        Ok(())
    }
}
