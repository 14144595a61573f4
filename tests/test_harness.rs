//! Test harness for pipeline integration tests.
//!
//! Builds a fully in-process stack with short timings, a canned
//! analyzer, and direct handles to the concrete backends so tests can
//! inspect queues, records, objects, and vault state.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use coldflow::analysis::{AnalysisOutput, Analyzer, JobContext};
use coldflow::coordinator::{Queues, Services};
use coldflow::error::{CoordError, Result};
use coldflow::gateway::{self, NewJob};
use coldflow::store::job::ObjectRef;
use coldflow::store::object::ObjectStore;
use coldflow::store::{
    MemoryObjectStore, MemoryProfileStore, MemoryQueue, MemoryRecordStore, MemoryVault,
    ServiceTier,
};
use coldflow::CoordinatorConfig;

pub const INPUTS_BUCKET: &str = "test-inputs";
pub const RESULTS_BUCKET: &str = "test-results";

/// Analyzer that writes canned outputs next to the staged input.
pub struct FakeAnalyzer;

#[async_trait::async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, ctx: &JobContext) -> Result<AnalysisOutput> {
        let input = tokio::fs::read_to_string(&ctx.input_path).await?;

        let path = ctx.input_path.to_string_lossy();
        let stem = match path.rfind('.') {
            Some(dot) => &path[..dot],
            None => path.as_ref(),
        };
        let result_path = std::path::PathBuf::from(format!("{stem}.annot.vcf"));
        let log_path = std::path::PathBuf::from(format!("{path}.count.log"));

        tokio::fs::write(&result_path, format!("annotated:{input}")).await?;
        tokio::fs::write(&log_path, "records processed: 1\n").await?;

        Ok(AnalysisOutput {
            result_path,
            log_path,
        })
    }
}

/// Analyzer whose task never finishes; jobs stay Running.
pub struct StalledAnalyzer;

#[async_trait::async_trait]
impl Analyzer for StalledAnalyzer {
    async fn analyze(&self, _ctx: &JobContext) -> Result<AnalysisOutput> {
        std::future::pending().await
    }
}

/// Object store whose puts can be made to fail on demand.
pub struct FlakyObjectStore {
    inner: MemoryObjectStore,
    fail_puts: AtomicBool,
}

impl FlakyObjectStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, location: &ObjectRef) -> bool {
        self.inner.contains(location)
    }
}

#[async_trait::async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(&self, location: &ObjectRef, bytes: Vec<u8>) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(CoordError::Unavailable("object store offline".to_string()));
        }
        self.inner.put(location, bytes).await
    }

    async fn get(&self, location: &ObjectRef) -> Result<Vec<u8>> {
        self.inner.get(location).await
    }

    async fn delete(&self, location: &ObjectRef) -> Result<()> {
        self.inner.delete(location).await
    }

    async fn presigned_get_url(
        &self,
        location: &ObjectRef,
        expires_in: Duration,
    ) -> Result<String> {
        self.inner.presigned_get_url(location, expires_in).await
    }
}

/// One in-process stack with handles to every concrete backend.
pub struct TestStack {
    pub services: Services,
    pub config: CoordinatorConfig,
    pub records: Arc<MemoryRecordStore>,
    pub objects: Arc<FlakyObjectStore>,
    pub vault: Arc<MemoryVault>,
    pub profiles: Arc<MemoryProfileStore>,
    pub job_requests: Arc<MemoryQueue>,
    pub archive_requests: Arc<MemoryQueue>,
    pub restore_requests: Arc<MemoryQueue>,
    pub retrieval_notices: Arc<MemoryQueue>,
    pub completion_notices: Arc<MemoryQueue>,
    work_dir: tempfile::TempDir,
}

impl TestStack {
    pub fn new() -> Self {
        Self::with_analyzer(Arc::new(FakeAnalyzer), 2)
    }

    pub fn with_analyzer(analyzer: Arc<dyn Analyzer>, expedited_slots: usize) -> Self {
        let work_dir = tempfile::tempdir().expect("failed to create work dir");

        let config = CoordinatorConfig::new(work_dir.path(), RESULTS_BUCKET)
            .with_poll_wait(Duration::from_millis(50))
            .with_visibility_timeout(Duration::from_millis(400))
            .with_archive_grace(Duration::from_secs(2));
        let config = CoordinatorConfig {
            restore_dispatch_delay: Duration::from_millis(50),
            ..config
        };

        let records = Arc::new(MemoryRecordStore::new());
        let objects = Arc::new(FlakyObjectStore::new());
        let vault = Arc::new(MemoryVault::with_delays(
            expedited_slots,
            Duration::from_millis(100),
            Duration::from_millis(250),
        ));
        let profiles = Arc::new(MemoryProfileStore::new());

        let queue = |name: &str| Arc::new(MemoryQueue::new(name, config.visibility_timeout));
        let job_requests = queue("job-requests");
        let archive_requests = queue("archive-requests");
        let restore_requests = queue("restore-requests");
        let retrieval_notices = queue("retrieval-notices");
        let completion_notices = queue("completion-notices");

        let services = Services {
            records: records.clone(),
            objects: objects.clone(),
            vault: vault.clone(),
            profiles: profiles.clone(),
            analyzer,
            queues: Queues {
                job_requests: job_requests.clone(),
                archive_requests: archive_requests.clone(),
                restore_requests: restore_requests.clone(),
                retrieval_notices: retrieval_notices.clone(),
                completion_notices: completion_notices.clone(),
            },
        };

        Self {
            services,
            config,
            records,
            objects,
            vault,
            profiles,
            job_requests,
            archive_requests,
            restore_requests,
            retrieval_notices,
            completion_notices,
            work_dir,
        }
    }

    /// Upload an input blob and submit a job for it.
    pub async fn submit(&self, user_id: &str, file_name: &str, content: &str) -> Uuid {
        let input = ObjectRef::new(INPUTS_BUCKET, format!("{user_id}/{file_name}"));
        self.services
            .objects
            .put(&input, content.as_bytes().to_vec())
            .await
            .expect("input upload failed");

        gateway::submit_job(
            &self.services,
            NewJob {
                user_id: user_id.to_string(),
                user_email: format!("{user_id}@example.com"),
                file_name: file_name.to_string(),
                input,
            },
        )
        .await
        .expect("submission failed")
    }

    pub fn set_tier(&self, user_id: &str, tier: ServiceTier) {
        self.profiles.set_tier(user_id, tier);
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn assert_eventually<F, Fut>(mut condition: F, timeout: Duration, msg: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}: {msg}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
