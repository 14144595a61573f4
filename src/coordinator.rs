use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::Analyzer;
use crate::config::CoordinatorConfig;
use crate::pipeline::archive::ArchiveConsumer;
use crate::pipeline::restore::RestoreOrchestrator;
use crate::pipeline::submission::SubmissionConsumer;
use crate::pipeline::thaw::ThawConsumer;
use crate::store::object::ObjectStore;
use crate::store::profile::ProfileStore;
use crate::store::queue::{MemoryQueue, MessageQueue};
use crate::store::record::RecordStore;
use crate::store::vault::ColdVault;
use crate::store::{MemoryObjectStore, MemoryProfileStore, MemoryRecordStore, MemoryVault};

/// The five logical queues the pipeline communicates through.
#[derive(Clone)]
pub struct Queues {
    pub job_requests: Arc<dyn MessageQueue>,
    pub archive_requests: Arc<dyn MessageQueue>,
    pub restore_requests: Arc<dyn MessageQueue>,
    pub retrieval_notices: Arc<dyn MessageQueue>,
    /// Send-only here; drained by an external notifier.
    pub completion_notices: Arc<dyn MessageQueue>,
}

/// Shared handles to every external collaborator. Cheap to clone;
/// every consumer and the analysis continuation hold their own copy.
#[derive(Clone)]
pub struct Services {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub vault: Arc<dyn ColdVault>,
    pub profiles: Arc<dyn ProfileStore>,
    pub analyzer: Arc<dyn Analyzer>,
    pub queues: Queues,
}

impl Services {
    /// Build a fully in-process stack: memory-backed stores and
    /// queues, suitable for the local runner and tests.
    pub fn in_memory(config: &CoordinatorConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        let q = |name: &str| -> Arc<dyn MessageQueue> {
            Arc::new(MemoryQueue::new(name, config.visibility_timeout))
        };
        Self {
            records: Arc::new(MemoryRecordStore::new()),
            objects: Arc::new(MemoryObjectStore::new()),
            vault: Arc::new(MemoryVault::new(2)),
            profiles: Arc::new(MemoryProfileStore::new()),
            analyzer,
            queues: Queues {
                job_requests: q("job-requests"),
                archive_requests: q("archive-requests"),
                restore_requests: q("restore-requests"),
                retrieval_notices: q("retrieval-notices"),
                completion_notices: q("completion-notices"),
            },
        }
    }
}

/// Spawns and tracks the consumer loops.
///
/// Each consumer is an independent task polling its own queue; more
/// instances of any consumer may be spawned (here or in another
/// process) without coordination, since all cross-instance safety
/// lives in the queue and the record store's conditional updates.
pub struct Coordinator {
    services: Services,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(services: Services, config: CoordinatorConfig) -> Self {
        Self { services, config }
    }

    /// Start one instance of every consumer under `cancel`.
    pub fn spawn_consumers(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let submission =
            SubmissionConsumer::new(self.services.clone(), self.config.clone());
        let archive = ArchiveConsumer::new(self.services.clone(), self.config.clone());
        let restore = RestoreOrchestrator::new(self.services.clone(), self.config.clone());
        let thaw = ThawConsumer::new(self.services.clone(), self.config.clone());

        vec![
            tokio::spawn(submission.run(cancel.clone())),
            tokio::spawn(archive.run(cancel.clone())),
            tokio::spawn(restore.run(cancel.clone())),
            tokio::spawn(thaw.run(cancel.clone())),
        ]
    }

    /// Run every consumer until `cancel` fires, then wait for each
    /// loop to drain its in-flight message.
    pub async fn run(&self, cancel: CancellationToken) {
        let handles = self.spawn_consumers(&cancel);
        cancel.cancelled().await;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Consumer task panicked");
            }
        }
    }
}
