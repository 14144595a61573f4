//! Ports to the pipeline's external collaborators — record store,
//! message queues, object store, cold vault, profile lookup — plus
//! in-process backends used by tests and the local runner.

pub mod job;
pub mod object;
pub mod profile;
pub mod queue;
pub mod record;
pub mod vault;

pub use job::{JobRecord, JobStatus, ObjectRef};
pub use object::{MemoryObjectStore, ObjectStore};
pub use profile::{MemoryProfileStore, ProfileStore, ServiceTier};
pub use queue::{MemoryQueue, MessageQueue, ReceiptHandle, ReceivedMessage};
pub use record::{MemoryRecordStore, RecordStore};
pub use vault::{ColdVault, MemoryVault, RetrievalNotice, RetrievalStatus, RetrievalTier};
