//! The lifecycle coordination pipeline: five independent consumers
//! connected only through queues and the shared stores.
//!
//! - [`submission`]: job-request queue → staged input, launched
//!   analysis task, record Pending→Running.
//! - [`completion`]: analysis continuation → result/log upload, record
//!   Completed, owner notification, delayed archive request.
//! - [`archive`]: archive-request queue → result moved to cold
//!   storage, live copy deleted.
//! - [`restore`]: restore-request queue → retrieval initiated per
//!   archived record, Expedited with Standard fallback.
//! - [`thaw`]: retrieval-notice queue → blob re-uploaded, record
//!   restored, archive copy deleted.
//!
//! Any consumer may run as multiple concurrent instances; the queue's
//! at-least-once delivery plus the record store's conditional updates
//! are the only coordination.

pub mod archive;
pub mod completion;
pub mod message;
pub mod restore;
pub mod submission;
pub mod thaw;

/// What a consumer decided about the message it just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Work is durably applied or deliberately skipped: acknowledge
    /// (delete) the message.
    Ack,
    /// A transient failure interrupted the mutation: leave the message
    /// for queue redelivery.
    Retry,
}
