//! Archive consumer behavior: tier re-checks, duplicate deliveries,
//! and the conditional record update.

mod test_harness;

use chrono::Utc;
use uuid::Uuid;

use coldflow::pipeline::archive::ArchiveConsumer;
use coldflow::pipeline::message::ArchiveRequest;
use coldflow::pipeline::Disposition;
use coldflow::store::{JobRecord, ObjectRef, ObjectStore, RecordStore, ServiceTier};
use test_harness::{TestStack, INPUTS_BUCKET, RESULTS_BUCKET};

/// Create a completed record with a live result blob, returning the
/// archive request a completion handler would have enqueued for it.
async fn completed_job(stack: &TestStack, user_id: &str) -> (Uuid, ObjectRef, String) {
    let job_id = Uuid::new_v4();
    let input = ObjectRef::new(INPUTS_BUCKET, format!("{user_id}/sample.vcf"));
    let record = JobRecord::new(job_id, user_id, format!("{user_id}@example.com"), input, "sample.vcf");
    stack.records.create(record).await.unwrap();

    let result_ref = ObjectRef::new(RESULTS_BUCKET, format!("{user_id}/sample.annot.vcf"));
    let log_ref = ObjectRef::new(RESULTS_BUCKET, format!("{user_id}/sample.vcf.count.log"));
    stack
        .records
        .record_completion(job_id, result_ref.clone(), log_ref, Utc::now())
        .await
        .unwrap();
    stack
        .services
        .objects
        .put(&result_ref, b"annotated".to_vec())
        .await
        .unwrap();

    let body = serde_json::to_string(&ArchiveRequest {
        user_id: user_id.to_string(),
        job_id,
        result_ref: result_ref.clone(),
    })
    .unwrap();

    (job_id, result_ref, body)
}

#[tokio::test]
async fn archival_moves_result_to_cold_storage() {
    let stack = TestStack::new();
    stack.set_tier("u1", ServiceTier::Free);
    let (job_id, result_ref, body) = completed_job(&stack, "u1").await;

    let consumer = ArchiveConsumer::new(stack.services.clone(), stack.config.clone());
    assert_eq!(consumer.handle(&body).await, Disposition::Ack);

    let record = stack.records.get(job_id).await.unwrap();
    assert!(record.is_archived());
    assert_eq!(stack.vault.archive_count(), 1);
    assert!(!stack.objects.contains(&result_ref));
}

#[tokio::test]
async fn tier_upgrade_cancels_pending_archival() {
    let stack = TestStack::new();
    stack.set_tier("u2", ServiceTier::Free);
    let (job_id, result_ref, body) = completed_job(&stack, "u2").await;

    // The owner upgraded between enqueue and processing.
    stack.set_tier("u2", ServiceTier::Premium);

    let consumer = ArchiveConsumer::new(stack.services.clone(), stack.config.clone());
    assert_eq!(consumer.handle(&body).await, Disposition::Ack);

    let record = stack.records.get(job_id).await.unwrap();
    assert!(record.has_live_result());
    assert_eq!(stack.vault.archive_count(), 0);
    assert!(stack.objects.contains(&result_ref));
}

#[tokio::test]
async fn archiving_missing_result_is_a_noop() {
    let stack = TestStack::new();
    stack.set_tier("u3", ServiceTier::Free);
    let (job_id, result_ref, body) = completed_job(&stack, "u3").await;

    let consumer = ArchiveConsumer::new(stack.services.clone(), stack.config.clone());
    assert_eq!(consumer.handle(&body).await, Disposition::Ack);
    assert_eq!(stack.vault.archive_count(), 1);

    // Duplicate delivery after the object is gone: message-delete only.
    assert_eq!(consumer.handle(&body).await, Disposition::Ack);
    assert_eq!(stack.vault.archive_count(), 1);

    let record = stack.records.get(job_id).await.unwrap();
    assert!(record.is_archived());
    assert!(!stack.objects.contains(&result_ref));
}

#[tokio::test]
async fn losing_the_conditional_update_drops_the_duplicate_vault_copy() {
    let stack = TestStack::new();
    stack.set_tier("u4", ServiceTier::Free);
    let (job_id, result_ref, body) = completed_job(&stack, "u4").await;

    // A concurrent consumer already archived the record, but its
    // object delete has not landed yet (transient overlap).
    stack
        .records
        .archive_result(job_id, "competing-archive")
        .await
        .unwrap();

    let consumer = ArchiveConsumer::new(stack.services.clone(), stack.config.clone());
    assert_eq!(consumer.handle(&body).await, Disposition::Ack);

    // Our vault copy was dropped; the winner's state is untouched.
    assert_eq!(stack.vault.archive_count(), 0);
    let record = stack.records.get(job_id).await.unwrap();
    assert_eq!(record.archive_id.as_deref(), Some("competing-archive"));
    assert!(stack.objects.contains(&result_ref));
}

#[tokio::test]
async fn malformed_archive_request_is_dropped() {
    let stack = TestStack::new();
    let consumer = ArchiveConsumer::new(stack.services.clone(), stack.config.clone());
    assert_eq!(consumer.handle("{}").await, Disposition::Ack);
    assert_eq!(stack.vault.archive_count(), 0);
}
