//! Pull-based message queue with at-least-once delivery.
//!
//! Mirrors the semantics the pipeline depends on: one message per
//! receive, bounded long-poll wait, per-receive receipt handles,
//! visibility timeout with redelivery, and delayed first visibility.
//! Deleting with a stale receipt (the message was already redelivered)
//! is a silent no-op — duplicates are the consumer's problem, which is
//! why every record mutation is idempotent or conditional.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::Result;

/// Opaque acknowledgment handle for one delivery of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(Uuid);

/// One delivered message. The body is redelivered verbatim if the
/// receipt is never used before the visibility timeout lapses.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt: ReceiptHandle,
}

#[async_trait::async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a message, visible after `delay`.
    async fn send_delayed(&self, body: String, delay: Duration) -> Result<()>;

    /// Enqueue an immediately visible message.
    async fn send(&self, body: String) -> Result<()> {
        self.send_delayed(body, Duration::ZERO).await
    }

    /// Pull at most one visible message, waiting up to `wait` for one
    /// to become available. The message stays invisible to other
    /// consumers until deleted or until the visibility timeout lapses.
    async fn receive(&self, wait: Duration) -> Result<Option<ReceivedMessage>>;

    /// Acknowledge one delivery. A stale receipt is a no-op.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()>;
}

struct Stored {
    body: String,
    visible_at: Instant,
    /// Receipt of the delivery currently in flight, if any. Replaced
    /// on redelivery, which invalidates the previous handle.
    receipt: Option<Uuid>,
}

/// In-process queue backend.
///
/// Implements the full delivery contract rather than a plain channel
/// so that duplicate-delivery and redelivery-after-crash behavior is
/// exercised for real by the integration tests.
pub struct MemoryQueue {
    name: String,
    visibility: Duration,
    inner: Mutex<Vec<Stored>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, visibility: Duration) -> Self {
        Self {
            name: name.into(),
            visibility,
            inner: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total messages held, including in-flight and not-yet-visible.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Messages a `receive` issued right now could claim.
    pub fn visible_len(&self) -> usize {
        let now = Instant::now();
        self.inner.lock().iter().filter(|m| m.visible_at <= now).count()
    }

    /// Claim the first visible message, or report when the next one
    /// becomes visible.
    fn try_claim(&self) -> (Option<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut queue = self.inner.lock();

        if let Some(stored) = queue.iter_mut().find(|m| m.visible_at <= now) {
            let receipt = Uuid::new_v4();
            stored.receipt = Some(receipt);
            stored.visible_at = now + self.visibility;
            let message = ReceivedMessage {
                body: stored.body.clone(),
                receipt: ReceiptHandle(receipt),
            };
            return (Some(message), None);
        }

        let next_visible = queue.iter().map(|m| m.visible_at).min();
        (None, next_visible)
    }
}

#[async_trait::async_trait]
impl MessageQueue for MemoryQueue {
    async fn send_delayed(&self, body: String, delay: Duration) -> Result<()> {
        {
            let mut queue = self.inner.lock();
            queue.push(Stored {
                body,
                visible_at: Instant::now() + delay,
                receipt: None,
            });
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> Result<Option<ReceivedMessage>> {
        let deadline = Instant::now() + wait;

        loop {
            // Register for wakeups before scanning so a send landing
            // between the scan and the await is not lost.
            let notified = self.notify.notified();

            let (claimed, next_visible) = self.try_claim();
            if claimed.is_some() {
                return Ok(claimed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wake_at = match next_visible {
                Some(at) if at < deadline => at,
                _ => deadline,
            };

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        let mut queue = self.inner.lock();
        queue.retain(|m| m.receipt != Some(receipt.0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> MemoryQueue {
        MemoryQueue::new("test", Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn receive_returns_sent_message() {
        let q = queue();
        q.send("hello".to_string()).await.unwrap();

        let msg = q.receive(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(msg.body, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_receive_returns_none_after_wait() {
        let q = queue();
        let start = Instant::now();
        let msg = q.receive(Duration::from_secs(5)).await.unwrap();
        assert!(msg.is_none());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn received_message_is_invisible_until_timeout() {
        let q = queue();
        q.send("work".to_string()).await.unwrap();

        let first = q.receive(Duration::from_secs(1)).await.unwrap();
        assert!(first.is_some());

        // In flight: nothing to claim.
        assert!(q.receive(Duration::from_secs(1)).await.unwrap().is_none());

        // Past the visibility timeout the message is redelivered.
        let again = q.receive(Duration::from_secs(60)).await.unwrap().unwrap();
        assert_eq!(again.body, "work");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_acknowledges_message() {
        let q = queue();
        q.send("done".to_string()).await.unwrap();

        let msg = q.receive(Duration::from_secs(1)).await.unwrap().unwrap();
        q.delete(&msg.receipt).await.unwrap();

        assert!(q.is_empty());
        assert!(q.receive(Duration::from_secs(60)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_receipt_delete_is_noop() {
        let q = queue();
        q.send("twice".to_string()).await.unwrap();

        let first = q.receive(Duration::from_secs(1)).await.unwrap().unwrap();

        // Visibility lapses; the message is claimed again.
        let second = q.receive(Duration::from_secs(60)).await.unwrap().unwrap();
        assert_eq!(second.body, "twice");

        // The first delivery's receipt no longer acknowledges it.
        q.delete(&first.receipt).await.unwrap();
        assert_eq!(q.len(), 1);

        q.delete(&second.receipt).await.unwrap();
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_message_becomes_visible_after_delay() {
        let q = queue();
        q.send_delayed("later".to_string(), Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(q.visible_len(), 0);

        assert!(q.receive(Duration::from_secs(10)).await.unwrap().is_none());

        let msg = q.receive(Duration::from_secs(300)).await.unwrap().unwrap();
        assert_eq!(msg.body, "later");
    }

    #[tokio::test(start_paused = true)]
    async fn receive_wakes_on_concurrent_send() {
        let q = std::sync::Arc::new(queue());

        let receiver = {
            let q = q.clone();
            tokio::spawn(async move { q.receive(Duration::from_secs(30)).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        q.send("ping".to_string()).await.unwrap();

        let msg = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(msg.body, "ping");
    }
}
