use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use relay_core::{Message, NewMessage};
use relay_delivery::{DeliveryError, MessageSender};
use relay_outbox::{
    BatchProcessor, CycleError, CycleReport, MessageRepository, OutboxTx, SqliteMessageRepository,
    StoreError,
};
use tokio::sync::Notify;

/// Records every attempt and fails the ids it was told to.
struct ScriptedSender {
    fail: Vec<i64>,
    attempts: Mutex<Vec<i64>>,
}

impl ScriptedSender {
    fn new(fail: Vec<i64>) -> Arc<Self> {
        Arc::new(Self {
            fail,
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> Vec<i64> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for ScriptedSender {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, msg: &Message) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(msg.id);
        if self.fail.contains(&msg.id) {
            return Err(DeliveryError::Rejected { status: 503 });
        }
        Ok(())
    }
}

/// Blocks inside `send` until released.
struct GatedSender {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MessageSender for GatedSender {
    fn name(&self) -> &str {
        "gated"
    }

    async fn send(&self, _msg: &Message) -> Result<(), DeliveryError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum TxFault {
    /// The UPDATE runs, then an error is returned.
    AfterMark,
    /// COMMIT is never issued; the transaction is abandoned instead.
    Commit,
}

/// Real SQLite store whose transactions fail at a chosen step.
struct FaultyStore {
    inner: Arc<SqliteMessageRepository>,
    fault: TxFault,
}

#[async_trait]
impl MessageRepository for FaultyStore {
    async fn fetch_unsent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.inner.fetch_unsent(limit).await
    }

    async fn begin(&self) -> Result<Box<dyn OutboxTx>, StoreError> {
        Ok(Box::new(FaultyTx {
            inner: self.inner.begin().await?,
            fault: self.fault,
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn OutboxTx>,
    fault: TxFault,
}

#[async_trait]
impl OutboxTx for FaultyTx {
    async fn mark_sent(&mut self, ids: &[i64], now: DateTime<Utc>) -> Result<usize, StoreError> {
        let updated = self.inner.mark_sent(ids, now).await?;
        if self.fault == TxFault::AfterMark {
            return Err(StoreError::Validation("mark refused".into()));
        }
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fault == TxFault::Commit {
            drop(self.inner);
            return Err(StoreError::Validation("commit refused".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

async fn seeded_store(dir: &tempfile::TempDir) -> Arc<SqliteMessageRepository> {
    let path = dir.path().join("relay.db");
    let repo = SqliteMessageRepository::open(path.to_str().unwrap()).unwrap();
    for (content, author) in [("hello", "alice"), ("hi there", "bob")] {
        repo.insert(&NewMessage {
            content: content.to_string(),
            author: author.to_string(),
        })
        .await
        .unwrap();
    }
    Arc::new(repo)
}

#[tokio::test]
async fn all_delivered_messages_are_marked_sent() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let sender = ScriptedSender::new(vec![]);
    let processor = BatchProcessor::new(repo.clone(), sender.clone());

    let before = Utc::now();
    let report = processor.run(2).await.unwrap();
    let after = Utc::now();

    assert_eq!(
        report,
        CycleReport {
            fetched: 2,
            sent: 2,
            failed: 0
        }
    );
    assert_eq!(sender.attempts(), vec![1, 2]);

    let sent = repo.fetch_sent().await.unwrap();
    // Same sent_at for the whole batch, so ties fall back to id descending.
    let authors: Vec<&str> = sent.iter().map(|m| m.author.as_str()).collect();
    assert_eq!(authors, vec!["bob", "alice"]);
    for msg in &sent {
        let sent_at = msg.sent_at.unwrap();
        assert!(sent_at + Duration::microseconds(1) >= before);
        assert!(sent_at <= after);
        assert_eq!(msg.updated_at, sent_at);
        assert!(msg.is_consistent());
    }
}

#[tokio::test]
async fn failed_delivery_leaves_row_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let original = repo.get(1).await.unwrap().unwrap();
    let processor = BatchProcessor::new(repo.clone(), ScriptedSender::new(vec![1]));

    let report = processor.run(2).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(repo.get(1).await.unwrap(), Some(original));
    let second = repo.get(2).await.unwrap().unwrap();
    assert!(second.sent);

    // The failed message is first in line for the next cycle.
    let pending = repo.fetch_unsent(10).await.unwrap();
    assert_eq!(pending.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn no_successes_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let snapshot = repo.fetch_all().await.unwrap();
    let processor = BatchProcessor::new(repo.clone(), ScriptedSender::new(vec![1, 2]));

    let report = processor.run(2).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(repo.fetch_all().await.unwrap(), snapshot);
}

#[tokio::test]
async fn second_cycle_has_nothing_to_do() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let sender = ScriptedSender::new(vec![]);
    let processor = BatchProcessor::new(repo.clone(), sender.clone());

    processor.run(2).await.unwrap();
    let snapshot = repo.fetch_all().await.unwrap();

    assert_eq!(processor.run(2).await.unwrap(), CycleReport::default());
    assert_eq!(sender.attempts(), vec![1, 2]);
    assert_eq!(repo.fetch_all().await.unwrap(), snapshot);
}

#[tokio::test]
async fn limit_bounds_each_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let processor = BatchProcessor::new(repo.clone(), ScriptedSender::new(vec![]));

    assert_eq!(processor.run(1).await.unwrap().sent, 1);
    assert_eq!(repo.fetch_unsent(10).await.unwrap().len(), 1);
    assert_eq!(processor.run(1).await.unwrap().sent, 1);
    assert!(repo.fetch_unsent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn mark_failure_rolls_back_the_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let snapshot = repo.fetch_all().await.unwrap();
    let sender = ScriptedSender::new(vec![]);
    let faulty = Arc::new(FaultyStore {
        inner: repo.clone(),
        fault: TxFault::AfterMark,
    });
    let processor = BatchProcessor::new(faulty, sender.clone());

    assert!(matches!(processor.run(2).await, Err(CycleError::MarkSent(_))));
    assert_eq!(sender.attempts(), vec![1, 2]);
    assert_eq!(repo.fetch_all().await.unwrap(), snapshot);

    // Nothing was lost: a healthy cycle delivers both messages again.
    let processor = BatchProcessor::new(repo.clone(), sender.clone());
    assert_eq!(processor.run(2).await.unwrap().sent, 2);
}

#[tokio::test]
async fn commit_failure_leaves_rows_unsent() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let snapshot = repo.fetch_all().await.unwrap();
    let faulty = Arc::new(FaultyStore {
        inner: repo.clone(),
        fault: TxFault::Commit,
    });
    let processor = BatchProcessor::new(faulty, ScriptedSender::new(vec![]));

    assert!(matches!(processor.run(2).await, Err(CycleError::Commit(_))));
    assert_eq!(repo.fetch_all().await.unwrap(), snapshot);
}

#[tokio::test]
async fn store_stays_readable_and_writable_during_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let repo = seeded_store(&dir).await;
    let sender = Arc::new(GatedSender {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let processor = BatchProcessor::new(repo.clone(), sender.clone());

    let cycle = tokio::spawn(async move { processor.run(1).await });
    sender.entered.notified().await;

    // The cycle's transaction is open and its sender is blocked.
    let wait = std::time::Duration::from_secs(1);
    let inserted = tokio::time::timeout(
        wait,
        repo.insert(&NewMessage {
            content: "late".to_string(),
            author: "carol".to_string(),
        }),
    )
    .await
    .expect("insert blocked by the open cycle")
    .unwrap();
    let sent = tokio::time::timeout(wait, repo.fetch_sent())
        .await
        .expect("query blocked by the open cycle")
        .unwrap();
    assert!(sent.is_empty());

    sender.release.notify_one();
    let report = cycle.await.unwrap().unwrap();
    assert_eq!(report.sent, 1);

    assert!(repo.get(1).await.unwrap().unwrap().sent);
    let pending: Vec<i64> = repo
        .fetch_unsent(10)
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(pending, vec![2, inserted.id]);
}
