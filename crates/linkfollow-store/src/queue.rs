use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use linkfollow_core::{FollowRequest, ItemBucket, ItemId, QueueItem, ResolveOutcome};

use crate::now_unix;

/// Total delivery attempts per item before it is parked in `error/`
/// (initial attempt plus two retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Filesystem-backed work queue. Each item is one JSON record; each
/// lifecycle state is a bucket directory, and every transition is a
/// rename, so the record can never be observed half-moved and two
/// overlapping invocations can never claim the same item.
///
/// Layout under the root: `pending/`, `ready/`, `claimed/`, `done/`,
/// `error/`.
pub struct DirQueue {
    root: PathBuf,
}

impl DirQueue {
    /// Open (and create if needed) the queue storage at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let q = Self { root: root.into() };
        q.create_buckets()?;
        Ok(q)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new item for `key` unless one is already outstanding
    /// (in `ready/` or `claimed/`). Two-phase: the full record is
    /// written into `pending/` first and only renamed into `ready/` as
    /// the final step, so a crash mid-write never exposes a
    /// half-written record to dispatch.
    ///
    /// Returns `None` when the enqueue was suppressed by the
    /// idempotence guard.
    pub fn enqueue(&self, key: &str, payload: FollowRequest) -> Result<Option<QueueItem>> {
        self.enqueue_at(key, payload, now_unix())
    }

    fn enqueue_at(&self, key: &str, payload: FollowRequest, now: i64) -> Result<Option<QueueItem>> {
        let id = ItemId::derive(key);
        if self.item_path(ItemBucket::Ready, &id).exists()
            || self.item_path(ItemBucket::Claimed, &id).exists()
        {
            return Ok(None);
        }
        let item = QueueItem {
            id: id.clone(),
            key: key.to_string(),
            payload,
            attempt_errors: 0,
            enqueued_at_unix: now,
        };
        let staged = self.item_path(ItemBucket::Pending, &id);
        write_record(&staged, &item)?;
        let visible = self.item_path(ItemBucket::Ready, &id);
        std::fs::rename(&staged, &visible)
            .with_context(|| format!("commit {} to ready", id.as_str()))?;
        Ok(Some(item))
    }

    /// Take the oldest `ready/` item, claiming it by renaming its
    /// record into `claimed/`. A rename that fails because the file is
    /// gone means a concurrent invocation won the race; the next
    /// candidate is tried. Returns `None` when nothing is ready.
    pub fn dequeue(&self) -> Result<Option<QueueItem>> {
        let mut candidates = self.read_bucket(ItemBucket::Ready)?;
        candidates.sort_by(|a, b| {
            a.enqueued_at_unix
                .cmp(&b.enqueued_at_unix)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        for item in candidates {
            let from = self.item_path(ItemBucket::Ready, &item.id);
            let to = self.item_path(ItemBucket::Claimed, &item.id);
            match std::fs::rename(&from, &to) {
                Ok(()) => return Ok(Some(item)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("claim {}", item.id.as_str()));
                }
            }
        }
        Ok(None)
    }

    /// Delivery succeeded: move the claimed record to `done/`.
    pub fn resolve_success(&self, item: &QueueItem) -> Result<()> {
        self.move_claimed(item, ItemBucket::Done)
    }

    /// Delivery hit a transport failure. Below the attempt budget the
    /// record is re-persisted with the bumped counter (and any payload
    /// update) and returned to `ready/` for a later tick; at the budget
    /// it is parked in `error/` and never retried automatically.
    ///
    /// The updated record is persisted in place (temp + rename) before
    /// the move back to `ready/`, so a crash between the two steps
    /// leaves the item recoverable in `claimed/`, never vanished.
    pub fn resolve_retry(&self, item: &QueueItem, payload: FollowRequest) -> Result<ResolveOutcome> {
        let updated = QueueItem {
            attempt_errors: item.attempt_errors + 1,
            payload,
            ..item.clone()
        };
        let claimed = self.item_path(ItemBucket::Claimed, &item.id);
        write_record(&claimed, &updated)?;
        if updated.attempt_errors >= MAX_ATTEMPTS {
            self.move_claimed(&updated, ItemBucket::Error)?;
            return Ok(ResolveOutcome::Abandoned);
        }
        self.move_claimed(&updated, ItemBucket::Ready)?;
        Ok(ResolveOutcome::Requeued)
    }

    /// Park a claimed item in `error/` without spending its retry
    /// budget. Used when delivery was rejected outright rather than
    /// failing in transit.
    pub fn resolve_abandon(&self, item: &QueueItem) -> Result<()> {
        self.move_claimed(item, ItemBucket::Error)
    }

    pub fn count_ready(&self) -> Result<usize> {
        self.count_bucket(ItemBucket::Ready)
    }

    /// Empty means no work outstanding: nothing ready and nothing
    /// claimed by an in-flight invocation.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count_bucket(ItemBucket::Ready)? == 0
            && self.count_bucket(ItemBucket::Claimed)? == 0)
    }

    pub fn count_bucket(&self, bucket: ItemBucket) -> Result<usize> {
        let mut n = 0;
        for entry in std::fs::read_dir(self.bucket_path(bucket))
            .with_context(|| format!("read {} bucket", bucket.dir_name()))?
        {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "json") {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Delete all terminal records (`done/` and `error/`). Operator
    /// housekeeping; never called from the hot path.
    pub fn purge_terminal(&self) -> Result<usize> {
        let mut removed = 0;
        for bucket in [ItemBucket::Done, ItemBucket::Error] {
            for item in self.read_bucket(bucket)? {
                std::fs::remove_file(self.item_path(bucket, &item.id))
                    .with_context(|| format!("purge {}", item.id.as_str()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Return records orphaned in `claimed/` by a crashed invocation to
    /// `ready/`. Operator-invoked: a claimed record may also belong to
    /// a live overlapping invocation, so this is never automatic.
    pub fn recover_claimed(&self) -> Result<usize> {
        let mut recovered = 0;
        for item in self.read_bucket(ItemBucket::Claimed)? {
            self.move_claimed(&item, ItemBucket::Ready)?;
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Destroy the entire queue storage and recreate it empty.
    pub fn reset(&self) -> Result<()> {
        std::fs::remove_dir_all(&self.root)
            .with_context(|| format!("remove {}", self.root.display()))?;
        self.create_buckets()
    }

    pub fn read_bucket(&self, bucket: ItemBucket) -> Result<Vec<QueueItem>> {
        let mut items = vec![];
        for entry in std::fs::read_dir(self.bucket_path(bucket))
            .with_context(|| format!("read {} bucket", bucket.dir_name()))?
        {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match read_record(&path) {
                Ok(item) => items.push(item),
                // claimed out from under us between readdir and read
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    fn move_claimed(&self, item: &QueueItem, to: ItemBucket) -> Result<()> {
        let from = self.item_path(ItemBucket::Claimed, &item.id);
        let dest = self.item_path(to, &item.id);
        std::fs::rename(&from, &dest)
            .with_context(|| format!("move {} to {}", item.id.as_str(), to.dir_name()))
    }

    fn create_buckets(&self) -> Result<()> {
        for bucket in [
            ItemBucket::Pending,
            ItemBucket::Ready,
            ItemBucket::Claimed,
            ItemBucket::Done,
            ItemBucket::Error,
        ] {
            let dir = self.bucket_path(bucket);
            std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    fn bucket_path(&self, bucket: ItemBucket) -> PathBuf {
        self.root.join(bucket.dir_name())
    }

    fn item_path(&self, bucket: ItemBucket, id: &ItemId) -> PathBuf {
        self.bucket_path(bucket).join(format!("{}.json", id.as_str()))
    }
}

fn write_record(path: &Path, item: &QueueItem) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let s = serde_json::to_string_pretty(item).context("serialize queue item")?;
    std::fs::write(&tmp, s).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

fn read_record(path: &Path) -> Result<QueueItem> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkfollow_core::ActorId;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn request(name: &str) -> FollowRequest {
        FollowRequest {
            actor_id: ActorId::from_str(format!("id-{name}")),
            actor_name: name.to_string(),
            source_url: "http://x/a".to_string(),
        }
    }

    #[test]
    fn open_creates_buckets() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path().join("queue")).unwrap();
        for bucket in ["pending", "ready", "claimed", "done", "error"] {
            assert!(q.root().join(bucket).is_dir());
        }
    }

    #[test]
    fn enqueue_commits_to_ready_and_leaves_pending_empty() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        let item = q.enqueue("alice", request("alice")).unwrap().unwrap();
        assert_eq!(item.attempt_errors, 0);
        assert_eq!(q.count_ready().unwrap(), 1);
        assert_eq!(q.count_bucket(ItemBucket::Pending).unwrap(), 0);
    }

    #[test]
    fn enqueue_same_key_is_idempotent_while_outstanding() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        assert!(q.enqueue("alice", request("alice")).unwrap().is_some());
        assert!(q.enqueue("alice", request("alice")).unwrap().is_none());
        assert_eq!(q.count_ready().unwrap(), 1);

        // still guarded while claimed
        let item = q.dequeue().unwrap().unwrap();
        assert!(q.enqueue("alice", request("alice")).unwrap().is_none());

        // terminal items no longer block a fresh enqueue
        q.resolve_success(&item).unwrap();
        assert!(q.enqueue("alice", request("alice")).unwrap().is_some());
    }

    #[test]
    fn dequeue_empty_returns_none() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn dequeue_is_oldest_first() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        q.enqueue_at("bob", request("bob"), 200).unwrap();
        q.enqueue_at("alice", request("alice"), 100).unwrap();
        assert_eq!(q.dequeue().unwrap().unwrap().key, "alice");
        assert_eq!(q.dequeue().unwrap().unwrap().key, "bob");
    }

    #[test]
    fn at_most_one_claim_under_concurrent_dequeue() {
        let dir = tempdir().unwrap();
        let q = Arc::new(DirQueue::open(dir.path()).unwrap());
        q.enqueue("alice", request("alice")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || q.dequeue().unwrap())
            })
            .collect();
        let claims: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| c.is_some())
            .collect();
        assert_eq!(claims.len(), 1);
        assert_eq!(q.count_ready().unwrap(), 0);
        assert_eq!(q.count_bucket(ItemBucket::Claimed).unwrap(), 1);
    }

    #[test]
    fn resolve_success_moves_to_done() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        q.enqueue("carol", request("carol")).unwrap();
        let item = q.dequeue().unwrap().unwrap();
        q.resolve_success(&item).unwrap();
        assert!(q.is_empty().unwrap());
        assert_eq!(q.count_bucket(ItemBucket::Done).unwrap(), 1);
    }

    #[test]
    fn retry_budget_three_failures_end_in_error() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        q.enqueue("alice", request("alice")).unwrap();

        for expected in [ResolveOutcome::Requeued, ResolveOutcome::Requeued] {
            let item = q.dequeue().unwrap().unwrap();
            let payload = item.payload.clone();
            assert_eq!(q.resolve_retry(&item, payload).unwrap(), expected);
        }
        let item = q.dequeue().unwrap().unwrap();
        assert_eq!(item.attempt_errors, 2);
        let payload = item.payload.clone();
        assert_eq!(q.resolve_retry(&item, payload).unwrap(), ResolveOutcome::Abandoned);

        assert!(q.is_empty().unwrap());
        assert_eq!(q.count_bucket(ItemBucket::Error).unwrap(), 1);
        // parked items are never handed out again
        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn retry_then_success_ends_in_done() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        q.enqueue("alice", request("alice")).unwrap();

        for _ in 0..2 {
            let item = q.dequeue().unwrap().unwrap();
            let payload = item.payload.clone();
            q.resolve_retry(&item, payload).unwrap();
        }
        let item = q.dequeue().unwrap().unwrap();
        assert_eq!(item.attempt_errors, 2);
        q.resolve_success(&item).unwrap();

        assert!(q.is_empty().unwrap());
        assert_eq!(q.count_bucket(ItemBucket::Done).unwrap(), 1);
        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn claimed_record_survives_until_resolved() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();
        q.enqueue("alice", request("alice")).unwrap();
        let _item = q.dequeue().unwrap().unwrap();

        // simulate a crash: the invocation goes away without resolving
        assert_eq!(q.count_bucket(ItemBucket::Claimed).unwrap(), 1);
        assert!(!q.is_empty().unwrap());

        assert_eq!(q.recover_claimed().unwrap(), 1);
        assert_eq!(q.count_ready().unwrap(), 1);
        let again = q.dequeue().unwrap().unwrap();
        assert_eq!(again.key, "alice");
    }

    #[test]
    fn purge_terminal_removes_done_and_error_only() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path()).unwrap();

        q.enqueue("done-item", request("done-item")).unwrap();
        let item = q.dequeue().unwrap().unwrap();
        q.resolve_success(&item).unwrap();

        q.enqueue("kept", request("kept")).unwrap();

        assert_eq!(q.purge_terminal().unwrap(), 1);
        assert_eq!(q.count_bucket(ItemBucket::Done).unwrap(), 0);
        assert_eq!(q.count_ready().unwrap(), 1);
    }

    #[test]
    fn reset_destroys_everything() {
        let dir = tempdir().unwrap();
        let q = DirQueue::open(dir.path().join("queue")).unwrap();
        q.enqueue("alice", request("alice")).unwrap();
        q.reset().unwrap();
        assert!(q.is_empty().unwrap());
        assert_eq!(q.count_bucket(ItemBucket::Done).unwrap(), 0);
        assert!(q.dequeue().unwrap().is_none());
    }
}
