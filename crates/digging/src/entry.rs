//! A single player's attempt to break a single block.

use crate::map::DiggingMap;
use crate::progress::RESET_STAGE;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use util::{BlockPos, PlayerId};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Handle of a scheduled repeating task that can be cancelled.
///
/// Implementations must treat `cancel` as infallible: calling it after the
/// scheduler has shut down, or more than once, is a no-op.
pub trait TaskHandle: Send + Sync {
    fn cancel(&self);
}

impl TaskHandle for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// In-progress break of one block by one player.
///
/// Entries compare by identity: two entries for the same player are
/// different entries.
pub struct DiggingEntry {
    player: PlayerId,
    sequence: u64,
    stage: AtomicI32,
    aborting: AtomicBool,
    task: Mutex<Option<Box<dyn TaskHandle>>>,
}

impl DiggingEntry {
    /// Create an entry at stage 0 with no task attached
    pub fn new(player: PlayerId) -> Arc<Self> {
        Self::with_state(player, 0, false)
    }

    pub fn with_state(player: PlayerId, stage: i32, aborting: bool) -> Arc<Self> {
        Arc::new(Self {
            player,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            stage: AtomicI32::new(stage),
            aborting: AtomicBool::new(aborting),
            task: Mutex::new(None),
        })
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Creation order of this entry, used to break stage ties
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stage(&self) -> i32 {
        self.stage.load(Ordering::Acquire)
    }

    pub fn set_stage(&self, stage: i32) {
        self.stage.store(stage, Ordering::Release);
    }

    /// Reset the stage so the next tick starts from scratch
    pub fn reset_stage(&self) {
        self.set_stage(RESET_STAGE);
    }

    /// Whether the player looked away and the break is waiting to be resumed
    pub fn is_aborting(&self) -> bool {
        self.aborting.load(Ordering::Acquire)
    }

    pub fn set_aborting(&self, aborting: bool) {
        self.aborting.store(aborting, Ordering::Release);
    }

    pub fn has_task(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Attach the repeating task. A previously attached task is cancelled.
    pub fn set_task(&self, task: Box<dyn TaskHandle>) {
        let previous = self.task.lock().replace(task);

        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel the attached task, if any.
    ///
    /// Returns whether a task was actually cancelled. The handle is cleared
    /// before cancelling, so repeated calls never reach the scheduler twice.
    pub fn cancel_task(&self) -> bool {
        let task = self.task.lock().take();

        match task {
            Some(task) => {
                task.cancel();
                tracing::trace!("Cancelled digging task of {}", self.player);
                true
            }
            None => false,
        }
    }

    /// Whether this entry holds the authoritative stage for `block`
    pub fn is_stage_the_biggest(&self, map: &DiggingMap, block: &BlockPos) -> bool {
        match map.biggest_stage_entry(block) {
            Some(biggest) => *self == *biggest || self.stage() > biggest.stage(),
            None => false,
        }
    }
}

impl PartialEq for DiggingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for DiggingEntry {}

impl fmt::Debug for DiggingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiggingEntry")
            .field("player", &self.player)
            .field("sequence", &self.sequence)
            .field("stage", &self.stage())
            .field("aborting", &self.is_aborting())
            .field("has_task", &self.has_task())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    /// Task handle that counts how many times it was cancelled
    #[derive(Clone, Default)]
    pub(crate) struct CountingTask(pub Arc<AtomicUsize>);

    impl CountingTask {
        pub(crate) fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl TaskHandle for CountingTask {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn player() -> PlayerId {
        PlayerId::new(Uuid::new_v4())
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let task = CountingTask::default();
        let entry = DiggingEntry::new(player());
        entry.set_task(Box::new(task.clone()));

        assert!(entry.has_task());
        assert!(entry.cancel_task());
        assert!(!entry.cancel_task());
        assert!(!entry.has_task());
        assert_eq!(task.count(), 1);
    }

    #[test]
    fn test_replacing_task_cancels_previous() {
        let first = CountingTask::default();
        let second = CountingTask::default();
        let entry = DiggingEntry::new(player());

        entry.set_task(Box::new(first.clone()));
        entry.set_task(Box::new(second.clone()));

        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 0);
    }

    #[test]
    fn test_identity_equality() {
        let id = player();
        let a = DiggingEntry::new(id);
        let b = DiggingEntry::new(id);

        assert_eq!(*a, *a);
        assert_ne!(*a, *b);
        assert!(a.sequence() < b.sequence());
    }

    #[test]
    fn test_stage_and_aborting() {
        let entry = DiggingEntry::with_state(player(), 4, true);
        assert_eq!(entry.stage(), 4);
        assert!(entry.is_aborting());

        entry.reset_stage();
        entry.set_aborting(false);
        assert_eq!(entry.stage(), RESET_STAGE);
        assert!(!entry.is_aborting());
    }

    #[tokio::test]
    async fn test_abort_handle_cancel() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let entry = DiggingEntry::new(player());
        entry.set_task(Box::new(handle.abort_handle()));

        assert!(entry.cancel_task());
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
