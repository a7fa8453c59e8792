//! Concurrent index of digging entries by block.

use crate::entry::DiggingEntry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use util::{BlockPos, PlayerId};

/// Owns every active [`DiggingEntry`], grouped by the block being broken.
///
/// Several players may dig the same block at once, so each block maps to a
/// list kept in insertion order. Removing an entry always cancels its task.
/// All operations take `&self` and are safe to call from the tick task and
/// from event handlers at the same time.
#[derive(Default)]
pub struct DiggingMap {
    blocks: DashMap<BlockPos, Vec<Arc<DiggingEntry>>>,
}

impl DiggingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the block's list.
    ///
    /// No uniqueness check is made: callers ensure a player has at most one
    /// entry per block.
    pub fn put(&self, block: BlockPos, entry: Arc<DiggingEntry>) {
        debug!("{} started digging {}", entry.player(), block);
        self.blocks.entry(block).or_default().push(entry);
    }

    /// Remove an entry from a block and cancel its task.
    ///
    /// Returns whether the entry was present. Unknown blocks are a no-op.
    pub fn remove(&self, block: &BlockPos, entry: &DiggingEntry) -> bool {
        let (removed, emptied) = match self.blocks.get_mut(block) {
            Some(mut entries) => {
                let before = entries.len();
                entries.retain(|e| **e != *entry);
                (entries.len() != before, entries.is_empty())
            }
            None => return false,
        };

        entry.cancel_task();

        if emptied {
            self.blocks.remove_if(block, |_, entries| entries.is_empty());
        }

        removed
    }

    /// Remove the player's entry on a block, if there is one
    pub fn remove_player(&self, block: &BlockPos, player: PlayerId) -> Option<Arc<DiggingEntry>> {
        let entry = self.entry(block, player)?;
        self.remove(block, &entry);
        Some(entry)
    }

    /// Remove every entry of a block, e.g. when it was destroyed
    pub fn remove_all(&self, block: &BlockPos) -> Vec<Arc<DiggingEntry>> {
        let entries = self
            .blocks
            .remove(block)
            .map(|(_, entries)| entries)
            .unwrap_or_default();

        for entry in &entries {
            entry.cancel_task();
        }

        entries
    }

    /// Remove an entry from every block that contains it
    pub fn remove_entry_everywhere(&self, entry: &DiggingEntry) -> usize {
        let blocks: Vec<BlockPos> = self
            .blocks
            .iter()
            .filter(|list| list.value().iter().any(|e| **e == *entry))
            .map(|list| *list.key())
            .collect();

        blocks
            .iter()
            .filter(|block| self.remove(block, entry))
            .count()
    }

    /// Remove all of a player's entries across every block.
    ///
    /// Used on disconnect, teleport, death and game mode changes. Returns the
    /// removed pairs so the caller can refresh the affected blocks.
    pub fn remove_all_player(&self, player: PlayerId) -> Vec<(BlockPos, Arc<DiggingEntry>)> {
        let to_remove: Vec<(BlockPos, Arc<DiggingEntry>)> = self
            .blocks
            .iter()
            .flat_map(|list| {
                let block = *list.key();
                list.value()
                    .iter()
                    .filter(|e| e.player() == player)
                    .map(|e| (block, Arc::clone(e)))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (block, entry) in &to_remove {
            self.remove(block, entry);
        }

        if !to_remove.is_empty() {
            debug!("Removed {} digging entries of {}", to_remove.len(), player);
        }

        to_remove
    }

    /// Entry with the largest stage on a block.
    ///
    /// Equal stages resolve to the entry created first.
    pub fn biggest_stage_entry(&self, block: &BlockPos) -> Option<Arc<DiggingEntry>> {
        let entries = self.blocks.get(block)?;
        let mut biggest: Option<&Arc<DiggingEntry>> = None;

        for entry in entries.iter() {
            biggest = match biggest {
                Some(current)
                    if current.stage() > entry.stage()
                        || (current.stage() == entry.stage() && current.sequence() < entry.sequence()) =>
                {
                    Some(current)
                }
                _ => Some(entry),
            };
        }

        biggest.cloned()
    }

    /// Snapshot of the entries on a block, in insertion order
    pub fn entries(&self, block: &BlockPos) -> Vec<Arc<DiggingEntry>> {
        self.blocks
            .get(block)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, block: &BlockPos, player: PlayerId) -> Option<Arc<DiggingEntry>> {
        self.blocks
            .get(block)?
            .iter()
            .find(|e| e.player() == player)
            .cloned()
    }

    /// Block an entry is registered on
    pub fn block_of_entry(&self, entry: &DiggingEntry) -> Option<BlockPos> {
        self.blocks
            .iter()
            .find(|list| list.value().iter().any(|e| **e == *entry))
            .map(|list| *list.key())
    }

    /// First block the player is digging
    pub fn block_of_player(&self, player: PlayerId) -> Option<BlockPos> {
        self.blocks
            .iter()
            .find(|list| list.value().iter().any(|e| e.player() == player))
            .map(|list| *list.key())
    }

    pub fn blocks(&self) -> Vec<BlockPos> {
        self.blocks.iter().map(|list| *list.key()).collect()
    }

    /// Every (block, entry) pair currently tracked
    pub fn all_entries(&self) -> Vec<(BlockPos, Arc<DiggingEntry>)> {
        self.blocks
            .iter()
            .flat_map(|list| {
                let block = *list.key();
                list.value()
                    .iter()
                    .map(|e| (block, Arc::clone(e)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn contains_block(&self, block: &BlockPos) -> bool {
        self.blocks.contains_key(block)
    }

    pub fn contains_entry(&self, entry: &DiggingEntry) -> bool {
        self.blocks
            .iter()
            .any(|list| list.value().iter().any(|e| **e == *entry))
    }

    pub fn contains_player(&self, player: PlayerId) -> bool {
        self.blocks
            .iter()
            .any(|list| list.value().iter().any(|e| e.player() == player))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks being dug
    pub fn blocks_len(&self) -> usize {
        self.blocks.len()
    }

    /// Number of entries across all blocks
    pub fn entries_len(&self) -> usize {
        self.blocks.iter().map(|list| list.value().len()).sum()
    }

    /// Drop everything, cancelling every task. Used on shutdown.
    pub fn clear(&self) {
        let blocks = self.blocks();

        for block in &blocks {
            self.remove_all(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::{player, CountingTask};
    use uuid::Uuid;

    fn block(x: i32) -> BlockPos {
        BlockPos::new(Uuid::nil(), x, 64, 0)
    }

    fn entry_with_task(player: PlayerId) -> (Arc<DiggingEntry>, CountingTask) {
        let task = CountingTask::default();
        let entry = DiggingEntry::new(player);
        entry.set_task(Box::new(task.clone()));
        (entry, task)
    }

    #[test]
    fn test_put_then_remove_player() {
        let map = DiggingMap::new();
        let p = player();
        let (entry, task) = entry_with_task(p);

        map.put(block(0), Arc::clone(&entry));
        assert!(map.contains_player(p));
        assert!(map.contains_entry(&entry));

        let removed = map.remove_player(&block(0), p).unwrap();
        assert_eq!(*removed, *entry);
        assert!(!map.contains_player(p));
        assert!(!map.contains_block(&block(0)));
        assert_eq!(task.count(), 1);

        // A second removal must not cancel again
        assert!(map.remove_player(&block(0), p).is_none());
        assert!(!map.remove(&block(0), &entry));
        assert_eq!(task.count(), 1);
    }

    #[test]
    fn test_remove_unknown_block_is_noop() {
        let map = DiggingMap::new();
        let (entry, task) = entry_with_task(player());

        assert!(!map.remove(&block(9), &entry));
        assert_eq!(task.count(), 0);
    }

    #[test]
    fn test_remove_keeps_other_entries() {
        let map = DiggingMap::new();
        let (a, _) = entry_with_task(player());
        let (b, _) = entry_with_task(player());

        map.put(block(0), Arc::clone(&a));
        map.put(block(0), Arc::clone(&b));

        assert!(map.remove(&block(0), &a));
        assert!(map.contains_block(&block(0)));
        assert_eq!(map.entries(&block(0)), vec![b]);
    }

    #[test]
    fn test_remove_all_player_returns_removed_pairs() {
        let map = DiggingMap::new();
        let p = player();
        let other = player();
        let (a, task_a) = entry_with_task(p);
        let (b, task_b) = entry_with_task(p);
        let (c, task_c) = entry_with_task(other);

        map.put(block(0), Arc::clone(&a));
        map.put(block(1), Arc::clone(&b));
        map.put(block(1), Arc::clone(&c));

        let mut removed = map.remove_all_player(p);
        removed.sort_by_key(|(pos, _)| pos.x);

        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].0, block(0));
        assert_eq!(*removed[0].1, *a);
        assert_eq!(removed[1].0, block(1));
        assert_eq!(*removed[1].1, *b);

        assert!(!map.contains_player(p));
        assert!(map.contains_player(other));
        assert_eq!(map.blocks_len(), 1);
        assert_eq!(map.entries_len(), 1);
        assert_eq!((task_a.count(), task_b.count(), task_c.count()), (1, 1, 0));
    }

    #[test]
    fn test_remove_all_block() {
        let map = DiggingMap::new();
        let (a, task_a) = entry_with_task(player());
        let (b, task_b) = entry_with_task(player());

        map.put(block(0), a);
        map.put(block(0), b);

        assert_eq!(map.remove_all(&block(0)).len(), 2);
        assert!(map.is_empty());
        assert_eq!((task_a.count(), task_b.count()), (1, 1));
    }

    #[test]
    fn test_biggest_stage_entry() {
        let map = DiggingMap::new();
        assert!(map.biggest_stage_entry(&block(0)).is_none());

        let entries: Vec<_> = [2, 5, 1]
            .into_iter()
            .map(|stage| DiggingEntry::with_state(player(), stage, false))
            .collect();
        for entry in &entries {
            map.put(block(0), Arc::clone(entry));
        }

        let biggest = map.biggest_stage_entry(&block(0)).unwrap();
        assert_eq!(biggest.stage(), 5);
        assert_eq!(*biggest, *entries[1]);
    }

    #[test]
    fn test_biggest_stage_tie_prefers_earliest() {
        let map = DiggingMap::new();
        let first = DiggingEntry::with_state(player(), 4, false);
        let second = DiggingEntry::with_state(player(), 4, false);

        // Inserted in reverse creation order
        map.put(block(0), Arc::clone(&second));
        map.put(block(0), Arc::clone(&first));

        assert_eq!(*map.biggest_stage_entry(&block(0)).unwrap(), *first);
    }

    #[test]
    fn test_contested_block_scenario() {
        let map = DiggingMap::new();
        let (p1, p2) = (player(), player());
        let e1 = DiggingEntry::new(p1);
        let e2 = DiggingEntry::new(p2);

        map.put(block(0), Arc::clone(&e1));
        map.put(block(0), Arc::clone(&e2));
        e1.set_stage(3);
        e2.set_stage(7);

        assert_eq!(map.biggest_stage_entry(&block(0)).unwrap().player(), p2);
        assert!(e2.is_stage_the_biggest(&map, &block(0)));
        assert!(!e1.is_stage_the_biggest(&map, &block(0)));

        map.remove_player(&block(0), p2);

        let biggest = map.biggest_stage_entry(&block(0)).unwrap();
        assert_eq!(biggest.player(), p1);
        assert_eq!(biggest.stage(), 3);
    }

    #[test]
    fn test_lookups() {
        let map = DiggingMap::new();
        let p = player();
        let entry = DiggingEntry::new(p);

        map.put(block(3), Arc::clone(&entry));

        assert_eq!(map.block_of_entry(&entry), Some(block(3)));
        assert_eq!(map.block_of_player(p), Some(block(3)));
        assert_eq!(map.entry(&block(3), p).as_deref(), Some(&*entry));
        assert!(map.entry(&block(4), p).is_none());
        assert_eq!(map.blocks(), vec![block(3)]);
        assert_eq!(map.all_entries().len(), 1);
    }

    #[test]
    fn test_remove_entry_everywhere() {
        let map = DiggingMap::new();
        let entry = DiggingEntry::new(player());

        map.put(block(0), Arc::clone(&entry));
        map.put(block(1), Arc::clone(&entry));

        assert_eq!(map.remove_entry_everywhere(&entry), 2);
        assert!(map.is_empty());
    }

    #[test]
    fn test_clear_cancels_everything() {
        let map = DiggingMap::new();
        let (a, task_a) = entry_with_task(player());
        let (b, task_b) = entry_with_task(player());

        map.put(block(0), a);
        map.put(block(1), b);
        map.clear();

        assert!(map.is_empty());
        assert_eq!((task_a.count(), task_b.count()), (1, 1));
    }

    #[test]
    fn test_concurrent_mutation() {
        let map = Arc::new(DiggingMap::new());
        let players: Vec<PlayerId> = (0..8).map(|_| player()).collect();

        std::thread::scope(|scope| {
            for &p in &players {
                let map = Arc::clone(&map);
                scope.spawn(move || {
                    for x in 0..50 {
                        map.put(block(x), DiggingEntry::new(p));
                    }
                    for x in 0..25 {
                        map.remove_player(&block(x), p);
                    }
                });
            }
        });

        assert_eq!(map.entries_len(), players.len() * 25);
        for p in players {
            assert_eq!(map.remove_all_player(p).len(), 25);
        }
        assert!(map.is_empty());
    }
}
