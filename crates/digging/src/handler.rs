//! Drives one player's break session against the host.
//!
//! The host reports start/abort/stop packets; [`BreakHandler`] keeps the
//! [`DiggingMap`] in sync, schedules the per-tick task and tells the host
//! which crack stage to show.

use crate::entry::{DiggingEntry, TaskHandle};
use crate::map::DiggingMap;
use crate::progress::{DigKind, DiggingProgress, TickStep, RESET_STAGE};
use std::sync::Arc;
use tracing::debug;
use util::{BlockPos, PlayerId};

/// World side effects needed by a break session
pub trait DiggingHost: Send + Sync + 'static {
    /// Block the player is currently looking at, if any
    fn target_block(&self, player: PlayerId) -> Option<BlockPos>;

    /// Show a crack stage to everyone near the block; `-1` clears it
    fn broadcast_stage(&self, block: BlockPos, stage: i32);

    fn play_hit_sound(&self, block: BlockPos);

    /// Break the block on behalf of the player
    fn destroy_block(&self, block: BlockPos, player: PlayerId);
}

/// Spawns the repeating per-tick task of a session
pub trait TickScheduler: Send + Sync {
    fn run_task_timer(&self, task: Box<dyn FnMut() + Send + 'static>) -> Box<dyn TaskHandle>;
}

/// Break session of one player on one block
pub struct BreakHandler<H: DiggingHost> {
    map: Arc<DiggingMap>,
    host: Arc<H>,
    player: PlayerId,
    block: BlockPos,
}

impl<H: DiggingHost> Clone for BreakHandler<H> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            host: Arc::clone(&self.host),
            player: self.player,
            block: self.block,
        }
    }
}

impl<H: DiggingHost> BreakHandler<H> {
    pub fn new(map: Arc<DiggingMap>, host: Arc<H>, player: PlayerId, block: BlockPos) -> Self {
        Self {
            map,
            host,
            player,
            block,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn block(&self) -> BlockPos {
        self.block
    }

    /// Start breaking, replacing whatever the player was digging before
    pub fn start(&self, kind: DigKind, scheduler: &dyn TickScheduler) -> Arc<DiggingEntry> {
        self.stop();

        let entry = DiggingEntry::new(self.player);
        self.map.put(self.block, Arc::clone(&entry));

        let handler = self.clone();
        let ticking = Arc::clone(&entry);
        let mut progress = DiggingProgress::new();

        let task = scheduler.run_task_timer(Box::new(move || {
            handler.on_tick(&ticking, &mut progress, kind);
        }));
        entry.set_task(task);

        debug!("{} started breaking {} ({:?})", self.player, self.block, kind);
        entry
    }

    fn on_tick(&self, entry: &Arc<DiggingEntry>, progress: &mut DiggingProgress, kind: DigKind) {
        let still_targeted = self.host.target_block(self.player) == Some(self.block);
        let tick = progress.tick(entry, kind, still_targeted);

        if tick.request_abort {
            self.abort(false);
        }

        if tick.play_hit_sound {
            self.host.play_hit_sound(self.block);
        }

        match tick.step {
            TickStep::StageAdvanced { stage } => {
                if entry.is_stage_the_biggest(&self.map, &self.block) {
                    self.host.broadcast_stage(self.block, stage);
                }
            }
            TickStep::Finished => {
                self.finish();
                self.host.destroy_block(self.block, self.player);
            }
            TickStep::Aborting | TickStep::Progressing => {}
        }
    }

    /// Pause the session because the player stopped digging.
    ///
    /// When the abort comes from the client while the player still targets
    /// the block, the session ends instead. Otherwise the crack is reset and
    /// the entry waits in the aborting state until the next click.
    pub fn abort(&self, from_packet: bool) {
        let Some(entry) = self.map.entry(&self.block, self.player) else {
            return;
        };

        if from_packet {
            if self.host.target_block(self.player) == Some(self.block) {
                self.stop_entry(&entry);
                return;
            }

            entry.reset_stage();

            if self.map.entries(&self.block).len() == 1 {
                self.host.broadcast_stage(self.block, RESET_STAGE);
            }
        }

        entry.set_aborting(true);
    }

    /// Handle the player's next click after an abort.
    ///
    /// Clicking another block ends the session; clicking nothing or the
    /// same block resumes it.
    pub fn on_click(&self, clicked: Option<BlockPos>) {
        let Some(entry) = self.map.entry(&self.block, self.player) else {
            return;
        };

        if !entry.is_aborting() {
            return;
        }

        match clicked {
            Some(block) if block != self.block => self.stop_entry(&entry),
            _ => entry.set_aborting(false),
        }
    }

    /// End every session of the player and refresh the affected blocks
    pub fn stop(&self) {
        for (block, _) in self.map.remove_all_player(self.player) {
            self.broadcast_biggest_stage(block);
        }
    }

    /// End one session and refresh its block
    pub fn stop_entry(&self, entry: &DiggingEntry) {
        self.map.remove(&self.block, entry);
        self.broadcast_biggest_stage(self.block);
    }

    /// The block broke: drop every session on it and clear the crack
    pub fn finish(&self) {
        if self.map.contains_block(&self.block) {
            self.map.remove_all(&self.block);
            self.host.broadcast_stage(self.block, RESET_STAGE);
        }
    }

    /// Show the stage of whoever is furthest along, or clear the crack
    pub fn broadcast_biggest_stage(&self, block: BlockPos) {
        let stage = self
            .map
            .biggest_stage_entry(&block)
            .map_or(RESET_STAGE, |entry| entry.stage());

        self.host.broadcast_stage(block, stage);
    }
}
