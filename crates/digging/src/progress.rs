//! Per-tick break progress.
//!
//! The repeating dig task keeps one [`DiggingProgress`] and feeds it the
//! current entry on every tick. The state transitions live here so they can
//! be tested without a scheduler.

use crate::entry::DiggingEntry;

/// Last visible crack stage; passing it breaks the block.
pub const FINAL_BREAK_STAGE: i32 = 9;

/// Stage value that clears the crack animation.
pub const RESET_STAGE: i32 = -1;

/// Ticks between two hit sounds.
const HIT_SOUND_INTERVAL: u32 = 4;

/// What kind of block is being dug
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DigKind {
    /// Custom block with a break speed in progress units per tick
    Breakable { dig_speed: f32 },
    /// Block that only plays hit sounds and never breaks through this path
    SoundOnly,
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// The player stopped targeting the block, or already did earlier
    pub request_abort: bool,
    pub play_hit_sound: bool,
    pub step: TickStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    /// The entry is waiting for the player to resume; nothing advanced
    Aborting,
    /// Progress grew but stayed within the current stage
    Progressing,
    /// The entry moved to a new stage
    StageAdvanced { stage: i32 },
    /// The block is broken
    Finished,
}

/// Mutable state carried between ticks of one dig task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiggingProgress {
    ticks: u32,
    progress: f32,
    already_aborted: bool,
}

impl DiggingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Advance by one tick.
    ///
    /// `still_targeted` tells whether the player is still looking at the
    /// block. The entry's stage is updated in place.
    pub fn tick(&mut self, entry: &DiggingEntry, kind: DigKind, still_targeted: bool) -> Tick {
        let request_abort = self.already_aborted || !still_targeted;

        if entry.is_aborting() {
            self.already_aborted = true;

            return Tick {
                request_abort,
                play_hit_sound: false,
                step: TickStep::Aborting,
            };
        }

        self.ticks = self.ticks.wrapping_add(1);
        let play_hit_sound = self.ticks % HIT_SOUND_INTERVAL == 0;

        let step = match kind {
            DigKind::SoundOnly => TickStep::Progressing,
            DigKind::Breakable { dig_speed } => self.advance(entry, dig_speed),
        };

        Tick {
            request_abort,
            play_hit_sound,
            step,
        }
    }

    fn advance(&mut self, entry: &DiggingEntry, dig_speed: f32) -> TickStep {
        let stage = entry.stage();

        if stage == RESET_STAGE {
            self.progress = 0.0;
        }

        self.progress += dig_speed;
        let progress_in_stage = (self.progress * 10.0).floor() as i32;

        if progress_in_stage <= stage {
            return TickStep::Progressing;
        }

        entry.set_stage(progress_in_stage);

        if stage >= FINAL_BREAK_STAGE {
            TickStep::Finished
        } else {
            TickStep::StageAdvanced {
                stage: progress_in_stage.min(FINAL_BREAK_STAGE),
            }
        }
    }
}
