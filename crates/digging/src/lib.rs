//! Block digging session tracking.
//!
//! Players breaking custom blocks are tracked per block position. Each
//! [`DiggingEntry`] owns the handle of the repeating task that advances the
//! break animation, and the [`DiggingMap`] guarantees that removing an entry
//! always cancels that task.

pub mod entry;
pub mod handler;
pub mod map;
pub mod progress;

pub use entry::{DiggingEntry, TaskHandle};
pub use handler::{BreakHandler, DiggingHost, TickScheduler};
pub use map::DiggingMap;
pub use progress::{DigKind, DiggingProgress, Tick, TickStep, FINAL_BREAK_STAGE, RESET_STAGE};
