//! Runtime wiring for the MinersStudios plugin cores.
//!
//! The feature crates ([`digging`], [`resourcepack`]) are host independent.
//! This crate supplies what a host needs around them: configuration,
//! logging, a tick scheduler and the [`AppContext`] that owns the shared
//! registries.

pub mod config;
pub mod context;
pub mod logging;
pub mod scheduler;

pub use config::{ConfigError, ConfigFormat, DiggingSettings, LoggingConfig, ResourcePackSettings, ServerConfig};
pub use context::{AppContext, LoadStatus, LoadSummary};
pub use logging::init_logging;
pub use scheduler::{Scheduler, SchedulerError};

pub use digging;
pub use resourcepack;
pub use util;
