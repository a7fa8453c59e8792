//! Resource pack reconciliation and delivery.
//!
//! Packs are declared in a configuration section and resolved into a
//! concrete artifact (URL + SHA-1) either from a fixed URL or from the
//! latest tagged release of a GitHub repository. Once resolved, the
//! [`ResourcePackApplier`] pushes them to players and tracks the status each
//! client reports back.
//!
//! Pipeline per pack: [`ResourceManager`] → [`ResourcePackDataBuilder`] →
//! [`ResourcePackData`] → commit to [`ConfigStore`].

pub mod applier;
pub mod builder;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod loader;
pub mod manager;

pub use applier::{PackDelivery, PackStatus, ResourcePackApplier, StatusHandle};
pub use builder::{BuiltPack, PackState, Resolution, ResourcePackDataBuilder};
pub use client::{ByteReader, HttpResourceClient, ResourceClient, Tag, TagCommit};
pub use config::{ConfigStore, DataSection, GitHubSection, PackSection, PackUpdate, RESOURCE_PACKS_SECTION};
pub use data::{PackEntry, PackInfo, ResourcePack, ResourcePackData};
pub use error::{ApplyError, ErrorKind, PackError};
pub use loader::{OnFailed, OnLoaded, ResourcePackLoader};
pub use manager::{GitHubResourceManager, ResourceManager, UrlResourceManager};
