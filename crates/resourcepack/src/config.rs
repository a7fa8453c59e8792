//! Pack configuration document.
//!
//! Packs live under `[resource-packs.<key>]` in a TOML file:
//!
//! ```toml
//! [resource-packs.main]
//! enabled = true
//! auto-update = true
//! name = "Main"
//! description = ["Server textures"]
//! file-name = "main.zip"
//!
//! [resource-packs.main.data]
//! prompt = "Required for custom blocks"
//! required = true
//!
//! [resource-packs.main.github]
//! user = "MinersStudios"
//! repo = "MSResourcePack"
//! ```
//!
//! Values found during resolution (identifier, hash, tag) are written back
//! through [`ConfigStore::commit`], which serializes writers so concurrent
//! loads never interleave on the file.

use crate::error::PackError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use uuid::Uuid;

pub const RESOURCE_PACKS_SECTION: &str = "resource-packs";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_update: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Vec<String>,
    pub file_name: Option<String>,
    pub data: Option<DataSection>,
    pub github: Option<GitHubSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataSection {
    pub uuid: Option<String>,
    pub url: Option<String>,
    pub hash: Option<String>,
    pub prompt: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubSection {
    pub user: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,
    pub token: Option<String>,
}

/// Values to persist for one pack. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackUpdate {
    pub uuid: Option<Uuid>,
    pub hash: Option<String>,
    pub tag: Option<String>,
}

impl PackUpdate {
    pub fn is_empty(&self) -> bool {
        self.uuid.is_none() && self.hash.is_none() && self.tag.is_none()
    }
}

/// The parsed configuration file plus its location.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    document: Mutex<Table>,
    /// Held across a whole commit so file writes land in commit order
    writer: tokio::sync::Mutex<()>,
}

impl ConfigStore {
    /// Read and parse the file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PackError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| PackError::io(format!("Failed to read {}", path.display()), e))?;

        Self::from_str(path, &content)
    }

    pub fn from_str(path: impl Into<PathBuf>, content: &str) -> Result<Self, PackError> {
        let path = path.into();
        let document: Table = toml::from_str(content)
            .map_err(|e| PackError::config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            document: Mutex::new(document),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory pack files are stored relative to
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Keys of all configured packs, in file order
    pub fn pack_keys(&self) -> Vec<String> {
        self.document
            .lock()
            .get(RESOURCE_PACKS_SECTION)
            .and_then(Value::as_table)
            .map(|packs| packs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pack_section(&self, key: &str) -> Result<PackSection, PackError> {
        let value = self
            .document
            .lock()
            .get(RESOURCE_PACKS_SECTION)
            .and_then(Value::as_table)
            .and_then(|packs| packs.get(key))
            .cloned()
            .ok_or_else(|| PackError::config(format!("Resource pack '{key}' is not configured")))?;

        value
            .try_into()
            .map_err(|e| PackError::config(format!("Invalid configuration of resource pack '{key}': {e}")))
    }

    /// Write resolved values for `key` into the document and save it.
    ///
    /// Commits are serialized on an async lock held until the file is
    /// written. The document lock is only held while editing in memory, and
    /// the file is written through `tokio::fs` off the runtime workers.
    pub async fn commit(&self, key: &str, update: &PackUpdate) -> Result<(), PackError> {
        if update.is_empty() {
            return Ok(());
        }

        let _writer = self.writer.lock().await;

        let content = {
            let mut document = self.document.lock();
            let pack = document
                .get_mut(RESOURCE_PACKS_SECTION)
                .and_then(Value::as_table_mut)
                .and_then(|packs| packs.get_mut(key))
                .and_then(Value::as_table_mut)
                .ok_or_else(|| PackError::config(format!("Resource pack '{key}' is not configured")))?;

            if let Some(uuid) = update.uuid {
                set_value(pack, "data", "uuid", Value::String(uuid.to_string()));
            }

            if let Some(hash) = &update.hash {
                set_value(pack, "data", "hash", Value::String(hash.clone()));
            }

            if let Some(tag) = &update.tag {
                set_value(pack, "github", "tag", Value::String(tag.clone()));
            }

            self.serialize(&document)?
        };

        self.write(content).await?;
        tracing::debug!("Saved resolved values of '{}' to {}", key, self.path.display());
        Ok(())
    }

    pub async fn save(&self) -> Result<(), PackError> {
        let _writer = self.writer.lock().await;
        let content = self.serialize(&self.document.lock())?;
        self.write(content).await
    }

    fn serialize(&self, document: &Table) -> Result<String, PackError> {
        toml::to_string_pretty(document)
            .map_err(|e| PackError::config(format!("Failed to serialize {}: {}", self.path.display(), e)))
    }

    async fn write(&self, content: String) -> Result<(), PackError> {
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| PackError::io(format!("Failed to write {}", self.path.display()), e))
    }
}

/// Set `pack.section.field`, creating the section table when missing
fn set_value(pack: &mut Table, section: &str, field: &str, value: Value) {
    match pack.get_mut(section) {
        Some(Value::Table(table)) => {
            table.insert(field.to_owned(), value);
        }
        _ => {
            let mut table = Table::new();
            table.insert(field.to_owned(), value);
            pack.insert(section.to_owned(), Value::Table(table));
        }
    }
}
