//! Resolved pack values.

use crate::builder::ResourcePackDataBuilder;
use crate::error::PackError;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use url::Url;
use uuid::Uuid;

/// Wire-ready description of one pack, sent to the client as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackInfo {
    pub id: Uuid,
    pub uri: Url,
    pub hash: String,
    pub prompt: Option<String>,
    pub required: bool,
}

/// Resolved artifact of a pack, or nothing for disabled packs.
///
/// Two values are equal when identifier, URI and hash match; prompt and
/// `required` do not take part. Every `Empty` equals every other `Empty`.
#[derive(Debug, Clone, Default)]
pub enum ResourcePackData {
    #[default]
    Empty,
    Loaded(PackInfo),
}

impl ResourcePackData {
    /// Create loaded data. The hash must be non-blank.
    pub fn new(
        id: Uuid,
        uri: Url,
        hash: impl Into<String>,
        prompt: Option<String>,
        required: bool,
    ) -> Result<Self, PackError> {
        let hash = hash.into();

        if util::is_blank(Some(hash.as_str())) {
            return Err(PackError::config("Hash cannot be null or blank"));
        }

        Ok(Self::Loaded(PackInfo {
            id,
            uri,
            hash,
            prompt: util::non_blank(prompt.as_deref()).map(str::to_owned),
            required,
        }))
    }

    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn builder() -> ResourcePackDataBuilder {
        ResourcePackDataBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn info(&self) -> Option<&PackInfo> {
        match self {
            Self::Empty => None,
            Self::Loaded(info) => Some(info),
        }
    }

    /// Identifier of the pack. Empty data yields a fresh random id on every
    /// call so it never collides with a real pack.
    pub fn unique_id(&self) -> Uuid {
        match self {
            Self::Empty => Uuid::new_v4(),
            Self::Loaded(info) => info.id,
        }
    }

    pub fn uri(&self) -> Option<&Url> {
        self.info().map(|info| &info.uri)
    }

    pub fn hash(&self) -> Option<&str> {
        self.info().map(|info| info.hash.as_str())
    }

    pub fn prompt(&self) -> Option<&str> {
        self.info().and_then(|info| info.prompt.as_deref())
    }

    pub fn is_required(&self) -> bool {
        self.info().is_some_and(|info| info.required)
    }

    /// Convert into the descriptor sent to clients
    pub fn to_info(&self) -> Result<PackInfo, PackError> {
        self.info().cloned().ok_or(PackError::EmptyPack)
    }

    /// Builder seeded with this value; the resource manager is not carried over.
    pub fn to_builder(&self) -> ResourcePackDataBuilder {
        match self {
            Self::Empty => ResourcePackDataBuilder::default(),
            Self::Loaded(info) => ResourcePackDataBuilder::default()
                .uuid(Some(info.id))
                .uri(Some(info.uri.clone()))
                .hash(Some(info.hash.clone()))
                .prompt(info.prompt.clone())
                .required(info.required),
        }
    }
}

impl PartialEq for ResourcePackData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Loaded(a), Self::Loaded(b)) => a.id == b.id && a.uri == b.uri && a.hash == b.hash,
            _ => false,
        }
    }
}

impl Eq for ResourcePackData {}

impl Hash for ResourcePackData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Empty => state.write_u8(0),
            Self::Loaded(info) => {
                state.write_u8(1);
                info.id.hash(state);
                info.uri.hash(state);
                info.hash.hash(state);
            }
        }
    }
}

/// A named pack as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePack {
    data: ResourcePackData,
    name: String,
    description: Vec<String>,
}

impl ResourcePack {
    pub fn new(data: ResourcePackData, name: impl Into<String>, description: Vec<String>) -> Self {
        Self {
            data,
            name: name.into(),
            description,
        }
    }

    /// A disabled pack carrying only its name and description
    pub fn create(name: impl Into<String>, description: Vec<String>) -> Self {
        Self::new(ResourcePackData::Empty, name, description)
    }

    pub fn data(&self) -> &ResourcePackData {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &[String] {
        &self.description
    }

    pub fn is_disabled(&self) -> bool {
        self.data.is_empty()
    }
}

/// A pack together with the configuration key it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub key: String,
    pub pack: ResourcePack,
}

impl PackEntry {
    pub fn new(key: impl Into<String>, pack: ResourcePack) -> Self {
        Self {
            key: key.into(),
            pack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const HASH: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    fn loaded(prompt: Option<&str>, required: bool) -> ResourcePackData {
        ResourcePackData::new(
            Uuid::from_u128(7),
            Url::parse("https://example.com/pack.zip").unwrap(),
            HASH,
            prompt.map(str::to_owned),
            required,
        )
        .unwrap()
    }

    #[test]
    fn test_equality_ignores_prompt_and_required() {
        let a = loaded(Some("Please accept"), true);
        let b = loaded(None, false);

        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_different_hash_differs() {
        let other = ResourcePackData::new(
            Uuid::from_u128(7),
            Url::parse("https://example.com/pack.zip").unwrap(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            None,
            false,
        )
        .unwrap();

        assert_ne!(loaded(None, false), other);
    }

    #[test]
    fn test_blank_hash_rejected() {
        let result = ResourcePackData::new(
            Uuid::new_v4(),
            Url::parse("https://example.com/pack.zip").unwrap(),
            "  ",
            None,
            false,
        );
        assert!(matches!(result, Err(PackError::Config(_))));
    }

    #[test]
    fn test_empty_data() {
        let empty = ResourcePackData::empty();

        assert!(empty.is_empty());
        assert_eq!(empty, ResourcePackData::Empty);
        assert_ne!(empty.unique_id(), empty.unique_id());
        assert_eq!(empty.to_info(), Err(PackError::EmptyPack));
        assert_eq!(empty.uri(), None);
        assert!(!empty.is_required());
    }

    #[test]
    fn test_blank_prompt_dropped() {
        let data = loaded(Some("   "), true);
        assert_eq!(data.prompt(), None);
        assert!(data.is_required());
    }

    #[test]
    fn test_disabled_pack() {
        let pack = ResourcePack::create("Vanilla", vec!["No custom textures".into()]);

        assert!(pack.is_disabled());
        assert_eq!(pack.name(), "Vanilla");
        assert_eq!(pack.description(), ["No custom textures".to_string()]);
        assert!(!ResourcePack::new(loaded(None, false), "Custom", vec![]).is_disabled());
    }
}
