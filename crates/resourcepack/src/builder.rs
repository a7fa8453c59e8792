//! Turning a partial pack description into [`ResourcePackData`].

use crate::client::Tag;
use crate::data::ResourcePackData;
use crate::error::PackError;
use crate::manager::{parse_url, ResourceManager};
use url::Url;
use uuid::Uuid;

/// Resolution progress of one configured pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackState {
    /// Configuration read, nothing resolved yet
    Unresolved,
    /// Waiting on tag listing, download or hashing
    ResolvingRemote,
    Resolved,
    Failed(PackError),
}

impl PackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed(_))
    }
}

/// What resolution produced, beyond the data itself.
///
/// The loader compares these against the stored configuration to decide
/// what has to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub uuid: Uuid,
    /// The identifier was derived from the URI rather than supplied
    pub uuid_derived: bool,
    pub hash: String,
    /// Tag the artifact came from, for GitHub packs
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPack {
    pub data: ResourcePackData,
    pub resolution: Resolution,
}

/// Collects the known parts of a pack and resolves the rest.
///
/// Resolution rules:
/// - with auto-update, the hash always comes from the resource manager and a
///   missing URI is asked from it too
/// - without auto-update, the hash must be supplied; a missing URI is asked
///   from the resource manager, and a GitHub manager with a stored tag builds
///   the release URI without any request
/// - a missing identifier is derived from the final URI
#[derive(Debug, Default)]
pub struct ResourcePackDataBuilder {
    uri: Option<Url>,
    hash: Option<String>,
    uuid: Option<Uuid>,
    prompt: Option<String>,
    required: bool,
    auto_update: bool,
    resource_manager: Option<ResourceManager>,
}

impl ResourcePackDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uri(mut self, uri: Option<Url>) -> Self {
        self.uri = uri;
        self
    }

    /// Set the URI from text. Blank text clears it.
    pub fn url(mut self, url: Option<&str>) -> Result<Self, PackError> {
        self.uri = util::non_blank(url).map(parse_url).transpose()?;
        Ok(self)
    }

    /// Blank hashes count as missing
    pub fn hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash.filter(|hash| !util::is_blank(Some(hash.as_str())));
        self
    }

    pub fn uuid(mut self, uuid: Option<Uuid>) -> Self {
        self.uuid = uuid;
        self
    }

    /// Set the identifier from text. Blank text clears it.
    pub fn uuid_str(mut self, uuid: Option<&str>) -> Result<Self, PackError> {
        self.uuid = util::non_blank(uuid)
            .map(|value| Uuid::parse_str(value.trim()).map_err(|_| PackError::InvalidUuid(value.to_owned())))
            .transpose()?;
        Ok(self)
    }

    pub fn prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    pub fn resource_manager(mut self, manager: Option<ResourceManager>) -> Self {
        self.resource_manager = manager;
        self
    }

    pub fn get_uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    pub fn get_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn get_uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn get_prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn get_resource_manager(&self) -> Option<&ResourceManager> {
        self.resource_manager.as_ref()
    }

    /// Whether [`build`](Self::build) may need the network or the disk
    pub fn requires_remote(&self) -> bool {
        self.auto_update || self.uri.is_none()
    }

    pub async fn build(self) -> Result<BuiltPack, PackError> {
        let (uri, hash, tag) = if self.auto_update {
            self.resolve_updated().await?
        } else {
            self.resolve_current().await?
        };

        let (uuid, uuid_derived) = match self.uuid {
            Some(uuid) => (uuid, false),
            None => (util::name_uuid_from_bytes(uri.as_str().as_bytes()), true),
        };

        let data = ResourcePackData::new(uuid, uri, hash.clone(), self.prompt, self.required)?;

        Ok(BuiltPack {
            data,
            resolution: Resolution {
                uuid,
                uuid_derived,
                hash,
                tag,
            },
        })
    }

    async fn resolve_updated(&self) -> Result<(Url, String, Option<String>), PackError> {
        let manager = self
            .resource_manager
            .as_ref()
            .ok_or_else(|| PackError::config("Provide a resource manager for auto-updating"))?;

        let hash = manager.generate_hash().await?;
        let uri = match &self.uri {
            Some(uri) => uri.clone(),
            None => manager.uri().await?,
        };
        let tag = manager.latest_tag_now().map(|tag: Tag| tag.name);

        Ok((uri, hash, tag))
    }

    async fn resolve_current(&self) -> Result<(Url, String, Option<String>), PackError> {
        let hash = self
            .hash
            .clone()
            .ok_or_else(|| PackError::config("Hash cannot be null or blank, provide a hash or use auto-update"))?;

        let stored_tag = self
            .resource_manager
            .as_ref()
            .and_then(ResourceManager::as_github)
            .and_then(|github| github.current_tag())
            .map(str::to_owned);

        if let Some(uri) = &self.uri {
            return Ok((uri.clone(), hash, stored_tag));
        }

        let manager = self
            .resource_manager
            .as_ref()
            .ok_or_else(|| PackError::config("Provide a URL or a resource manager"))?;

        match (manager, stored_tag) {
            (ResourceManager::GitHub(github), Some(tag)) => {
                let uri = github.release_uri(&tag)?;
                Ok((uri, hash, Some(tag)))
            }
            _ => {
                let uri = manager.uri().await?;
                let tag = manager.latest_tag_now().map(|tag| tag.name);
                Ok((uri, hash, tag))
            }
        }
    }
}
