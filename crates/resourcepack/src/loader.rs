//! Loading configured packs end to end.

use crate::builder::{BuiltPack, PackState, ResourcePackDataBuilder};
use crate::client::ResourceClient;
use crate::config::{ConfigStore, PackSection, PackUpdate};
use crate::data::{PackEntry, ResourcePack};
use crate::error::PackError;
use crate::manager::{GitHubResourceManager, ResourceManager};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Instant;

/// Called with every successfully loaded entry; may substitute it.
/// Returning `None` keeps the resolved pack.
pub type OnLoaded = Arc<dyn Fn(PackEntry) -> Option<PackEntry> + Send + Sync>;

/// Called with a disabled stand-in and the error; may substitute a
/// replacement entry. Returning `None` keeps the failure.
pub type OnFailed = Arc<dyn Fn(PackEntry, &PackError) -> Option<PackEntry> + Send + Sync>;

/// Reads pack sections from a [`ConfigStore`], resolves them and writes the
/// resolved values back.
pub struct ResourcePackLoader {
    store: Arc<ConfigStore>,
    client: Arc<dyn ResourceClient>,
    on_loaded: Option<OnLoaded>,
    on_failed: Option<OnFailed>,
    states: DashMap<String, PackState>,
}

impl ResourcePackLoader {
    pub fn new(store: Arc<ConfigStore>, client: Arc<dyn ResourceClient>) -> Self {
        Self {
            store,
            client,
            on_loaded: None,
            on_failed: None,
            states: DashMap::new(),
        }
    }

    pub fn with_on_loaded<F>(mut self, hook: F) -> Self
    where
        F: Fn(PackEntry) -> Option<PackEntry> + Send + Sync + 'static,
    {
        self.on_loaded = Some(Arc::new(hook));
        self
    }

    pub fn with_on_failed<F>(mut self, hook: F) -> Self
    where
        F: Fn(PackEntry, &PackError) -> Option<PackEntry> + Send + Sync + 'static,
    {
        self.on_failed = Some(Arc::new(hook));
        self
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Last known state of the pack under `key`
    pub fn state(&self, key: &str) -> Option<PackState> {
        self.states.get(key).map(|state| state.clone())
    }

    fn set_state(&self, key: &str, state: PackState) {
        tracing::trace!("Resource pack '{}' is now {:?}", key, state);
        self.states.insert(key.to_owned(), state);
    }

    /// Load every configured pack concurrently.
    ///
    /// A failure of one pack never affects the others. Results keep the
    /// order of the configuration file.
    pub async fn load_all(&self) -> IndexMap<String, Result<ResourcePack, PackError>> {
        let keys = self.store.pack_keys();
        let start = Instant::now();

        let results = futures::future::join_all(keys.iter().map(|key| self.load(key))).await;
        let loaded: IndexMap<_, _> = keys.into_iter().zip(results).collect();

        let failed = loaded.values().filter(|result| result.is_err()).count();
        tracing::info!(
            "Loaded {} resource packs in {:.2}ms ({} failed)",
            loaded.len() - failed,
            start.elapsed().as_secs_f64() * 1000.0,
            failed
        );

        loaded
    }

    /// Load the pack under `key`.
    ///
    /// Disabled packs load as a pack with empty data. On failure the
    /// `on_failed` hook may substitute an entry, which is then returned.
    pub async fn load(&self, key: &str) -> Result<ResourcePack, PackError> {
        self.set_state(key, PackState::Unresolved);

        let section = match self.store.pack_section(key) {
            Ok(section) => section,
            Err(error) => return self.fail(key, key, Vec::new(), error),
        };

        let name = util::non_blank(section.name.as_deref()).unwrap_or(key).to_owned();
        let description = section.description.clone();

        match self.resolve(key, &section).await {
            Ok(pack) => {
                self.set_state(key, PackState::Resolved);

                let Some(hook) = &self.on_loaded else {
                    return Ok(pack);
                };

                match hook(PackEntry::new(key, pack.clone())) {
                    Some(entry) => Ok(entry.pack),
                    None => Ok(pack),
                }
            }
            Err(error) => self.fail(key, &name, description, error),
        }
    }

    fn fail(
        &self,
        key: &str,
        name: &str,
        description: Vec<String>,
        error: PackError,
    ) -> Result<ResourcePack, PackError> {
        tracing::warn!("Failed to load resource pack '{}': {}", key, error);
        self.set_state(key, PackState::Failed(error.clone()));

        let stand_in = PackEntry::new(key, ResourcePack::create(name, description));

        match self.on_failed.as_ref().and_then(|hook| hook(stand_in, &error)) {
            Some(entry) => {
                tracing::info!("Substituted resource pack '{}' after failure", key);
                Ok(entry.pack)
            }
            None => Err(error),
        }
    }

    async fn resolve(&self, key: &str, section: &PackSection) -> Result<ResourcePack, PackError> {
        let name = util::non_blank(section.name.as_deref())
            .ok_or_else(|| PackError::config("Name cannot be null or blank"))?
            .to_owned();

        if !section.enabled {
            tracing::debug!("Resource pack '{}' is disabled", key);
            return Ok(ResourcePack::create(name, section.description.clone()));
        }

        let builder = self.builder_for(section)?;

        if builder.requires_remote() {
            self.set_state(key, PackState::ResolvingRemote);
        }

        let start = Instant::now();
        let built = builder.build().await?;
        tracing::info!(
            "Resolved resource pack '{}' in {:.2}ms",
            key,
            start.elapsed().as_secs_f64() * 1000.0
        );

        let update = Self::changes(section, &built);
        if let Err(error) = self.store.commit(key, &update).await {
            tracing::warn!("Failed to save resolved values of '{}': {}", key, error);
        }

        Ok(ResourcePack::new(built.data, name, section.description.clone()))
    }

    fn builder_for(&self, section: &PackSection) -> Result<ResourcePackDataBuilder, PackError> {
        let file_name = util::non_blank(section.file_name.as_deref())
            .ok_or_else(|| PackError::config("File name cannot be null or blank"))?;
        let data = section
            .data
            .as_ref()
            .ok_or_else(|| PackError::config("Data section cannot be null"))?;

        let builder = ResourcePackDataBuilder::new()
            .uuid_str(data.uuid.as_deref())?
            .url(data.url.as_deref())?
            .hash(data.hash.clone())
            .prompt(data.prompt.clone())
            .required(data.required)
            .auto_update(section.auto_update);

        let manager = match builder.get_uri() {
            Some(uri) if section.auto_update => Some(ResourceManager::url(uri.clone(), Arc::clone(&self.client))),
            Some(_) => None,
            None => {
                let github = section
                    .github
                    .as_ref()
                    .ok_or_else(|| PackError::config("GitHub section cannot be null if URL is not provided"))?;
                let user = util::non_blank(github.user.as_deref())
                    .ok_or_else(|| PackError::config("User cannot be null or blank"))?;
                let repo = util::non_blank(github.repo.as_deref())
                    .ok_or_else(|| PackError::config("Repo cannot be null or blank"))?;

                let manager = GitHubResourceManager::new(
                    self.store.base_dir().join(file_name),
                    user,
                    repo,
                    Arc::clone(&self.client),
                )
                .with_current_tag(github.tag.clone())
                .with_token(github.token.clone());

                Some(ResourceManager::github(manager))
            }
        };

        Ok(builder.resource_manager(manager))
    }

    /// Resolved values that differ from what is stored
    fn changes(section: &PackSection, built: &BuiltPack) -> PackUpdate {
        let data = section.data.as_ref();
        let stored_hash = data.and_then(|data| util::non_blank(data.hash.as_deref()));
        let stored_tag = section
            .github
            .as_ref()
            .and_then(|github| util::non_blank(github.tag.as_deref()));
        let resolution = &built.resolution;

        PackUpdate {
            uuid: resolution.uuid_derived.then_some(resolution.uuid),
            hash: (stored_hash != Some(resolution.hash.as_str())).then(|| resolution.hash.clone()),
            tag: resolution
                .tag
                .as_deref()
                .filter(|tag| stored_tag != Some(*tag))
                .map(str::to_owned),
        }
    }
}

impl std::fmt::Debug for ResourcePackLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePackLoader")
            .field("store", &self.store.path())
            .field("packs", &self.states.len())
            .field("on_loaded", &self.on_loaded.is_some())
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}
