//! Resource managers: where a pack's bytes come from.
//!
//! A [`ResourceManager`] answers two questions for the builder: what URI
//! should clients download from, and what is the SHA-1 of the artifact at
//! that URI.

use crate::client::{ResourceClient, Tag};
use crate::error::PackError;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const GITHUB_TAGS_URL: &str = "https://api.github.com/repos";
const GITHUB_RELEASE_URL: &str = "https://github.com";

/// Parse a URI, mapping failures to a fatal error naming the input
pub fn parse_url(value: &str) -> Result<Url, PackError> {
    Url::parse(value.trim()).map_err(|e| PackError::InvalidUrl {
        url: value.to_owned(),
        reason: e.to_string(),
    })
}

#[derive(Debug)]
pub enum ResourceManager {
    Url(UrlResourceManager),
    GitHub(GitHubResourceManager),
}

impl ResourceManager {
    pub fn url(uri: Url, client: Arc<dyn ResourceClient>) -> Self {
        Self::Url(UrlResourceManager::new(uri, client))
    }

    pub fn github(manager: GitHubResourceManager) -> Self {
        Self::GitHub(manager)
    }

    /// URI clients download from. May hit the network.
    pub async fn uri(&self) -> Result<Url, PackError> {
        match self {
            Self::Url(manager) => Ok(manager.uri().clone()),
            Self::GitHub(manager) => manager.uri().await,
        }
    }

    /// SHA-1 of the artifact behind [`uri`](Self::uri), lowercase hex.
    pub async fn generate_hash(&self) -> Result<String, PackError> {
        match self {
            Self::Url(manager) => manager.generate_hash().await,
            Self::GitHub(manager) => manager.generate_hash().await,
        }
    }

    /// Latest tag already known without a request, for GitHub managers
    pub fn latest_tag_now(&self) -> Option<Tag> {
        match self {
            Self::Url(_) => None,
            Self::GitHub(manager) => manager.latest_tag_now(),
        }
    }

    pub fn as_github(&self) -> Option<&GitHubResourceManager> {
        match self {
            Self::GitHub(manager) => Some(manager),
            Self::Url(_) => None,
        }
    }
}

/// Pack hosted at a fixed URI.
#[derive(Debug, Clone)]
pub struct UrlResourceManager {
    uri: Url,
    client: Arc<dyn ResourceClient>,
}

impl UrlResourceManager {
    pub fn new(uri: Url, client: Arc<dyn ResourceClient>) -> Self {
        Self { uri, client }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Stream the artifact through SHA-1 without storing it
    pub async fn generate_hash(&self) -> Result<String, PackError> {
        let reader = self.client.open(&self.uri).await?;

        util::sha1_hex_reader(reader)
            .await
            .map_err(|e| PackError::io(format!("Failed to read {}", self.uri), e))
    }
}

/// Pack published as a release asset of a GitHub repository.
///
/// The release asset must be named after the local file. The tag list is
/// cached after the first successful fetch; an empty list is never cached.
pub struct GitHubResourceManager {
    file: PathBuf,
    user: String,
    repo: String,
    current_tag: Option<String>,
    token: Option<String>,
    tags: RwLock<Option<Arc<Vec<Tag>>>>,
    client: Arc<dyn ResourceClient>,
}

impl GitHubResourceManager {
    pub fn new(
        file: impl Into<PathBuf>,
        user: impl Into<String>,
        repo: impl Into<String>,
        client: Arc<dyn ResourceClient>,
    ) -> Self {
        Self {
            file: file.into(),
            user: user.into(),
            repo: repo.into(),
            current_tag: None,
            token: None,
            tags: RwLock::new(None),
            client,
        }
    }

    /// Tag the local file was last downloaded from. Blank tags count as none.
    pub fn with_current_tag(mut self, tag: Option<String>) -> Self {
        self.current_tag = tag.filter(|tag| !util::is_blank(Some(tag.as_str())));
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !util::is_blank(Some(token.as_str())));
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn current_tag(&self) -> Option<&str> {
        self.current_tag.as_deref()
    }

    fn file_name(&self) -> Result<&str, PackError> {
        self.file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PackError::config(format!("Invalid file name: {}", self.file.display())))
    }

    pub fn tags_uri(&self) -> Result<Url, PackError> {
        parse_url(&format!("{}/{}/{}/tags", GITHUB_TAGS_URL, self.user, self.repo))
    }

    /// Download URI of the release asset for `tag`
    pub fn release_uri(&self, tag: &str) -> Result<Url, PackError> {
        parse_url(&format!(
            "{}/{}/{}/releases/download/{}/{}",
            GITHUB_RELEASE_URL,
            self.user,
            self.repo,
            tag,
            self.file_name()?
        ))
    }

    /// Cached tags, without a request
    pub fn tags_now(&self) -> Option<Arc<Vec<Tag>>> {
        self.tags.read().clone()
    }

    pub fn latest_tag_now(&self) -> Option<Tag> {
        self.tags.read().as_ref().and_then(|tags| tags.first().cloned())
    }

    /// Cached tags, fetching them on the first call
    pub async fn tags(&self) -> Result<Arc<Vec<Tag>>, PackError> {
        if let Some(tags) = self.tags_now() {
            return Ok(tags);
        }

        self.update_tags().await
    }

    /// Fetch the tag list again, replacing the cache when it is non-empty
    pub async fn update_tags(&self) -> Result<Arc<Vec<Tag>>, PackError> {
        let uri = self.tags_uri()?;
        let tags = Arc::new(self.client.fetch_tags(&uri, self.token.as_deref()).await?);

        if !tags.is_empty() {
            *self.tags.write() = Some(Arc::clone(&tags));
        }

        Ok(tags)
    }

    /// Newest tag. Tags are listed newest first.
    pub async fn latest_tag(&self) -> Result<Tag, PackError> {
        self.tags()
            .await?
            .first()
            .cloned()
            .ok_or_else(|| PackError::NoTags {
                user: self.user.clone(),
                repo: self.repo.clone(),
            })
    }

    pub async fn uri(&self) -> Result<Url, PackError> {
        let tag = self.latest_tag().await?;

        if util::is_blank(Some(tag.name.as_str())) {
            return Err(PackError::Parse {
                uri: self.tags_uri()?.to_string(),
                message: "Latest tag has no name".into(),
            });
        }

        self.release_uri(&tag.name)
    }

    /// Hash the local file, downloading the latest release first unless the
    /// file exists and was fetched from the latest tag already.
    pub async fn generate_hash(&self) -> Result<String, PackError> {
        let latest = self.latest_tag().await?;
        let up_to_date = self.current_tag() == Some(latest.name.as_str())
            && tokio::fs::try_exists(&self.file).await.unwrap_or(false);

        if up_to_date {
            tracing::debug!(
                "{} is up to date with {}/{}@{}",
                self.file.display(),
                self.user,
                self.repo,
                latest.name
            );
        } else {
            let uri = self.release_uri(&latest.name)?;
            tracing::info!("Downloading {} from {}", self.file.display(), uri);
            self.client.download(&uri, &self.file).await?;
        }

        let file = tokio::fs::File::open(&self.file)
            .await
            .map_err(|e| PackError::io(format!("Failed to open {}", self.file.display()), e))?;

        util::sha1_hex_reader(file)
            .await
            .map_err(|e| PackError::io(format!("Failed to read {}", self.file.display()), e))
    }
}

impl fmt::Debug for GitHubResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubResourceManager")
            .field("file", &self.file)
            .field("user", &self.user)
            .field("repo", &self.repo)
            .field("current_tag", &self.current_tag)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteReader;
    use async_trait::async_trait;

    #[derive(Debug, Default)]
    struct NoNetwork;

    #[async_trait]
    impl ResourceClient for NoNetwork {
        async fn fetch_tags(&self, uri: &Url, _token: Option<&str>) -> Result<Vec<Tag>, PackError> {
            Err(PackError::Network {
                uri: uri.to_string(),
                message: "offline".into(),
            })
        }

        async fn open(&self, uri: &Url) -> Result<ByteReader, PackError> {
            Err(PackError::Network {
                uri: uri.to_string(),
                message: "offline".into(),
            })
        }
    }

    fn manager() -> GitHubResourceManager {
        GitHubResourceManager::new("packs/pack.zip", "MinersStudios", "MSResourcePack", Arc::new(NoNetwork))
    }

    #[test]
    fn test_github_uris() {
        let manager = manager();

        assert_eq!(
            manager.tags_uri().unwrap().as_str(),
            "https://api.github.com/repos/MinersStudios/MSResourcePack/tags"
        );
        assert_eq!(
            manager.release_uri("v1.0.0").unwrap().as_str(),
            "https://github.com/MinersStudios/MSResourcePack/releases/download/v1.0.0/pack.zip"
        );
    }

    #[test]
    fn test_blank_tag_and_token_ignored() {
        let manager = manager()
            .with_current_tag(Some(" ".into()))
            .with_token(Some(String::new()));

        assert_eq!(manager.current_tag(), None);
        assert!(format!("{manager:?}").contains("has_token: false"));
    }

    #[tokio::test]
    async fn test_network_failure_is_transient() {
        let error = manager().latest_tag().await.unwrap_err();
        assert!(!error.is_fatal());
        assert_eq!(manager().latest_tag_now(), None);
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com/pack.zip").is_ok());
        assert!(matches!(parse_url("not a url"), Err(PackError::InvalidUrl { .. })));
    }
}
