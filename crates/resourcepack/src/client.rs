//! Transport used by the resource managers.
//!
//! [`ResourceClient`] is the seam between resolution logic and the network:
//! production code uses [`HttpResourceClient`], tests plug in an in-memory
//! client to count requests.

use crate::error::PackError;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

/// Byte stream of a remote or local artifact
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

pub const DEFAULT_USER_AGENT: &str = concat!("ms-resourcepack/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry of the GitHub tag listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub commit: Option<TagCommit>,
    #[serde(default)]
    pub zipball_url: Option<String>,
    #[serde(default)]
    pub tarball_url: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: None,
            zipball_url: None,
            tarball_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCommit {
    pub sha: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait ResourceClient: Send + Sync + fmt::Debug {
    /// Fetch a tag listing. Tags are returned in the order the server sent them.
    async fn fetch_tags(&self, uri: &Url, token: Option<&str>) -> Result<Vec<Tag>, PackError>;

    /// Open an artifact for streaming.
    async fn open(&self, uri: &Url) -> Result<ByteReader, PackError>;

    /// Download an artifact to `path`, replacing whatever is there.
    ///
    /// The body is written to a sibling temporary file first, so an
    /// interrupted download never leaves a truncated file at `path`.
    async fn download(&self, uri: &Url, path: &Path) -> Result<u64, PackError> {
        let mut reader = self.open(uri).await?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let partial = path.with_extension("part");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| PackError::io(format!("Failed to create {}", partial.display()), e))?;

        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| PackError::io(format!("Failed to download {uri}"), e))?;
        tokio::io::AsyncWriteExt::flush(&mut file)
            .await
            .map_err(|e| PackError::io(format!("Failed to write {}", partial.display()), e))?;
        drop(file);

        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| PackError::io(format!("Failed to move download to {}", path.display()), e))?;

        tracing::debug!("Downloaded {} bytes from {} to {}", written, uri, path.display());
        Ok(written)
    }
}

/// HTTP(S) client backed by reqwest. `file:` URIs are read from disk.
#[derive(Debug, Clone)]
pub struct HttpResourceClient {
    client: reqwest::Client,
}

impl HttpResourceClient {
    pub fn new() -> Result<Self, PackError> {
        Self::with_settings(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    pub fn with_settings(user_agent: &str, timeout: Duration) -> Result<Self, PackError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| PackError::Network {
                uri: String::new(),
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    fn network_error(uri: &Url, error: reqwest::Error) -> PackError {
        PackError::Network {
            uri: uri.to_string(),
            message: error.to_string(),
        }
    }

    async fn open_file(uri: &Url) -> Result<ByteReader, PackError> {
        let path = uri.to_file_path().map_err(|()| PackError::InvalidUrl {
            url: uri.to_string(),
            reason: "not a local file path".into(),
        })?;

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| PackError::io(format!("Failed to open {}", path.display()), e))?;

        Ok(Box::new(file))
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn fetch_tags(&self, uri: &Url, token: Option<&str>) -> Result<Vec<Tag>, PackError> {
        let mut request = self
            .client
            .get(uri.clone())
            .header(header::ACCEPT, "application/vnd.github+json");

        if let Some(token) = util::non_blank(token) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| Self::network_error(uri, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => {
                return Err(PackError::Http {
                    uri: uri.to_string(),
                    status: 403,
                    message: "GitHub API rate limit exceeded, provide a token or try again later".into(),
                })
            }
            StatusCode::NOT_FOUND => {
                return Err(PackError::Http {
                    uri: uri.to_string(),
                    status: 404,
                    message: "Repository not found".into(),
                })
            }
            status => {
                return Err(PackError::Http {
                    uri: uri.to_string(),
                    status: status.as_u16(),
                    message: "Unexpected response while fetching tags".into(),
                })
            }
        }

        let tags: Vec<Tag> = response.json().await.map_err(|e| PackError::Parse {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Fetched {} tags from {}", tags.len(), uri);
        Ok(tags)
    }

    async fn open(&self, uri: &Url) -> Result<ByteReader, PackError> {
        if uri.scheme() == "file" {
            return Self::open_file(uri).await;
        }

        let response = self
            .client
            .get(uri.clone())
            .send()
            .await
            .map_err(|e| Self::network_error(uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PackError::Http {
                uri: uri.to_string(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unexpected status").into(),
            });
        }

        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tag_deserialize() {
        let json = r#"[
            {
                "name": "v1.2.0",
                "zipball_url": "https://api.github.com/repos/user/repo/zipball/refs/tags/v1.2.0",
                "tarball_url": "https://api.github.com/repos/user/repo/tarball/refs/tags/v1.2.0",
                "commit": { "sha": "c5b97d5ae6c19d5c5df71a34c7fbeeda2479ccbc", "url": "https://api.github.com/repos/user/repo/commits/c5b97d5" },
                "node_id": "MDM6UmVmcmVmcy90YWdzL3YwLjEuMA=="
            },
            { "name": "v1.1.0" }
        ]"#;

        let tags: Vec<Tag> = serde_json::from_str(json).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "v1.2.0");
        assert_eq!(
            tags[0].commit.as_ref().map(|c| c.sha.as_str()),
            Some("c5b97d5ae6c19d5c5df71a34c7fbeeda2479ccbc")
        );
        assert_eq!(tags[1], Tag::new("v1.1.0"));
    }

    #[tokio::test]
    async fn test_file_uri_download() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.zip");
        std::fs::File::create(&source).unwrap().write_all(b"abc").unwrap();

        let client = HttpResourceClient::new().unwrap();
        let uri = Url::from_file_path(&source).unwrap();
        let target = dir.path().join("nested").join("pack.zip");

        let written = client.download(&uri, &target).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&target).unwrap(), b"abc");
        assert!(!target.with_extension("part").exists());

        let reader = client.open(&uri).await.unwrap();
        assert_eq!(
            util::sha1_hex_reader(reader).await.unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_file_path(dir.path().join("missing.zip")).unwrap();

        let client = HttpResourceClient::new().unwrap();
        let error = client.open(&uri).await.err().unwrap();
        assert!(matches!(error, PackError::Io { .. }));
    }
}
