//! In-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ms_resourcepack::{ByteReader, PackError, ResourceClient, Tag};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

pub const USER: &str = "MinersStudios";
pub const REPO: &str = "MSResourcePack";

pub fn tags_uri(user: &str, repo: &str) -> String {
    format!("https://api.github.com/repos/{user}/{repo}/tags")
}

pub fn release_uri(user: &str, repo: &str, tag: &str, file: &str) -> String {
    format!("https://github.com/{user}/{repo}/releases/download/{tag}/{file}")
}

/// Serves canned tag listings and payloads, and counts requests
#[derive(Debug, Default)]
pub struct MockClient {
    tags: Mutex<HashMap<String, Vec<Tag>>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    tag_requests: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(self, uri: &str, tags: &[&str]) -> Self {
        self.set_tags(uri, tags);
        self
    }

    pub fn with_payload(self, uri: &str, bytes: &[u8]) -> Self {
        self.payloads.lock().insert(uri.to_owned(), bytes.to_vec());
        self
    }

    pub fn set_tags(&self, uri: &str, tags: &[&str]) {
        self.tags
            .lock()
            .insert(uri.to_owned(), tags.iter().map(|name| Tag::new(*name)).collect());
    }

    pub fn tag_requests(&self) -> usize {
        self.tag_requests.load(Ordering::SeqCst)
    }

    pub fn opens_of(&self, uri: &str) -> usize {
        self.opened.lock().iter().filter(|opened| opened.as_str() == uri).count()
    }

    pub fn total_opens(&self) -> usize {
        self.opened.lock().len()
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    async fn fetch_tags(&self, uri: &Url, _token: Option<&str>) -> Result<Vec<Tag>, PackError> {
        self.tag_requests.fetch_add(1, Ordering::SeqCst);

        self.tags.lock().get(uri.as_str()).cloned().ok_or_else(|| PackError::Http {
            uri: uri.to_string(),
            status: 404,
            message: "Repository not found".into(),
        })
    }

    async fn open(&self, uri: &Url) -> Result<ByteReader, PackError> {
        self.opened.lock().push(uri.to_string());

        match self.payloads.lock().get(uri.as_str()) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(PackError::Http {
                uri: uri.to_string(),
                status: 404,
                message: "Not Found".into(),
            }),
        }
    }
}
