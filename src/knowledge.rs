//! Knowledge library loading.
//!
//! The library is fetched fresh on every request and never cached, so edits
//! to the JSON show up on the next question. Two sources are supported:
//!
//! - **HTTP** — `GET` with `Cache-Control: no-cache`. The URL is fixed at
//!   startup from configuration; nothing in an incoming request can change it.
//! - **File** — re-read from disk on every call.
//!
//! Both yield the same two failure kinds: the library could not be reached,
//! or it was reached but is not a JSON array of entries.

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::KnowledgeLocation;
use crate::models::KnowledgeEntry;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge file not found at {location}. Create knowledge/golf_entries.json")]
    Unavailable { location: String },

    #[error("Knowledge file at {location} is not valid JSON.")]
    Invalid { location: String },
}

/// A place the knowledge library can be loaded from.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable location, used in error messages and logs.
    fn describe(&self) -> String;

    /// Loads the full library.
    async fn fetch(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError>;
}

pub fn create_source(location: &KnowledgeLocation) -> Box<dyn KnowledgeSource> {
    match location {
        KnowledgeLocation::Url(url) => Box::new(HttpKnowledgeSource::new(url.clone())),
        KnowledgeLocation::File(path) => Box::new(FileKnowledgeSource::new(path.clone())),
    }
}

/// Parses a library body. Missing or null `title`, `tags`, and `content`
/// fall back to empty values.
pub fn parse_entries(bytes: &[u8], location: &str) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::warn!(location, error = %e, "knowledge library failed to parse");
        KnowledgeError::Invalid {
            location: location.to_string(),
        }
    })
}

// ============ HTTP ============

/// Fetches an absolute URL resolved from `[knowledge]` at startup.
pub struct HttpKnowledgeSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKnowledgeSource {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl KnowledgeSource for HttpKnowledgeSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        let url = &self.url;
        let unavailable = || KnowledgeError::Unavailable {
            location: url.clone(),
        };

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "knowledge fetch failed");
                unavailable()
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "knowledge fetch returned non-success");
            return Err(unavailable());
        }

        let bytes = response.bytes().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "knowledge body could not be read");
            KnowledgeError::Invalid {
                location: url.clone(),
            }
        })?;

        parse_entries(&bytes, url)
    }
}

// ============ File ============

pub struct FileKnowledgeSource {
    path: PathBuf,
}

impl FileKnowledgeSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl KnowledgeSource for FileKnowledgeSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        let location = self.describe();
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            tracing::warn!(location = %location, error = %e, "knowledge file could not be read");
            KnowledgeError::Unavailable {
                location: location.clone(),
            }
        })?;
        parse_entries(&bytes, &location)
    }
}
