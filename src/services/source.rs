//! [`ChapterSource`] reading book manifests from JSON files.
//!
//! A manifest file holds either one [`BookManifest`] or an array of them.
//! The file is re-read on every call so edits between jobs are picked up.

use crate::error::ServiceError;
use crate::model::BookManifest;
use crate::services::ChapterSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// Reads books from a JSON manifest on disk.
#[derive(Debug, Clone)]
pub struct ManifestFileSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Many(Vec<BookManifest>),
    One(BookManifest),
}

impl ManifestFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse every book in the file.
    pub async fn load_all(&self) -> Result<Vec<BookManifest>, ServiceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ServiceError::NotFound(format!("manifest '{}'", self.path.display()))
            } else {
                ServiceError::Request(format!("reading '{}': {e}", self.path.display()))
            }
        })?;
        let parsed: ManifestFile = serde_json::from_str(&raw).map_err(|e| {
            ServiceError::InvalidResponse(format!("manifest '{}': {e}", self.path.display()))
        })?;
        Ok(match parsed {
            ManifestFile::Many(books) => books,
            ManifestFile::One(book) => vec![book],
        })
    }
}

#[async_trait]
impl ChapterSource for ManifestFileSource {
    async fn load_book(&self, book_id: &str) -> Result<BookManifest, ServiceError> {
        let books = self.load_all().await?;
        debug!("Manifest {} holds {} book(s)", self.path.display(), books.len());
        books
            .into_iter()
            .find(|b| b.id == book_id)
            .ok_or_else(|| ServiceError::NotFound(format!("book '{book_id}'")))
    }
}
