//! [`PublicationSink`] that drops finished books into a local directory.
//!
//! Stands in for the hosted upload + signed-URL + notification chain: the
//! PDF is written atomically (temp file in the target directory, then
//! rename) and the returned [`Publication`] carries a `file://` location
//! with the same expiry a signed URL would have.

use crate::error::ServiceError;
use crate::model::{BookManifest, CompiledBook};
use crate::services::{Publication, PublicationSink};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Default lifetime of a publication link: seven days.
pub const DEFAULT_LINK_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    link_ttl: Duration,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            link_ttl: Duration::seconds(DEFAULT_LINK_TTL_SECS),
        }
    }

    pub fn with_link_ttl(mut self, ttl: Duration) -> Self {
        self.link_ttl = ttl;
        self
    }

    /// File name for a book: its id with anything path-hostile replaced.
    fn file_name(book_id: &str) -> String {
        let safe: String = book_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{safe}.pdf")
    }
}

#[async_trait]
impl PublicationSink for DirectorySink {
    async fn publish(
        &self,
        manifest: &BookManifest,
        book: &CompiledBook,
    ) -> Result<Publication, ServiceError> {
        let dir = self.dir.clone();
        let target = dir.join(Self::file_name(&manifest.id));
        let bytes = book.pdf.clone();
        let dest = target.clone();

        tokio::task::spawn_blocking(move || -> Result<(), ServiceError> {
            std::fs::create_dir_all(&dir)
                .map_err(|e| ServiceError::Request(format!("create '{}': {e}", dir.display())))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| ServiceError::Request(format!("tempfile: {e}")))?;
            tmp.write_all(&bytes)
                .map_err(|e| ServiceError::Request(format!("tempfile write: {e}")))?;
            tmp.persist(&dest)
                .map_err(|e| ServiceError::Request(format!("persist '{}': {e}", dest.display())))?;
            Ok(())
        })
        .await
        .map_err(|e| ServiceError::Request(format!("write task panicked: {e}")))??;

        info!("Published '{}' to {}", manifest.title, target.display());
        Ok(Publication {
            location: format!("file://{}", target.display()),
            expires_at: Some(Utc::now() + self.link_ttl),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(id: &str) -> BookManifest {
        BookManifest {
            id: id.into(),
            title: "Title".into(),
            author: "Author".into(),
            chapters: Vec::new(),
        }
    }

    #[test]
    fn file_name_is_sanitised() {
        assert_eq!(DirectorySink::file_name("abc-1_2"), "abc-1_2.pdf");
        assert_eq!(DirectorySink::file_name("../etc/passwd"), "___etc_passwd.pdf");
    }

    #[tokio::test]
    async fn writes_pdf_and_returns_expiring_location() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let book = CompiledBook {
            pdf: b"%PDF-1.7 test".to_vec(),
            pages: Vec::new(),
        };

        let publication = sink.publish(&manifest("book-1"), &book).await.unwrap();

        let written = std::fs::read(dir.path().join("out/book-1.pdf")).unwrap();
        assert_eq!(written, book.pdf);
        assert!(publication.location.starts_with("file://"));
        assert!(publication.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn link_ttl_sets_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path()).with_link_ttl(Duration::hours(2));
        let book = CompiledBook {
            pdf: b"%PDF-1.7 test".to_vec(),
            pages: Vec::new(),
        };

        let before = Utc::now();
        let publication = sink.publish(&manifest("book-2"), &book).await.unwrap();
        let expires = publication.expires_at.unwrap();

        assert!(expires >= before + Duration::hours(2));
        assert!(expires < before + Duration::hours(3));
    }
}
