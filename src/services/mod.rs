//! Narrow contracts with the systems the compiler does not own.
//!
//! Every AI model, storage backend, and delivery channel sits behind one of
//! four traits. The pipeline only ever sees these traits, so the whole book
//! compiler can be driven from in-memory fakes in tests and from real
//! network adapters in production.
//!
//! | Trait | Default adapter | Used by |
//! |-------|-----------------|---------|
//! | [`TextGenerator`]   | [`llm::LlmTextGenerator`] (edgequake-llm)    | character bible, pagination |
//! | [`ImageGenerator`]  | [`images::OpenAiImageGenerator`] (reqwest)  | reference image, page illustrations |
//! | [`ChapterSource`]   | [`source::ManifestFileSource`] (JSON file)  | job start |
//! | [`PublicationSink`] | [`sink::DirectorySink`] (local directory)   | job completion |

pub mod images;
pub mod llm;
pub mod sink;
pub mod source;

use crate::error::ServiceError;
use crate::model::{BookManifest, CompiledBook};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single system-instruction + user-text completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl TextRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Text-generation service: instruction + text in, generated text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: TextRequest) -> Result<String, ServiceError>;
}

/// One image-generation request.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub style: &'a str,
    pub model: &'a str,
    pub size: &'a str,
    pub character_bible: Option<&'a str>,
    pub reference_image: Option<&'a [u8]>,
}

/// Image-generation service: returns the raw encoded image bytes.
///
/// The format of the returned bytes is not part of the contract; the
/// compositor sniffs it.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: ImageRequest<'_>) -> Result<Vec<u8>, ServiceError>;
}

/// Where books and their chapter drafts come from.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Load one book. A missing book is [`ServiceError::NotFound`].
    async fn load_book(&self, book_id: &str) -> Result<BookManifest, ServiceError>;
}

/// Where a finished book is handed off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Opaque location the reader can fetch the PDF from.
    pub location: String,
    /// When `location` stops working, if it is time-limited.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Upload, link creation, and notification all live behind this trait.
#[async_trait]
pub trait PublicationSink: Send + Sync {
    async fn publish(
        &self,
        manifest: &BookManifest,
        book: &CompiledBook,
    ) -> Result<Publication, ServiceError>;
}
