//! Error types for the storybook-press library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`StorybookError`] — **Fatal**: the compilation cannot proceed at all
//!   (book missing, no chapters, PDF construction failed, upload failed).
//!   Returned as `Err(StorybookError)` from [`crate::compile::compile_book`]
//!   and recorded on the job by [`crate::job::run_job`].
//!
//! * [`ServiceError`] — a single call to an external collaborator (text
//!   model, image model, chapter source, publication sink) failed. Each
//!   pipeline stage decides whether that is fatal or degradable.
//!
//! * [`StageError`] — **Non-fatal**: a stage degraded (pagination fell back
//!   to a whole-chapter page, an illustration is missing, the QR code could
//!   not be drawn). Collected in [`crate::model::CompilationStats::warnings`]
//!   so callers can audit what was lost without the book being rejected.

use thiserror::Error;

/// All fatal errors returned by the storybook-press library.
#[derive(Debug, Error)]
pub enum StorybookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The chapter source has no book with this id.
    #[error("Book '{book_id}' not found")]
    BookNotFound { book_id: String },

    /// The book exists but none of its chapters has any usable text.
    #[error("Book '{book_id}' has no chapters with text")]
    NoChapters { book_id: String },

    /// The chapter source failed for a reason other than a missing book.
    #[error("Failed to load book '{book_id}': {source}")]
    Source {
        book_id: String,
        #[source]
        source: ServiceError,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Document structure could not be produced (fonts, page tree, streams).
    #[error("PDF construction failed: {0}")]
    PdfConstruction(String),

    /// The compiled PDF could not be handed to the publication sink.
    #[error("Publication of book '{book_id}' failed: {source}")]
    Publication {
        book_id: String,
        #[source]
        source: ServiceError,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No text or image generator could be resolved.
    #[error("{service} provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured {
        service: &'static str,
        provider: String,
        hint: String,
    },

    // ── Job errors ────────────────────────────────────────────────────────
    /// A job was asked to move between two states that are not connected.
    #[error("Invalid job transition for book '{book_id}': {from} → {to}")]
    InvalidTransition {
        book_id: String,
        from: String,
        to: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of one call to an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport or API-level failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The call did not return within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered, but the answer is unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The adapter is missing credentials or an endpoint.
    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// A non-fatal degradation recorded during compilation.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The paginator output was rejected; the chapter became a single page.
    #[error("Chapter {chapter}: pagination fell back to a single page: {detail}")]
    PaginationFallback { chapter: u32, detail: String },

    /// Character bible generation failed; illustrations run without it.
    #[error("Character bible generation failed: {detail}")]
    BibleFailed { detail: String },

    /// Reference image generation failed; illustrations run without an anchor.
    #[error("Reference image generation failed: {detail}")]
    ReferenceImageFailed { detail: String },

    /// The illustration for one page could not be generated.
    #[error("Page {page} (chapter {chapter}): illustration failed: {detail}")]
    IllustrationFailed {
        page: usize,
        chapter: u32,
        detail: String,
    },

    /// The image could not be analysed; text placement defaulted to bottom.
    #[error("Page {page}: placement analysis failed, using bottom: {detail}")]
    PlacementFailed { page: usize, detail: String },

    /// The generated image could not be embedded; the page is text-only.
    #[error("Page {page}: image could not be embedded: {detail}")]
    ImageEmbedFailed { page: usize, detail: String },

    /// A word could not be encoded in the output font and was skipped.
    #[error("Page {page}: skipped unencodable word {word:?}")]
    WordSkipped { page: usize, word: String },

    /// The cover QR code could not be produced.
    #[error("Cover QR code failed: {detail}")]
    QrCodeFailed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_not_found_display() {
        let e = StorybookError::BookNotFound {
            book_id: "b-42".into(),
        };
        assert!(e.to_string().contains("b-42"));
    }

    #[test]
    fn source_error_keeps_cause() {
        let e = StorybookError::Source {
            book_id: "b-1".into(),
            source: ServiceError::Timeout { secs: 30 },
        };
        let msg = e.to_string();
        assert!(msg.contains("b-1"), "got: {msg}");
        assert!(msg.contains("30s"), "got: {msg}");
    }

    #[test]
    fn invalid_transition_display() {
        let e = StorybookError::InvalidTransition {
            book_id: "b-7".into(),
            from: "complete".into(),
            to: "generating".into(),
        };
        assert!(e.to_string().contains("complete → generating"));
    }

    #[test]
    fn illustration_failed_display() {
        let e = StageError::IllustrationFailed {
            page: 4,
            chapter: 2,
            detail: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 4"));
        assert!(msg.contains("chapter 2"));
        assert!(msg.contains("HTTP 500"));
    }

    #[test]
    fn stage_error_serialises() {
        let e = StageError::QrCodeFailed {
            detail: "data too long".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("QrCodeFailed"));
    }
}
