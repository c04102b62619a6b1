//! Chapter text resolution: pick the single text every later stage uses.
//!
//! Priority: most recent non-blank AI rewrite, then the cleaned transcript,
//! then the raw transcript, else the empty string. Bible generation,
//! pagination, and fallback rendering all read the output of this module
//! and nothing else, so they can never disagree about a chapter's text.

use crate::model::{BookManifest, ChapterDraft, ChapterText};
use tracing::{debug, warn};

/// Resolve the best available text for one chapter.
pub fn resolve_chapter(draft: &ChapterDraft) -> ChapterText {
    let latest_rewrite = draft
        .rewrites
        .iter()
        .enumerate()
        // Later entries win ties on `created_at`.
        .max_by_key(|(i, r)| (r.created_at, *i))
        .map(|(_, r)| r.text.as_str());

    let content = [
        latest_rewrite,
        draft.cleaned_transcript.as_deref(),
        draft.transcript.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|t| !t.trim().is_empty())
    .map(|t| t.trim().to_string())
    .unwrap_or_default();

    ChapterText {
        chapter_number: draft.chapter_number,
        content,
    }
}

/// Resolve every chapter of a book, ordered by chapter number.
///
/// Chapters that resolve to empty text are dropped with a warning; they
/// have nothing to paginate or illustrate.
pub fn resolve_book(manifest: &BookManifest) -> Vec<ChapterText> {
    let mut chapters: Vec<ChapterText> = manifest
        .chapters
        .iter()
        .map(resolve_chapter)
        .filter(|c| {
            if c.content.is_empty() {
                warn!("Chapter {} has no text in any variant; skipping", c.chapter_number);
                false
            } else {
                true
            }
        })
        .collect();
    chapters.sort_by_key(|c| c.chapter_number);
    debug!("Resolved {} chapter(s) for book '{}'", chapters.len(), manifest.id);
    chapters
}
