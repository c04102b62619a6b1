//! Chapter pagination: one chapter's text → ordered picture-book pages.
//!
//! The text model is treated as an untrusted function. Its reply must be a
//! JSON object `{"pages":[{"content":…,"illustrationPrompt":…}]}` and the
//! page contents, joined in order, must reproduce the chapter text (see
//! [`crate::pipeline::postprocess`] for the comparison rules). Any call
//! failure or contract violation falls back to one page holding the whole
//! chapter verbatim; partial repair is never attempted.

use crate::error::StageError;
use crate::model::{ChapterText, PagePlan, TextPlacement};
use crate::pipeline::postprocess::{clean_json_reply, fragments_reconstruct};
use crate::prompts::{fallback_illustration_prompt, pagination_system_prompt};
use crate::services::{TextGenerator, TextRequest};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Soft per-page word limit asked of the model; exceeding it only warns.
pub const MAX_WORDS_PER_PAGE: usize = 40;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaginationReply {
    pages: Vec<PageFragment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PageFragment {
    content: String,
    illustration_prompt: String,
}

/// Why a pagination reply was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("reply is not valid pagination JSON: {0}")]
    Malformed(String),

    #[error("reply contains no pages")]
    NoPages,

    #[error("page {0} has empty content")]
    EmptyContent(usize),

    #[error("page {0} has an empty illustration prompt")]
    EmptyPrompt(usize),

    #[error("page contents do not reproduce the chapter text")]
    ContentMismatch,
}

/// Result of paginating one chapter.
#[derive(Debug, Clone)]
pub struct ChapterPagination {
    pub pages: Vec<PagePlan>,
    /// Set when the chapter fell back to a single whole-chapter page.
    pub fallback: Option<StageError>,
}

/// Paginate one chapter into roughly `target_pages` pages.
///
/// Never fails: on any problem the chapter becomes one page with its full
/// text, and the reason is returned in [`ChapterPagination::fallback`].
pub async fn paginate_chapter(
    generator: &dyn TextGenerator,
    chapter: &ChapterText,
    target_pages: usize,
    fallback_prompt_chars: usize,
) -> ChapterPagination {
    let request = TextRequest {
        temperature: Some(0.0),
        ..TextRequest::new(pagination_system_prompt(target_pages), chapter.content.clone())
    };

    let detail = match generator.generate(request).await {
        Ok(reply) => match parse_pagination(chapter, &reply) {
            Ok(pages) => {
                info!(
                    "Chapter {}: paginated into {} page(s) (budget {})",
                    chapter.chapter_number,
                    pages.len(),
                    target_pages
                );
                return ChapterPagination {
                    pages,
                    fallback: None,
                };
            }
            Err(violation) => violation.to_string(),
        },
        Err(e) => format!("text generation failed: {e}"),
    };

    warn!(
        "Chapter {}: pagination rejected ({}); using a single whole-chapter page",
        chapter.chapter_number, detail
    );
    ChapterPagination {
        pages: fallback_pages(chapter, fallback_prompt_chars),
        fallback: Some(StageError::PaginationFallback {
            chapter: chapter.chapter_number,
            detail,
        }),
    }
}

/// Parse and validate a pagination reply against the chapter it came from.
pub fn parse_pagination(
    chapter: &ChapterText,
    reply: &str,
) -> Result<Vec<PagePlan>, ContractViolation> {
    let json = clean_json_reply(reply);
    let parsed: PaginationReply =
        serde_json::from_str(&json).map_err(|e| ContractViolation::Malformed(e.to_string()))?;

    if parsed.pages.is_empty() {
        return Err(ContractViolation::NoPages);
    }

    for (i, page) in parsed.pages.iter().enumerate() {
        if page.content.trim().is_empty() {
            return Err(ContractViolation::EmptyContent(i + 1));
        }
        if page.illustration_prompt.trim().is_empty() {
            return Err(ContractViolation::EmptyPrompt(i + 1));
        }
        let words = page.content.split_whitespace().count();
        if words > MAX_WORDS_PER_PAGE {
            debug!(
                "Chapter {} page {}: {} words exceeds the {}-word guideline",
                chapter.chapter_number,
                i + 1,
                words,
                MAX_WORDS_PER_PAGE
            );
        }
    }

    let contents: Vec<&str> = parsed.pages.iter().map(|p| p.content.as_str()).collect();
    if !fragments_reconstruct(&chapter.content, &contents) {
        return Err(ContractViolation::ContentMismatch);
    }

    Ok(parsed
        .pages
        .into_iter()
        .map(|p| PagePlan {
            chapter_number: chapter.chapter_number,
            content: p.content.trim().to_string(),
            illustration_prompt: p.illustration_prompt.trim().to_string(),
            text_placement: TextPlacement::default(),
        })
        .collect())
}

/// The single-page fallback: the whole chapter verbatim.
pub fn fallback_pages(chapter: &ChapterText, prompt_chars: usize) -> Vec<PagePlan> {
    vec![PagePlan {
        chapter_number: chapter.chapter_number,
        content: chapter.content.clone(),
        illustration_prompt: fallback_illustration_prompt(&chapter.content, prompt_chars),
        text_placement: TextPlacement::default(),
    }]
}
