//! Data model shared by every pipeline stage.
//!
//! Values flow strictly forward: [`ChapterDraft`] → [`ChapterText`] →
//! [`PagePlan`] → [`PageRenderData`] → [`CompiledBook`]. No stage mutates a
//! value it did not create, except the illustration stage which overwrites
//! [`PagePlan::text_placement`] once an image exists to analyse.

use crate::error::StageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Input ────────────────────────────────────────────────────────────────

/// One AI rewrite of a chapter, kept with its creation time so the most
/// recent one can be chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rewrite {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Every text variant the application stores for one recorded chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterDraft {
    pub chapter_number: u32,
    #[serde(default)]
    pub rewrites: Vec<Rewrite>,
    #[serde(default)]
    pub cleaned_transcript: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// A book as delivered by the chapter source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookManifest {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub chapters: Vec<ChapterDraft>,
}

/// The single resolved text of a chapter. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterText {
    pub chapter_number: u32,
    pub content: String,
}

impl ChapterText {
    /// Length in characters (not bytes), the unit used for page budgeting.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

// ── Page planning ────────────────────────────────────────────────────────

/// Where the body text sits relative to the illustration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPlacement {
    Top,
    #[default]
    Bottom,
}

impl std::fmt::Display for TextPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextPlacement::Top => f.write_str("top"),
            TextPlacement::Bottom => f.write_str("bottom"),
        }
    }
}

/// One physical page of the finished book, before its image exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePlan {
    pub chapter_number: u32,
    pub content: String,
    pub illustration_prompt: String,
    pub text_placement: TextPlacement,
}

/// A [`PagePlan`] plus its generated illustration, if generation succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRenderData {
    pub plan: PagePlan,
    pub image: Option<Vec<u8>>,
}

// ── Output ───────────────────────────────────────────────────────────────

/// What a physical page of the PDF carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageKind {
    Cover,
    Content {
        chapter_number: u32,
        /// Index into the planned pages this physical page renders.
        plan_index: usize,
        /// `true` when the page only exists because the previous one overflowed.
        continuation: bool,
    },
}

/// Inspectable summary of one emitted PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub kind: PageKind,
    pub has_image: bool,
    /// Visible body lines, in reading order.
    pub lines: Vec<String>,
    pub footer: Option<String>,
    pub sign_off: Option<String>,
}

/// The final binary PDF and a per-page summary of what it contains.
///
/// Write-once: nothing in the crate mutates a `CompiledBook` after the
/// compositor returns it.
#[derive(Debug, Clone)]
pub struct CompiledBook {
    pub pdf: Vec<u8>,
    pub pages: Vec<PageSummary>,
}

impl CompiledBook {
    /// Number of content pages (every page except the cover).
    pub fn content_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.kind, PageKind::Content { .. }))
            .count()
    }

    /// All visible body text of one planned page, joined across continuations.
    pub fn text_for_plan(&self, plan_index: usize) -> String {
        self.pages
            .iter()
            .filter(|p| {
                matches!(p.kind, PageKind::Content { plan_index: i, .. } if i == plan_index)
            })
            .flat_map(|p| p.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Counters and timings for one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationStats {
    pub chapters: usize,
    pub planned_pages: usize,
    pub fallback_chapters: usize,
    pub illustrated_pages: usize,
    pub failed_illustrations: usize,
    /// PDF content pages, including overflow continuations.
    pub content_pages: usize,
    pub pagination_duration_ms: u64,
    pub illustration_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Every degradation that was logged and swallowed along the way.
    pub warnings: Vec<StageError>,
}

/// Everything [`crate::compile::compile_book`] produces.
#[derive(Debug, Clone)]
pub struct CompilationOutput {
    pub book: CompiledBook,
    pub pages: Vec<PagePlan>,
    pub stats: CompilationStats,
}
