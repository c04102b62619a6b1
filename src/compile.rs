//! Book compilation entry points.
//!
//! [`compile_book`] resolves the text and image services from the config and
//! runs the whole pipeline; [`compile_with`] takes the services explicitly
//! (tests, embedding applications). [`plan_book`] does the deterministic
//! first half only (chapter resolution and page budget) without any AI call.
//!
//! Only [`StorybookError`]s escape from here: every stage-level degradation
//! is logged, recorded in [`CompilationStats::warnings`] and absorbed.

use crate::compose::{compose_book, ComposeSettings};
use crate::config::CompilationConfig;
use crate::error::{StageError, StorybookError};
use crate::model::{
    BookManifest, ChapterText, CompilationOutput, CompilationStats, PagePlan,
};
use crate::pipeline::bible::build_visual_anchor;
use crate::pipeline::budget::allocate_for_chapters;
use crate::pipeline::illustrate::illustrate_pages;
use crate::pipeline::paginate::paginate_chapter;
use crate::pipeline::resolve::resolve_book;
use crate::services::images::resolve_image_generator;
use crate::services::llm::resolve_text_generator;
use crate::services::{ImageGenerator, TextGenerator};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Resolved chapters and the pages allotted to each.
#[derive(Debug, Clone, Serialize)]
pub struct BookPlan {
    pub chapters: Vec<ChapterText>,
    /// `budget[i]` is the page target for `chapters[i]`.
    pub budget: Vec<usize>,
}

impl BookPlan {
    pub fn total_pages(&self) -> usize {
        self.budget.iter().sum()
    }
}

/// Resolve every chapter's text and allocate the page budget.
///
/// # Errors
/// [`StorybookError::NoChapters`] when no chapter has any text.
pub fn plan_book(
    manifest: &BookManifest,
    config: &CompilationConfig,
) -> Result<BookPlan, StorybookError> {
    let chapters = resolve_book(manifest);
    if chapters.is_empty() {
        return Err(StorybookError::NoChapters {
            book_id: manifest.id.clone(),
        });
    }
    let budget = allocate_for_chapters(
        &chapters,
        config.max_pages,
        config.min_pages_per_chapter,
    );
    Ok(BookPlan { chapters, budget })
}

/// Compile a book with the services configured in `config`.
///
/// # Errors
/// Fails before any work if a service cannot be resolved, and otherwise
/// only for the fatal cases of [`compile_with`].
pub async fn compile_book(
    manifest: &BookManifest,
    config: &CompilationConfig,
) -> Result<CompilationOutput, StorybookError> {
    let text = resolve_text_generator(config)?;
    let images = resolve_image_generator(config)?;
    compile_with(manifest, text.as_ref(), images.as_ref(), config).await
}

/// Compile a book with explicit services.
///
/// Returns `Ok` with a complete PDF even when chapters fell back, the bible
/// failed, or illustrations are missing (see `stats.warnings`).
///
/// # Errors
/// - [`StorybookError::NoChapters`] — nothing to print
/// - [`StorybookError::PdfConstruction`] — the document could not be built
pub async fn compile_with(
    manifest: &BookManifest,
    text: &dyn TextGenerator,
    images: &dyn ImageGenerator,
    config: &CompilationConfig,
) -> Result<CompilationOutput, StorybookError> {
    let total_start = Instant::now();
    info!(
        "Compiling book {:?} ({} chapter draft(s))",
        manifest.id,
        manifest.chapters.len()
    );

    // ── Step 1: Resolve chapters and budget ──────────────────────────────
    let plan = plan_book(manifest, config)?;
    info!(
        "{} chapter(s), budget {:?} ({} pages, cap {})",
        plan.chapters.len(),
        plan.budget,
        plan.total_pages(),
        config.max_pages
    );
    let mut warnings: Vec<StageError> = Vec::new();

    // ── Step 2: Character bible and reference image ──────────────────────
    let anchor = build_visual_anchor(
        text,
        images,
        &plan.chapters,
        &config.art_style,
        &config.image_model,
        &config.image_size,
        &mut warnings,
    )
    .await;

    // ── Step 3: Paginate, one chapter at a time ──────────────────────────
    let pagination_start = Instant::now();
    let mut plans: Vec<PagePlan> = Vec::new();
    let mut fallback_chapters = 0;
    for (chapter, &target) in plan.chapters.iter().zip(&plan.budget) {
        let paginated =
            paginate_chapter(text, chapter, target, config.fallback_prompt_chars).await;
        let fell_back = paginated.fallback.is_some();
        if let Some(cb) = config.progress() {
            cb.on_chapter_paginated(chapter.chapter_number, paginated.pages.len(), fell_back);
        }
        if let Some(reason) = paginated.fallback {
            fallback_chapters += 1;
            warnings.push(reason);
        }
        plans.extend(paginated.pages);
    }
    let pagination_duration_ms = pagination_start.elapsed().as_millis() as u64;
    let planned_pages = plans.len();
    if planned_pages != plan.total_pages() {
        info!(
            "Pagination produced {} page(s) against a budget of {}",
            planned_pages,
            plan.total_pages()
        );
    }

    // ── Step 4: Illustrate ───────────────────────────────────────────────
    let illustration_start = Instant::now();
    let outcome = illustrate_pages(images, plans, &anchor, config).await;
    let illustration_duration_ms = illustration_start.elapsed().as_millis() as u64;
    let failed_illustrations = outcome.failures.len();
    let illustrated_pages = outcome.pages.iter().filter(|p| p.image.is_some()).count();
    warnings.extend(outcome.failures);
    warnings.extend(outcome.placement_warnings);
    let final_plans: Vec<PagePlan> = outcome.pages.iter().map(|p| p.plan.clone()).collect();

    // ── Step 5: Compose the PDF ──────────────────────────────────────────
    let compose_start = Instant::now();
    let settings = ComposeSettings::new(manifest, config);
    let render_data = outcome.pages;
    let (composed, compose_warnings) = tokio::task::spawn_blocking(move || {
        let mut warnings = Vec::new();
        let book = compose_book(&settings, &render_data, &mut warnings);
        (book, warnings)
    })
    .await
    .map_err(|e| StorybookError::Internal(format!("compose task panicked: {e}")))?;
    warnings.extend(compose_warnings);
    let book = composed?;
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

    let content_pages = book.content_page_count();
    if !warnings.is_empty() {
        warn!("Book {:?} compiled with {} degradation(s)", manifest.id, warnings.len());
    }
    let stats = CompilationStats {
        chapters: plan.chapters.len(),
        planned_pages,
        fallback_chapters,
        illustrated_pages,
        failed_illustrations,
        content_pages,
        pagination_duration_ms,
        illustration_duration_ms,
        compose_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        warnings,
    };

    info!(
        "Compilation complete: {} content page(s), {}/{} illustrated, {}ms total",
        content_pages, illustrated_pages, planned_pages, stats.total_duration_ms
    );
    if let Some(cb) = config.progress() {
        cb.on_compilation_complete(content_pages);
    }

    Ok(CompilationOutput {
        book,
        pages: final_plans,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChapterDraft;

    fn manifest(chapters: Vec<ChapterDraft>) -> BookManifest {
        BookManifest {
            id: "b1".into(),
            title: "T".into(),
            author: "A".into(),
            chapters,
        }
    }

    fn draft(n: u32, transcript: &str) -> ChapterDraft {
        ChapterDraft {
            chapter_number: n,
            transcript: Some(transcript.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn plan_allocates_by_length() {
        let m = manifest(vec![draft(1, &"a".repeat(1000)), draft(2, &"b".repeat(500))]);
        let plan = plan_book(&m, &CompilationConfig::default()).unwrap();
        assert_eq!(plan.budget, vec![20, 10]);
        assert_eq!(plan.total_pages(), 30);
    }

    #[test]
    fn book_without_text_is_rejected() {
        let m = manifest(vec![draft(1, "   ")]);
        let err = plan_book(&m, &CompilationConfig::default()).unwrap_err();
        assert!(matches!(err, StorybookError::NoChapters { ref book_id } if book_id == "b1"));
    }
}
