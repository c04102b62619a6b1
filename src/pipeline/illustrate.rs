//! Page illustration with a hard bound on concurrent image requests.
//!
//! Every page future is created up front and driven together, but each one
//! must hold a permit from a [`Semaphore`] with `concurrency` permits while
//! its image request is outstanding. The bound is therefore structural: no
//! more than `concurrency` requests can exist at once, whatever the page
//! count. Results are collected with `join_all`, which keeps input order
//! regardless of which request finishes first.
//!
//! A failed page keeps its planned placement and renders text-only; it never
//! affects any other page.

use crate::config::CompilationConfig;
use crate::error::{ServiceError, StageError};
use crate::model::{PagePlan, PageRenderData};
use crate::pipeline::bible::VisualAnchor;
use crate::pipeline::placement::place_text;
use crate::prompts::page_illustration_prompt;
use crate::services::{ImageGenerator, ImageRequest};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Pages with their images, plus what went wrong along the way.
#[derive(Debug, Clone)]
pub struct IllustrationOutcome {
    pub pages: Vec<PageRenderData>,
    /// One entry per page left without an image.
    pub failures: Vec<StageError>,
    /// Pages that kept their image but fell back to the default placement.
    pub placement_warnings: Vec<StageError>,
}

/// Illustrate every page, at most `config.concurrency` requests at a time.
pub async fn illustrate_pages(
    generator: &dyn ImageGenerator,
    plans: Vec<PagePlan>,
    anchor: &VisualAnchor,
    config: &CompilationConfig,
) -> IllustrationOutcome {
    let total = plans.len();
    let semaphore = Semaphore::new(config.concurrency.max(1));
    info!(
        "Illustrating {} page(s), {} at a time",
        total, config.concurrency
    );
    if let Some(cb) = config.progress() {
        cb.on_illustrations_start(total);
    }

    let tasks = plans.into_iter().enumerate().map(|(index, plan)| {
        let semaphore = &semaphore;
        async move {
            let result = illustrate_one(generator, semaphore, index, plan, anchor, config).await;
            if let Some(cb) = config.progress() {
                match &result.1 {
                    None => cb.on_illustration_complete(index, total),
                    Some(e) => cb.on_illustration_error(index, total, &e.to_string()),
                }
            }
            result
        }
    });

    let mut pages = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut placement_warnings = Vec::new();
    for (page, failure, note) in join_all(tasks).await {
        pages.push(page);
        failures.extend(failure);
        placement_warnings.extend(note);
    }

    info!(
        "Illustrations done: {}/{} succeeded",
        total - failures.len(),
        total
    );
    IllustrationOutcome {
        pages,
        failures,
        placement_warnings,
    }
}

/// What happened to one page: its render data, the illustration failure
/// (image absent) and a placement note (image present, analysis failed).
type PageOutcome = (PageRenderData, Option<StageError>, Option<StageError>);

async fn illustrate_one(
    generator: &dyn ImageGenerator,
    semaphore: &Semaphore,
    index: usize,
    mut plan: PagePlan,
    anchor: &VisualAnchor,
    config: &CompilationConfig,
) -> PageOutcome {
    let page = index + 1;
    let prompt = page_illustration_prompt(&plan.illustration_prompt, plan.chapter_number);
    let request = ImageRequest {
        prompt: &prompt,
        style: &config.art_style,
        model: &config.image_model,
        size: &config.image_size,
        character_bible: anchor.bible(),
        reference_image: anchor.reference_image.as_deref(),
    };

    let generated = match semaphore.acquire().await {
        Ok(_permit) => generator.generate(request).await,
        Err(e) => Err(ServiceError::Request(format!("semaphore closed: {e}"))),
    };

    let bytes = match generated {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "Page {} (chapter {}): illustration failed, page will be text-only: {}",
                page, plan.chapter_number, e
            );
            let failure = StageError::IllustrationFailed {
                page,
                chapter: plan.chapter_number,
                detail: e.to_string(),
            };
            return (PageRenderData { plan, image: None }, Some(failure), None);
        }
    };

    // Decoding a full-size image is CPU work; keep it off the async workers.
    let analysed = tokio::task::spawn_blocking(move || (place_text(&bytes), bytes)).await;
    let ((placement, analysis_error), bytes) = match analysed {
        Ok(pair) => pair,
        Err(e) => {
            // The task owned the bytes; without them the page is text-only.
            warn!("Page {}: placement task panicked: {}", page, e);
            let failure = StageError::IllustrationFailed {
                page,
                chapter: plan.chapter_number,
                detail: format!("placement task panicked: {e}"),
            };
            return (PageRenderData { plan, image: None }, Some(failure), None);
        }
    };

    plan.text_placement = placement;
    debug!("Page {}: {} bytes → text {}", page, bytes.len(), placement);
    let note = analysis_error.map(|e| StageError::PlacementFailed {
        page,
        detail: e.to_string(),
    });

    (
        PageRenderData {
            plan,
            image: Some(bytes),
        },
        None,
        note,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextPlacement;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the prompt back as the "image"; fails on prompts containing "FAIL".
    #[derive(Default)]
    struct Echo {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageGenerator for Echo {
        async fn generate(&self, request: ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            // Later calls finish sooner, so completion order differs from page order.
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(2 * n as u64) + 1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if request.prompt.contains("FAIL") {
                Err(ServiceError::Request("HTTP 500".into()))
            } else {
                Ok(request.prompt.as_bytes().to_vec())
            }
        }
    }

    fn plans(n: usize) -> Vec<PagePlan> {
        (0..n)
            .map(|i| PagePlan {
                chapter_number: 1,
                content: format!("page {i}"),
                illustration_prompt: format!("scene {i}"),
                text_placement: TextPlacement::Bottom,
            })
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_and_keeps_order() {
        let echo = Echo::default();
        let config = CompilationConfig::builder().concurrency(3).build().unwrap();

        let outcome = illustrate_pages(&echo, plans(11), &VisualAnchor::default(), &config).await;

        assert_eq!(echo.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.pages.len(), 11);
        for (i, page) in outcome.pages.iter().enumerate() {
            assert_eq!(page.plan.content, format!("page {i}"));
            let image = String::from_utf8(page.image.clone().unwrap()).unwrap();
            assert!(image.contains(&format!("scene {i}")), "page {i} got {image}");
        }
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_others() {
        let echo = Echo::default();
        let config = CompilationConfig::builder().concurrency(2).build().unwrap();
        let mut plans = plans(5);
        plans[2].illustration_prompt = "FAIL here".into();
        plans[2].text_placement = TextPlacement::Top;

        let outcome = illustrate_pages(&echo, plans, &VisualAnchor::default(), &config).await;

        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            outcome.failures[0],
            StageError::IllustrationFailed { page: 3, chapter: 1, .. }
        ));
        assert!(outcome.pages[2].image.is_none());
        assert_eq!(outcome.pages[2].plan.text_placement, TextPlacement::Top);
        assert_eq!(outcome.pages.iter().filter(|p| p.image.is_some()).count(), 4);
    }

    #[tokio::test]
    async fn undecodable_image_defaults_placement_to_bottom() {
        let echo = Echo::default();
        let config = CompilationConfig::default();
        let mut plans = plans(1);
        plans[0].text_placement = TextPlacement::Top;

        let outcome = illustrate_pages(&echo, plans, &VisualAnchor::default(), &config).await;
        assert_eq!(outcome.pages[0].plan.text_placement, TextPlacement::Bottom);
        assert!(outcome.pages[0].image.is_some());
        assert!(outcome.failures.is_empty());
        assert!(matches!(
            outcome.placement_warnings[..],
            [StageError::PlacementFailed { page: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn anchor_is_forwarded() {
        struct Check;
        #[async_trait]
        impl ImageGenerator for Check {
            async fn generate(&self, request: ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
                assert_eq!(request.character_bible, Some("Pip: grey mouse"));
                assert_eq!(request.reference_image, Some(&[9u8, 9][..]));
                assert!(request.prompt.contains("chapter 1"));
                Ok(Vec::new())
            }
        }
        let anchor = VisualAnchor {
            character_bible: "Pip: grey mouse".into(),
            reference_image: Some(vec![9, 9]),
        };
        let outcome =
            illustrate_pages(&Check, plans(2), &anchor, &CompilationConfig::default()).await;
        assert!(outcome.failures.is_empty());
    }
}
