//! Progress-callback trait for compilation events.
//!
//! Inject an [`Arc<dyn CompilationProgressCallback>`] via
//! [`crate::config::CompilationConfigBuilder::progress_callback`] to receive
//! events as the pipeline paginates chapters and illustrates pages.
//!
//! The same hook carries job-state transitions: the pipeline never persists
//! job status itself, so a caller that stores status records does it from
//! [`CompilationProgressCallback::on_job_transition`].
//!
//! # Example
//!
//! ```rust
//! use storybook_press::{CompilationProgressCallback, CompilationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     illustrated: AtomicUsize,
//! }
//!
//! impl CompilationProgressCallback for CountingCallback {
//!     fn on_illustration_complete(&self, _index: usize, total: usize) {
//!         let done = self.illustrated.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total} illustrations");
//!     }
//! }
//!
//! let config = CompilationConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { illustrated: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::job::JobState;
use std::sync::Arc;

/// Called by the pipeline as it works through a book.
///
/// Implementations must be `Send + Sync`: illustration events fire from
/// concurrently running requests. All methods default to no-ops.
pub trait CompilationProgressCallback: Send + Sync {
    /// Called after every job status change, before work continues.
    fn on_job_transition(&self, job: &JobState) {
        let _ = job;
    }

    /// Called once per chapter after pagination.
    ///
    /// # Arguments
    /// * `chapter_number` — the chapter's ordinal
    /// * `pages`          — number of planned pages produced
    /// * `fell_back`      — `true` if the chapter became one whole-chapter page
    fn on_chapter_paginated(&self, chapter_number: u32, pages: usize, fell_back: bool) {
        let _ = (chapter_number, pages, fell_back);
    }

    /// Called once before the first illustration request.
    fn on_illustrations_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when one page's illustration was generated.
    fn on_illustration_complete(&self, index: usize, total_pages: usize) {
        let _ = (index, total_pages);
    }

    /// Called when one page's illustration failed; the page stays text-only.
    fn on_illustration_error(&self, index: usize, total_pages: usize, error: &str) {
        let _ = (index, total_pages, error);
    }

    /// Called once the PDF has been composed.
    fn on_compilation_complete(&self, content_pages: usize) {
        let _ = content_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CompilationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CompilationConfig`].
pub type ProgressCallback = Arc<dyn CompilationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        paginated: AtomicUsize,
        fallbacks: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl CompilationProgressCallback for TrackingCallback {
        fn on_chapter_paginated(&self, _chapter: u32, _pages: usize, fell_back: bool) {
            self.paginated.fetch_add(1, Ordering::SeqCst);
            if fell_back {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_illustration_complete(&self, _index: usize, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_illustration_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_transition(&JobState::new("b"));
        cb.on_chapter_paginated(1, 4, false);
        cb.on_illustrations_start(4);
        cb.on_illustration_complete(0, 4);
        cb.on_illustration_error(1, 4, "boom");
        cb.on_compilation_complete(5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_chapter_paginated(1, 3, false);
        tracker.on_chapter_paginated(2, 1, true);
        tracker.on_illustration_complete(0, 4);
        tracker.on_illustration_complete(1, 4);
        tracker.on_illustration_error(2, 4, "HTTP 500");

        assert_eq!(tracker.paginated.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fallbacks.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_illustrations_start(10);
        cb.on_illustration_complete(3, 10);
    }
}
