//! # storybook-press
//!
//! Compile recorded bedtime stories into illustrated picture-book PDFs.
//!
//! ## Why this crate?
//!
//! A transcript is arbitrary-length prose spread over a few chapters; a
//! picture book is a fixed number of pages, each with a sentence or two and
//! a picture. Getting from one to the other means deciding how many pages
//! each chapter earns, splitting the text without losing a word, keeping the
//! characters recognisable from picture to picture, and putting the text
//! where it does not fight the image. This crate does all of that and
//! treats every AI model as an untrusted function behind a validation
//! contract.
//!
//! ## Pipeline Overview
//!
//! ```text
//! BookManifest
//!  │
//!  ├─ 1. Resolve     best text variant per chapter
//!  ├─ 2. Budget      pages per chapter under a global cap
//!  ├─ 3. Bible       character bible + reference image (best effort)
//!  ├─ 4. Paginate    text model splits each chapter; content must survive verbatim
//!  ├─ 5. Illustrate  one image per page, at most K requests in flight
//!  ├─ 6. Placement   text goes over the quieter band of each image
//!  └─ 7. Compose     cover + content pages + footers + overflow → PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storybook_press::{compile_book, BookManifest, CompilationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Text provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …;
//!     // images use OPENAI_API_KEY.
//!     let manifest: BookManifest = serde_json::from_str(&std::fs::read_to_string("book.json")?)?;
//!     let config = CompilationConfig::default();
//!     let output = compile_book(&manifest, &config).await?;
//!     std::fs::write("book.pdf", &output.book.pdf)?;
//!     eprintln!(
//!         "{} pages, {} illustrated, {} warning(s)",
//!         output.stats.content_pages,
//!         output.stats.illustrated_pages,
//!         output.stats.warnings.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Jobs
//!
//! [`run_job`] wraps compilation in an explicit [`JobState`] value
//! (`pending → generating → complete | failed`): it loads the book from a
//! [`ChapterSource`], compiles it and hands the PDF to a [`PublicationSink`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `storypress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! storybook-press = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compile;
pub mod compose;
pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compile::{compile_book, compile_with, plan_book, BookPlan};
pub use config::{CompilationConfig, CompilationConfigBuilder};
pub use error::{ServiceError, StageError, StorybookError};
pub use job::{run_job, run_job_with, JobState, JobStatus};
pub use model::{
    BookManifest, ChapterDraft, ChapterText, CompilationOutput, CompilationStats, CompiledBook,
    PageKind, PagePlan, PageRenderData, PageSummary, Rewrite, TextPlacement,
};
pub use progress::{CompilationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use services::{
    ChapterSource, ImageGenerator, ImageRequest, Publication, PublicationSink, TextGenerator,
    TextRequest,
};
