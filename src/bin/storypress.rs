//! CLI binary for storybook-press.
//!
//! A thin shim over the library crate: maps CLI flags to
//! `CompilationConfig`, runs one job per book in the manifest, and writes
//! each finished PDF into the output directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storybook_press::services::sink::DirectorySink;
use storybook_press::services::source::ManifestFileSource;
use storybook_press::{
    plan_book, run_job, CompilationConfig, CompilationProgressCallback, JobState, JobStatus,
    ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while chapters are paginated, then a bar over page illustrations.
/// Illustration events arrive out of order; the bar only counts them.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }
}

impl CompilationProgressCallback for CliProgressCallback {
    fn on_job_transition(&self, job: &JobState) {
        let mark = match job.status {
            JobStatus::Complete => green("✔"),
            JobStatus::Failed => red("✘"),
            _ => cyan("◆"),
        };
        self.bar.println(format!(
            "{} {} {}",
            mark,
            bold(&job.book_id),
            dim(&job.status.to_string())
        ));
        if job.status == JobStatus::Generating {
            self.bar.set_prefix("Writing");
            self.bar.set_message("character bible…");
        }
    }

    fn on_chapter_paginated(&self, chapter_number: u32, pages: usize, fell_back: bool) {
        let note = if fell_back {
            red(" (fallback: whole chapter on one page)")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} Chapter {:>2}  {}{}",
            green("✓"),
            chapter_number,
            dim(&format!("{pages} page(s)")),
            note
        ));
        self.bar.set_prefix("Paginating");
        self.bar.set_message(format!("after chapter {chapter_number}"));
    }

    fn on_illustrations_start(&self, total_pages: usize) {
        self.failed.store(0, Ordering::SeqCst);
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Illustrating");
        self.bar.reset_eta();
    }

    fn on_illustration_complete(&self, _index: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_illustration_error(&self, index: usize, total_pages: usize, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total_pages,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_compilation_complete(&self, content_pages: usize) {
        let failed = self.failed.load(Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {} content page(s){}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&content_pages.to_string()),
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} text-only)", red(&failed.to_string()))
            }
        ));
        self.bar.set_prefix("Publishing");
        self.bar.set_message("");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compile every book in a manifest into ./out
  storypress books.json -o out

  # One book, a smaller page cap, gentler on the image API
  storypress books.json --book b-42 --max-pages 20 --concurrency 2

  # A different look
  storypress books.json --art-style "crayon drawing, bold outlines"

  # See the page budget without calling any model
  storypress --plan-only books.json

MANIFEST FORMAT (one book or an array of books):
  {
    "id": "b-42", "title": "The Sleepy Fox", "author": "Grandpa Joe",
    "chapters": [
      { "chapter_number": 1,
        "rewrites": [{ "text": "...", "created_at": "2024-05-01T20:00:00Z" }],
        "cleaned_transcript": "...", "transcript": "..." }
    ]
  }

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI key (images; text when no other provider is set)
  OPENAI_BASE_URL         OpenAI-compatible images endpoint
  ANTHROPIC_API_KEY       Anthropic key (text)
  EDGEQUAKE_LLM_PROVIDER  Override text provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override text model ID
"#;

/// Compile recorded bedtime stories into illustrated picture-book PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "storypress",
    version,
    about = "Compile recorded bedtime stories into illustrated picture-book PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON manifest holding one book or an array of books.
    manifest: PathBuf,

    /// Compile only this book id (default: every book in the manifest).
    #[arg(long, env = "STORYPRESS_BOOK")]
    book: Option<String>,

    /// Directory the finished PDFs are written to.
    #[arg(short, long, env = "STORYPRESS_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Hours a publication link stays valid.
    #[arg(long, env = "STORYPRESS_LINK_TTL_HOURS", default_value_t = 7 * 24)]
    link_ttl_hours: i64,

    /// Global page cap across all chapters.
    #[arg(long, env = "STORYPRESS_MAX_PAGES", default_value_t = 30)]
    max_pages: usize,

    /// Image requests in flight at once.
    #[arg(short, long, env = "STORYPRESS_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Free-text art style shared by every illustration.
    #[arg(long, env = "STORYPRESS_ART_STYLE")]
    art_style: Option<String>,

    /// Image model ID.
    #[arg(long, env = "STORYPRESS_IMAGE_MODEL", default_value = "gpt-image-1")]
    image_model: String,

    /// Text model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Text provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Print resolved chapters and page budget only; no model calls.
    #[arg(long)]
    plan_only: bool,

    /// Print results as JSON.
    #[arg(long, env = "STORYPRESS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "STORYPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STORYPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STORYPRESS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would only
    // tear it apart.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let source = ManifestFileSource::new(&cli.manifest);
    let books = source
        .load_all()
        .await
        .with_context(|| format!("Failed to read manifest {:?}", cli.manifest))?;
    let books: Vec<_> = books
        .into_iter()
        .filter(|b| cli.book.as_ref().map_or(true, |id| &b.id == id))
        .collect();
    if books.is_empty() {
        match &cli.book {
            Some(id) => bail!("Book {:?} not found in {:?}", id, cli.manifest),
            None => bail!("Manifest {:?} holds no books", cli.manifest),
        }
    }

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn CompilationProgressCallback>);
    let config = build_config(&cli, progress)?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        for book in &books {
            let plan = plan_book(book, &config)
                .with_context(|| format!("Failed to plan book {:?}", book.id))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
                );
                continue;
            }
            println!("Book:      {} ({})", book.title, book.id);
            println!("Author:    {}", book.author);
            for (chapter, pages) in plan.chapters.iter().zip(&plan.budget) {
                println!(
                    "  Chapter {:>2}  {:>6} chars  →  {:>2} pages",
                    chapter.chapter_number,
                    chapter.char_len(),
                    pages
                );
            }
            println!("Total:     {} pages (cap {})", plan.total_pages(), config.max_pages);
        }
        return Ok(());
    }

    // ── Run jobs ─────────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cli.output)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", cli.output))?;
    let sink = DirectorySink::new(&cli.output)
        .with_link_ttl(chrono::Duration::hours(cli.link_ttl_hours));

    let mut jobs = Vec::with_capacity(books.len());
    for book in &books {
        let job = run_job(JobState::new(&book.id), &source, &sink, &config).await;
        if !cli.quiet && !cli.json && !show_progress {
            match job.status {
                JobStatus::Complete => eprintln!(
                    "{} {}  →  {}",
                    green("✔"),
                    book.id,
                    job.publication
                        .as_ref()
                        .map_or_else(String::new, |p| p.location.clone())
                ),
                _ => eprintln!(
                    "{} {}  {}",
                    red("✘"),
                    book.id,
                    job.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        jobs.push(job);
    }
    if let Some(cb) = &cli_progress {
        cb.bar.finish_and_clear();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&jobs).context("Failed to serialise job states")?
        );
    } else if !cli.quiet && show_progress {
        for job in &jobs {
            if let Some(p) = &job.publication {
                eprintln!("   {}  →  {}", bold(&job.book_id), p.location);
            }
        }
    }

    let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count();
    if failed > 0 {
        bail!("{failed} of {} book(s) failed", jobs.len());
    }
    Ok(())
}

/// Map CLI args to `CompilationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CompilationConfig> {
    let mut builder = CompilationConfig::builder()
        .max_pages(cli.max_pages)
        .concurrency(cli.concurrency)
        .image_model(&cli.image_model);

    if let Some(ref style) = cli.art_style {
        builder = builder.art_style(style);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
