//! Configuration types for book compilation.
//!
//! All compilation behaviour is controlled through [`CompilationConfig`],
//! built via its [`CompilationConfigBuilder`]. Keeping every knob in one
//! struct makes it trivial to share configs across concurrent illustration
//! requests and to log exactly what a run was configured with.

use crate::error::StorybookError;
use crate::progress::ProgressCallback;
use crate::services::{ImageGenerator, TextGenerator};
use std::fmt;
use std::sync::Arc;

/// Default art style handed to every image request.
pub const DEFAULT_ART_STYLE: &str = "soft watercolor children's picture-book illustration, \
warm pastel palette, gentle lighting, rounded friendly shapes, no text or lettering";

/// Configuration for compiling one illustrated book.
///
/// # Example
/// ```rust
/// use storybook_press::CompilationConfig;
///
/// let config = CompilationConfig::builder()
///     .max_pages(24)
///     .concurrency(4)
///     .art_style("pencil sketch")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 24);
/// ```
#[derive(Clone)]
pub struct CompilationConfig {
    /// Global page cap across all chapters. Default: 30.
    pub max_pages: usize,

    /// Minimum pages any chapter receives. Default: 2.
    ///
    /// The cap can be exceeded when `chapters × min_pages_per_chapter`
    /// is larger than `max_pages`; the floor wins.
    pub min_pages_per_chapter: usize,

    /// Maximum number of image requests in flight at once. Default: 5.
    pub concurrency: usize,

    /// Free-text art style descriptor shared by every illustration.
    pub art_style: String,

    /// Image model identifier. Default: "gpt-image-1".
    pub image_model: String,

    /// Requested image size. Default: "1024x1024".
    pub image_size: String,

    /// Text model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed text generator. Takes precedence over `provider_name`.
    pub text_generator: Option<Arc<dyn TextGenerator>>,

    /// Pre-constructed image generator. Takes precedence over the environment.
    pub image_generator: Option<Arc<dyn ImageGenerator>>,

    /// Sampling temperature for text generation. Default: 0.3.
    ///
    /// Pagination must reproduce the source verbatim; low temperature keeps
    /// the model from paraphrasing.
    pub temperature: f32,

    /// Maximum tokens per text-generation call. Default: 4096.
    pub max_tokens: usize,

    /// Transport-level retries per text-generation call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for text and image services in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Characters of chapter text used as the illustration prompt when
    /// pagination falls back to a single page. Default: 200.
    pub fallback_prompt_chars: usize,

    /// Site name printed in the footer of every content page.
    pub site_name: String,

    /// Site URL encoded in the cover QR code.
    pub site_url: String,

    /// A `generating` job older than this is considered abandoned. Default: 1800.
    pub stale_after_secs: u64,

    /// Receives per-chapter, per-page, and job-transition events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            max_pages: 30,
            min_pages_per_chapter: 2,
            concurrency: 5,
            art_style: DEFAULT_ART_STYLE.to_string(),
            image_model: "gpt-image-1".to_string(),
            image_size: "1024x1024".to_string(),
            model: None,
            provider_name: None,
            text_generator: None,
            image_generator: None,
            temperature: 0.3,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            fallback_prompt_chars: 200,
            site_name: "Storybook Press".to_string(),
            site_url: "https://storybook.press".to_string(),
            stale_after_secs: 1800,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CompilationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationConfig")
            .field("max_pages", &self.max_pages)
            .field("min_pages_per_chapter", &self.min_pages_per_chapter)
            .field("concurrency", &self.concurrency)
            .field("art_style", &self.art_style)
            .field("image_model", &self.image_model)
            .field("image_size", &self.image_size)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("text_generator", &self.text_generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("image_generator", &self.image_generator.as_ref().map(|_| "<dyn ImageGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("site_url", &self.site_url)
            .finish()
    }
}

impl CompilationConfig {
    /// Create a new builder for `CompilationConfig`.
    pub fn builder() -> CompilationConfigBuilder {
        CompilationConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn progress(&self) -> Option<&ProgressCallback> {
        self.progress_callback.as_ref()
    }
}

/// Builder for [`CompilationConfig`].
#[derive(Debug)]
pub struct CompilationConfigBuilder {
    config: CompilationConfig,
}

impl CompilationConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn min_pages_per_chapter(mut self, n: usize) -> Self {
        self.config.min_pages_per_chapter = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn art_style(mut self, style: impl Into<String>) -> Self {
        self.config.art_style = style.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn image_size(mut self, size: impl Into<String>) -> Self {
        self.config.image_size = size.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.text_generator = Some(generator);
        self
    }

    pub fn image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.config.image_generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn fallback_prompt_chars(mut self, n: usize) -> Self {
        self.config.fallback_prompt_chars = n;
        self
    }

    pub fn site_name(mut self, name: impl Into<String>) -> Self {
        self.config.site_name = name.into();
        self
    }

    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.config.site_url = url.into();
        self
    }

    pub fn stale_after_secs(mut self, secs: u64) -> Self {
        self.config.stale_after_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CompilationConfig, StorybookError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(StorybookError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if c.min_pages_per_chapter == 0 {
            return Err(StorybookError::InvalidConfig(
                "min_pages_per_chapter must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(StorybookError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(StorybookError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.fallback_prompt_chars == 0 {
            return Err(StorybookError::InvalidConfig(
                "fallback_prompt_chars must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
