//! PDF compositor: cover, content pages, footers and overflow.
//!
//! ## Data Flow
//!
//! ```text
//! PageRenderData ──▶ embed ──▶ layout ──▶ writer ──▶ CompiledBook
//!                  (sniff,    (wrap,     (pdf-writer)
//!                   decode)    overflow)
//! ```
//!
//! 1. [`embed`]   — detect each image's format from its signature and prepare
//!    its samples; an image that cannot be prepared makes its page text-only
//! 2. [`layout`]  — place every line, image and footer in page coordinates;
//!    overflowing text spills onto continuation pages
//! 3. [`writer`]  — serialise the laid-out pages
//!
//! [`metrics`] holds the font widths and text encoding the layout measures with.
//!
//! Everything here is synchronous and CPU-bound; callers on an async runtime
//! run [`compose_book`] inside `spawn_blocking`.

pub mod embed;
pub mod layout;
pub mod metrics;
pub mod writer;

use crate::config::CompilationConfig;
use crate::error::{StageError, StorybookError};
use crate::model::{BookManifest, CompiledBook, PageRenderData};
use embed::{prepare_image, PreparedImage};
use layout::{lay_out_content, lay_out_cover, BookMeta, ContentInput, LaidOutPage};
use tracing::{info, warn};
use writer::{write_pdf, DocumentInfo};

/// Owned book-level strings, so composition can move to a blocking thread.
#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub title: String,
    pub author: String,
    pub site_name: String,
    pub site_url: String,
}

impl ComposeSettings {
    pub fn new(manifest: &BookManifest, config: &CompilationConfig) -> Self {
        Self {
            title: manifest.title.clone(),
            author: manifest.author.clone(),
            site_name: config.site_name.clone(),
            site_url: config.site_url.clone(),
        }
    }

    fn meta(&self) -> BookMeta<'_> {
        BookMeta {
            title: &self.title,
            author: &self.author,
            site_name: &self.site_name,
        }
    }
}

/// Lay out and write the whole book.
///
/// Page-scoped problems (an image that cannot be embedded, an unencodable
/// word, a QR failure) are pushed onto `warnings`. Only a book with nothing
/// to print fails.
pub fn compose_book(
    settings: &ComposeSettings,
    pages: &[PageRenderData],
    warnings: &mut Vec<StageError>,
) -> Result<CompiledBook, StorybookError> {
    if pages.is_empty() {
        return Err(StorybookError::PdfConstruction(
            "no pages to compose".to_string(),
        ));
    }

    let images: Vec<Option<PreparedImage>> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let bytes = page.image.as_deref()?;
            match prepare_image(bytes) {
                Ok(prepared) => Some(prepared),
                Err(e) => {
                    warn!("Page {}: image not embeddable, rendering text-only: {}", i + 1, e);
                    warnings.push(StageError::ImageEmbedFailed {
                        page: i + 1,
                        detail: e.to_string(),
                    });
                    None
                }
            }
        })
        .collect();

    let inputs: Vec<ContentInput<'_>> = pages
        .iter()
        .zip(&images)
        .map(|(page, image)| ContentInput {
            plan: &page.plan,
            image_aspect: image.as_ref().map(PreparedImage::aspect),
        })
        .collect();

    let meta = settings.meta();
    let cover = lay_out_cover(meta);
    let content: Vec<LaidOutPage> = lay_out_content(meta, &inputs, warnings);

    let info = DocumentInfo {
        title: &settings.title,
        author: &settings.author,
        producer: concat!("storybook-press ", env!("CARGO_PKG_VERSION")),
        site_url: &settings.site_url,
    };
    let pdf = write_pdf(info, &cover, &content, &images, warnings);
    if !pdf.starts_with(b"%PDF-") {
        return Err(StorybookError::PdfConstruction(
            "writer produced no PDF header".to_string(),
        ));
    }

    let summaries: Vec<_> = std::iter::once(&cover)
        .chain(content.iter())
        .map(LaidOutPage::summary)
        .collect();
    info!(
        "Composed {} content page(s) from {} planned page(s), {} bytes",
        content.len(),
        pages.len(),
        pdf.len()
    );
    Ok(CompiledBook {
        pdf,
        pages: summaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageKind, PagePlan, TextPlacement};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn settings() -> ComposeSettings {
        ComposeSettings {
            title: "Moon Fox".into(),
            author: "Ada".into(),
            site_name: "Storybook Press".into(),
            site_url: "https://storybook.press".into(),
        }
    }

    fn page(content: &str, image: Option<Vec<u8>>) -> PageRenderData {
        PageRenderData {
            plan: PagePlan {
                chapter_number: 1,
                content: content.into(),
                illustration_prompt: "fox".into(),
                text_placement: TextPlacement::Bottom,
            },
            image,
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 100, 50])))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn cover_then_content_pages_with_sign_off_last() {
        let pages = [page("One.", Some(png())), page("Two.", None)];
        let mut warnings = Vec::new();
        let book = compose_book(&settings(), &pages, &mut warnings).unwrap();

        assert!(book.pdf.starts_with(b"%PDF-"));
        assert_eq!(book.pages[0].kind, PageKind::Cover);
        assert_eq!(book.content_page_count(), 2);
        assert!(book.pages[1].has_image);
        assert!(!book.pages[2].has_image);
        assert!(book.pages[1].sign_off.is_none());
        assert_eq!(book.pages[2].sign_off.as_deref(), Some("Written by Ada"));
        assert!(book.pages[1..].iter().all(|p| p.footer.is_some()));
        assert!(warnings.is_empty());
    }

    #[test]
    fn undecodable_image_renders_text_only() {
        let pages = [page("Still here.", Some(b"<html>oops</html>".to_vec()))];
        let mut warnings = Vec::new();
        let book = compose_book(&settings(), &pages, &mut warnings).unwrap();

        assert!(!book.pages[1].has_image);
        assert_eq!(book.text_for_plan(0), "Still here.");
        assert!(matches!(
            warnings[..],
            [StageError::ImageEmbedFailed { page: 1, .. }]
        ));
    }

    #[test]
    fn overflow_keeps_all_text() {
        let long = (0..500).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let pages = [page(&long, Some(png())), page("End.", None)];
        let book = compose_book(&settings(), &pages, &mut Vec::new()).unwrap();

        assert!(book.content_page_count() > 2);
        assert_eq!(book.text_for_plan(0), long);
        assert_eq!(book.text_for_plan(1), "End.");
        assert!(book.pages.last().unwrap().sign_off.is_some());
    }

    #[test]
    fn nothing_to_print_is_fatal() {
        let err = compose_book(&settings(), &[], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, StorybookError::PdfConstruction(_)));
    }
}
