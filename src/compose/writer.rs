//! Serialise laid-out pages into PDF bytes with `pdf-writer`.
//!
//! All decisions have already been made by [`super::layout`]; this module
//! only turns positions into content-stream operators and allocates object
//! ids. The two fonts are referenced, not embedded, and each page image is
//! written once as an image XObject (with its soft mask, if any).

use crate::compose::embed::{PreparedImage, SampleColor, SampleFilter};
use crate::compose::layout::{Frame, LaidOutPage, PlacedText, PAGE_SIZE};
use crate::compose::metrics::Font;
use crate::error::StageError;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use qrcode::{Color, QrCode};
use std::collections::HashMap;
use tracing::{debug, warn};

const IMAGE_NAME: &[u8] = b"Im1";

type Rgb = (f32, f32, f32);
const COVER_PAPER: Rgb = (0.98, 0.95, 0.88);
const COVER_BAND: Rgb = (0.17, 0.23, 0.40);
const COVER_BAND_HEIGHT: f32 = 170.0;
const INK: Rgb = (0.12, 0.12, 0.16);
const FOOTER_INK: Rgb = (0.45, 0.45, 0.50);
const WHITE: Rgb = (1.0, 1.0, 1.0);
/// Quiet-zone width around the QR code, in modules.
const QR_QUIET: usize = 2;

/// Document-level metadata written to the info dictionary.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInfo<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub producer: &'a str,
    /// Target of the cover QR code.
    pub site_url: &'a str,
}

/// Write the cover and content pages.
///
/// `images[i]` holds the embeddable image for planned page `i`, if any.
/// A QR failure is recorded in `warnings` and the cover is written without it.
pub fn write_pdf(
    info: DocumentInfo<'_>,
    cover: &LaidOutPage,
    pages: &[LaidOutPage],
    images: &[Option<PreparedImage>],
    warnings: &mut Vec<StageError>,
) -> Vec<u8> {
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let page_tree_id = alloc.bump();
    let info_id = alloc.bump();
    let regular_id = alloc.bump();
    let bold_id = alloc.bump();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.document_info(info_id)
        .title(TextStr(info.title))
        .author(TextStr(info.author))
        .producer(TextStr(info.producer));
    for (id, font) in [(regular_id, Font::Regular), (bold_id, Font::Bold)] {
        pdf.type1_font(id)
            .base_font(Name(font.base_font()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    // One XObject per planned page image, shared by nothing else.
    let mut image_ids: HashMap<usize, Ref> = HashMap::new();
    for page in pages {
        let Some(slot) = page.image else { continue };
        let Some(Some(image)) = images.get(slot.plan_index) else {
            continue;
        };
        if image_ids.contains_key(&slot.plan_index) {
            continue;
        }
        let image_id = alloc.bump();
        let mask_id = image.soft_mask.as_ref().map(|_| alloc.bump());
        write_image(&mut pdf, image_id, mask_id, image);
        image_ids.insert(slot.plan_index, image_id);
    }

    let all_pages: Vec<&LaidOutPage> = std::iter::once(cover).chain(pages.iter()).collect();
    let page_ids: Vec<Ref> = all_pages.iter().map(|_| alloc.bump()).collect();
    pdf.pages(page_tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    for (page, &page_id) in all_pages.iter().zip(&page_ids) {
        let content_id = alloc.bump();
        let image_id = page
            .image
            .and_then(|slot| image_ids.get(&slot.plan_index).copied());

        let mut pdf_page = pdf.page(page_id);
        pdf_page.media_box(Rect::new(0.0, 0.0, PAGE_SIZE, PAGE_SIZE));
        pdf_page.parent(page_tree_id);
        pdf_page.contents(content_id);
        let mut resources = pdf_page.resources();
        resources
            .fonts()
            .pair(Name(Font::Regular.resource_name()), regular_id)
            .pair(Name(Font::Bold.resource_name()), bold_id);
        if let Some(id) = image_id {
            resources.x_objects().pair(Name(IMAGE_NAME), id);
        }
        resources.finish();
        pdf_page.finish();

        let mut content = Content::new();
        match page.qr {
            Some(qr_frame) => draw_cover(&mut content, page, qr_frame, info.site_url, warnings),
            None => draw_content_page(&mut content, page, image_id.is_some()),
        }
        pdf.stream(content_id, &content.finish());
    }

    let bytes = pdf.finish();
    debug!("PDF written: {} page(s), {} bytes", page_ids.len(), bytes.len());
    bytes
}

fn write_image(pdf: &mut Pdf, id: Ref, mask_id: Option<Ref>, image: &PreparedImage) {
    let mut xobject = pdf.image_xobject(id, &image.data);
    xobject.filter(match image.filter {
        SampleFilter::Dct => Filter::DctDecode,
        SampleFilter::Flate => Filter::FlateDecode,
    });
    xobject.width(image.width as i32);
    xobject.height(image.height as i32);
    match image.color {
        SampleColor::Gray => xobject.color_space().device_gray(),
        SampleColor::Rgb => xobject.color_space().device_rgb(),
    };
    xobject.bits_per_component(8);
    if let Some(mask_id) = mask_id {
        xobject.s_mask(mask_id);
    }
    xobject.finish();

    if let (Some(mask_id), Some(alpha)) = (mask_id, image.soft_mask.as_ref()) {
        let mut mask = pdf.image_xobject(mask_id, alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(image.width as i32);
        mask.height(image.height as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask.finish();
    }
}

fn fill_rect(content: &mut Content, (r, g, b): Rgb, frame: Frame) {
    content.set_fill_rgb(r, g, b);
    content.rect(frame.x, frame.y, frame.width, frame.height);
    content.fill_nonzero();
}

fn show_text(content: &mut Content, (r, g, b): Rgb, text: &PlacedText) {
    if text.encoded.is_empty() {
        return;
    }
    content.set_fill_rgb(r, g, b);
    content.begin_text();
    content.set_font(Name(text.font.resource_name()), text.size);
    content.next_line(text.x, text.y);
    content.show(Str(&text.encoded));
    content.end_text();
}

fn draw_content_page(content: &mut Content, page: &LaidOutPage, has_image: bool) {
    if let Some(label) = &page.label {
        show_text(content, FOOTER_INK, label);
    }
    if let (true, Some(slot)) = (has_image, page.image) {
        let f = slot.frame;
        content.save_state();
        content.transform([f.width, 0.0, 0.0, f.height, f.x, f.y]);
        content.x_object(Name(IMAGE_NAME));
        content.restore_state();
    }
    for line in &page.body {
        show_text(content, INK, line);
    }
    if let Some(footer) = &page.footer {
        show_text(content, FOOTER_INK, footer);
    }
    if let Some(sign_off) = &page.sign_off {
        show_text(content, INK, sign_off);
    }
}

fn draw_cover(
    content: &mut Content,
    page: &LaidOutPage,
    qr_frame: Frame,
    site_url: &str,
    warnings: &mut Vec<StageError>,
) {
    let full = |y: f32, height: f32| Frame {
        x: 0.0,
        y,
        width: PAGE_SIZE,
        height,
    };
    fill_rect(content, COVER_PAPER, full(0.0, PAGE_SIZE));
    fill_rect(content, COVER_BAND, full(0.0, COVER_BAND_HEIGHT));

    for line in &page.body {
        show_text(content, INK, line);
    }
    if let Some(branding) = &page.footer {
        show_text(content, WHITE, branding);
    }

    match QrCode::new(site_url.as_bytes()) {
        Ok(code) => draw_qr(content, &code, qr_frame),
        Err(e) => {
            warn!("QR code for {:?} failed, cover renders without it: {}", site_url, e);
            warnings.push(StageError::QrCodeFailed {
                detail: e.to_string(),
            });
        }
    }
}

/// Draw QR modules as filled squares over a white quiet zone.
fn draw_qr(content: &mut Content, code: &QrCode, frame: Frame) {
    let modules = code.width();
    let unit = frame.width / (modules + 2 * QR_QUIET) as f32;
    fill_rect(content, WHITE, frame);

    content.set_fill_rgb(INK.0, INK.1, INK.2);
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let (col, row) = (i % modules, i / modules);
        // QR rows run top-down; PDF y runs bottom-up.
        let x = frame.x + (col + QR_QUIET) as f32 * unit;
        let y = frame.y + frame.height - (row + QR_QUIET + 1) as f32 * unit;
        content.rect(x, y, unit, unit);
    }
    content.fill_nonzero();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::layout::{lay_out_content, lay_out_cover, BookMeta, ContentInput};
    use crate::model::{PagePlan, TextPlacement};

    const META: BookMeta<'static> = BookMeta {
        title: "Moon Fox",
        author: "Ada",
        site_name: "Storybook Press",
    };

    const INFO: DocumentInfo<'static> = DocumentInfo {
        title: "Moon Fox",
        author: "Ada",
        producer: "storybook-press",
        site_url: "https://storybook.press",
    };

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    fn plan(content: &str) -> PagePlan {
        PagePlan {
            chapter_number: 1,
            content: content.into(),
            illustration_prompt: "fox".into(),
            text_placement: TextPlacement::Bottom,
        }
    }

    #[test]
    fn writes_one_page_object_per_laid_out_page() {
        let plans = [plan("The fox ran home."), plan("Everyone slept.")];
        let inputs: Vec<_> = plans
            .iter()
            .map(|plan| ContentInput { plan, image_aspect: None })
            .collect();
        let mut warnings = Vec::new();
        let pages = lay_out_content(META, &inputs, &mut warnings);
        let pdf = write_pdf(INFO, &lay_out_cover(META), &pages, &[None, None], &mut warnings);

        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(count(&pdf, b"/Count 3"), 1);
        assert_eq!(count(&pdf, b"/Helvetica-Bold"), 1);
        assert_eq!(count(&pdf, b"/WinAnsiEncoding"), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn image_xobject_is_written_once_with_mask() {
        let plans = [plan("a b c")];
        let inputs = [ContentInput { plan: &plans[0], image_aspect: Some(1.0) }];
        let pages = lay_out_content(META, &inputs, &mut Vec::new());
        let image = PreparedImage {
            width: 2,
            height: 2,
            color: SampleColor::Rgb,
            filter: SampleFilter::Flate,
            data: vec![0; 4],
            soft_mask: Some(vec![0; 4]),
        };
        let pdf = write_pdf(INFO, &lay_out_cover(META), &pages, &[Some(image)], &mut Vec::new());
        assert_eq!(count(&pdf, b"/Subtype /Image"), 2);
        assert_eq!(count(&pdf, b"/SMask"), 1);
        assert_eq!(count(&pdf, b"/Im1 Do"), 1);
    }

    #[test]
    fn slot_without_prepared_image_draws_no_image() {
        let plans = [plan("a b c")];
        let inputs = [ContentInput { plan: &plans[0], image_aspect: Some(1.0) }];
        let pages = lay_out_content(META, &inputs, &mut Vec::new());
        let pdf = write_pdf(INFO, &lay_out_cover(META), &pages, &[None], &mut Vec::new());
        assert_eq!(count(&pdf, b"/Subtype /Image"), 0);
        assert_eq!(count(&pdf, b" Do"), 0);
    }

    #[test]
    fn oversized_qr_payload_is_skipped() {
        let url = format!("https://storybook.press/{}", "x".repeat(8000));
        let info = DocumentInfo {
            site_url: &url,
            ..INFO
        };
        let mut warnings = Vec::new();
        let pdf = write_pdf(info, &lay_out_cover(META), &[], &[], &mut warnings);
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(matches!(warnings[..], [StageError::QrCodeFailed { .. }]));
    }
}
