//! Page layout: the geometry of every page, computed before any PDF bytes exist.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner of a
//! square page. Body text is wrapped against the AFM widths in
//! [`super::metrics`]; a page takes as many lines as fit above the bottom
//! margin and the rest spills onto continuation pages, so nothing is ever
//! clipped.
//!
//! ## Content page
//!
//! ```text
//!  ┌───────────────────────────┐
//!  │         Chapter 2         │  label
//!  │   ┌───────────────────┐   │
//!  │   │       image       │   │  placement = bottom
//!  │   └───────────────────┘   │
//!  │  body text …              │
//!  │     SITE · TITLE          │  footer
//!  └───────────────────────────┘
//! ```
//!
//! With placement `top` the body follows the label and the image sits above
//! the footer. Pages without an image, and all continuation pages, are
//! text-only from the top.

use crate::compose::metrics::{encode, encode_lossy, text_width, Font};
use crate::error::StageError;
use crate::model::{PageKind, PagePlan, PageSummary, TextPlacement};
use tracing::warn;

pub const PAGE_SIZE: f32 = 612.0;
pub const MARGIN: f32 = 48.0;
pub const CONTENT_WIDTH: f32 = PAGE_SIZE - 2.0 * MARGIN;

pub const BODY_SIZE: f32 = 16.0;
pub const BODY_LEADING: f32 = 22.0;
pub const IMAGE_HEIGHT: f32 = 300.0;
const LABEL_SIZE: f32 = 11.0;
const BLOCK_GAP: f32 = 16.0;
const FOOTER_SIZE: f32 = 8.0;
const FOOTER_BASELINE: f32 = 20.0;
const SIGN_OFF_SIZE: f32 = 10.0;
const SIGN_OFF_BASELINE: f32 = 34.0;

const TITLE_SIZE: f32 = 34.0;
const TITLE_LEADING: f32 = 40.0;
const TITLE_TOP_BASELINE: f32 = 430.0;
const BYLINE_SIZE: f32 = 16.0;
const BRANDING_SIZE: f32 = 9.0;
pub const QR_SIZE: f32 = 72.0;

/// One run of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub font: Font,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub text: String,
    /// WinAnsi bytes of `text`.
    pub encoded: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where a page image goes, and which planned page's image it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSlot {
    pub plan_index: usize,
    pub frame: Frame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutPage {
    pub kind: PageKind,
    pub label: Option<PlacedText>,
    pub image: Option<ImageSlot>,
    pub body: Vec<PlacedText>,
    pub footer: Option<PlacedText>,
    pub sign_off: Option<PlacedText>,
    /// Cover only: square reserved for the site QR code.
    pub qr: Option<Frame>,
}

impl LaidOutPage {
    pub fn summary(&self) -> PageSummary {
        PageSummary {
            kind: self.kind.clone(),
            has_image: self.image.is_some(),
            lines: self.body.iter().map(|l| l.text.clone()).collect(),
            footer: self.footer.as_ref().map(|f| f.text.clone()),
            sign_off: self.sign_off.as_ref().map(|s| s.text.clone()),
        }
    }
}

/// Book-level strings shared by the cover and every footer.
#[derive(Debug, Clone, Copy)]
pub struct BookMeta<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub site_name: &'a str,
}

/// One planned page and, if its image could be embedded, that image's
/// width / height ratio.
#[derive(Debug, Clone, Copy)]
pub struct ContentInput<'a> {
    pub plan: &'a PagePlan,
    pub image_aspect: Option<f32>,
}

// ── Word wrap ────────────────────────────────────────────────────────────────

struct Word<'a> {
    text: &'a str,
    encoded: Vec<u8>,
}

/// Greedy wrap into lines no wider than `max_width`. A word wider than the
/// line is hard-broken at character boundaries; its last piece starts the
/// next line.
fn wrap(words: &[Word<'_>], font: Font, size: f32, max_width: f32) -> Vec<(String, Vec<u8>)> {
    let space = text_width(font, b" ", size);
    let mut lines = Vec::new();
    let mut text = String::new();
    let mut encoded = Vec::new();
    let mut width = 0.0f32;

    for word in words {
        let w = text_width(font, &word.encoded, size);
        if w > max_width {
            if !text.is_empty() {
                lines.push((std::mem::take(&mut text), std::mem::take(&mut encoded)));
            }
            let mut pieces = break_word(word, font, size, max_width);
            if let Some(last) = pieces.pop() {
                lines.extend(pieces.into_iter().map(|p| (p.text.to_string(), p.encoded)));
                width = text_width(font, &last.encoded, size);
                text.push_str(last.text);
                encoded = last.encoded;
            }
            continue;
        }
        if !text.is_empty() && width + space + w > max_width {
            lines.push((std::mem::take(&mut text), std::mem::take(&mut encoded)));
            width = 0.0;
        }
        if !text.is_empty() {
            text.push(' ');
            encoded.push(b' ');
            width += space;
        }
        text.push_str(word.text);
        encoded.extend_from_slice(&word.encoded);
        width += w;
    }
    if !text.is_empty() {
        lines.push((text, encoded));
    }
    lines
}

/// Cut an over-wide word into pieces no wider than `max_width`, each at
/// least one character long.
fn break_word<'a>(word: &Word<'a>, font: Font, size: f32, max_width: f32) -> Vec<Word<'a>> {
    let text: &'a str = word.text;
    let mut pieces = Vec::new();
    let (mut start, mut first, mut width) = (0usize, 0usize, 0.0f32);
    // WinAnsi is one byte per character, so `n` indexes both.
    for (n, ((at, _), &code)) in text.char_indices().zip(&word.encoded).enumerate() {
        let glyph = text_width(font, &[code], size);
        if n > first && width + glyph > max_width {
            pieces.push(Word {
                text: &text[start..at],
                encoded: word.encoded[first..n].to_vec(),
            });
            start = at;
            first = n;
            width = 0.0;
        }
        width += glyph;
    }
    pieces.push(Word {
        text: &text[start..],
        encoded: word.encoded[first..].to_vec(),
    });
    pieces
}

/// Split into encodable words; unencodable words are reported and dropped.
fn body_words<'a>(content: &'a str, page: usize, warnings: &mut Vec<StageError>) -> Vec<Word<'a>> {
    content
        .split_whitespace()
        .filter_map(|text| match encode(text) {
            Some(encoded) => Some(Word { text, encoded }),
            None => {
                warn!("Page {}: skipping word {:?} (no glyph in the page font)", page, text);
                warnings.push(StageError::WordSkipped {
                    page,
                    word: text.to_string(),
                });
                None
            }
        })
        .collect()
}

fn centred(font: Font, size: f32, y: f32, text: String, encoded: Vec<u8>) -> PlacedText {
    let x = (PAGE_SIZE - text_width(font, &encoded, size)) / 2.0;
    PlacedText {
        font,
        size,
        x,
        y,
        text,
        encoded,
    }
}

fn centred_lossy(font: Font, size: f32, y: f32, text: &str) -> PlacedText {
    let (text, encoded) = encode_lossy(text);
    centred(font, size, y, text, encoded)
}

// ── Vertical geometry ────────────────────────────────────────────────────────

fn label_baseline() -> f32 {
    PAGE_SIZE - MARGIN - LABEL_SIZE
}

fn content_top() -> f32 {
    label_baseline() - BLOCK_GAP
}

/// Baselines for a text block between `top` and `bottom`.
fn baselines(top: f32, bottom: f32) -> impl Iterator<Item = f32> {
    let first = top - BODY_SIZE;
    (0..)
        .map(move |i| first - i as f32 * BODY_LEADING)
        .take_while(move |y| *y >= bottom)
}

/// Image frame inside the fixed-height box whose bottom edge is `box_bottom`.
fn image_frame(aspect: f32, box_bottom: f32) -> Frame {
    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let mut height = IMAGE_HEIGHT;
    let mut width = height * aspect;
    if width > CONTENT_WIDTH {
        width = CONTENT_WIDTH;
        height = width / aspect;
    }
    Frame {
        x: (PAGE_SIZE - width) / 2.0,
        y: box_bottom + (IMAGE_HEIGHT - height) / 2.0,
        width,
        height,
    }
}

/// Image frame and the text band left over, for the first page of a plan.
fn first_page_regions(
    placement: TextPlacement,
    aspect: Option<f32>,
) -> (Option<Frame>, f32, f32) {
    match (aspect, placement) {
        (None, _) => (None, content_top(), MARGIN),
        (Some(a), TextPlacement::Bottom) => {
            let box_bottom = content_top() - IMAGE_HEIGHT;
            (Some(image_frame(a, box_bottom)), box_bottom - BLOCK_GAP, MARGIN)
        }
        (Some(a), TextPlacement::Top) => {
            let box_bottom = MARGIN;
            (
                Some(image_frame(a, box_bottom)),
                content_top(),
                box_bottom + IMAGE_HEIGHT + BLOCK_GAP,
            )
        }
    }
}

// ── Pages ────────────────────────────────────────────────────────────────────

/// Lay out the cover page.
pub fn lay_out_cover(meta: BookMeta<'_>) -> LaidOutPage {
    let (title, _) = encode_lossy(meta.title);
    let words: Vec<Word<'_>> = title
        .split_whitespace()
        .map(|w| Word {
            text: w,
            encoded: encode_lossy(w).1,
        })
        .collect();

    let mut body: Vec<PlacedText> = wrap(&words, Font::Bold, TITLE_SIZE, CONTENT_WIDTH)
        .into_iter()
        .enumerate()
        .map(|(i, (text, encoded))| {
            centred(
                Font::Bold,
                TITLE_SIZE,
                TITLE_TOP_BASELINE - i as f32 * TITLE_LEADING,
                text,
                encoded,
            )
        })
        .collect();

    let byline_y = body.last().map_or(TITLE_TOP_BASELINE, |l| l.y) - TITLE_LEADING - 8.0;
    body.push(centred_lossy(
        Font::Regular,
        BYLINE_SIZE,
        byline_y,
        &format!("by {}", meta.author),
    ));

    LaidOutPage {
        kind: PageKind::Cover,
        label: None,
        image: None,
        body,
        footer: Some(centred_lossy(
            Font::Regular,
            BRANDING_SIZE,
            FOOTER_BASELINE,
            &format!("Made with {}", meta.site_name),
        )),
        sign_off: None,
        qr: Some(Frame {
            x: PAGE_SIZE - MARGIN - QR_SIZE,
            y: MARGIN,
            width: QR_SIZE,
            height: QR_SIZE,
        }),
    }
}

/// Lay out every content page, spilling overflow onto continuation pages.
///
/// The last page gets the author sign-off.
pub fn lay_out_content(
    meta: BookMeta<'_>,
    inputs: &[ContentInput<'_>],
    warnings: &mut Vec<StageError>,
) -> Vec<LaidOutPage> {
    let footer_text = format!("{} · {}", meta.site_name, meta.title).to_uppercase();
    let mut pages = Vec::with_capacity(inputs.len());

    for (plan_index, input) in inputs.iter().enumerate() {
        let plan = input.plan;
        let words = body_words(&plan.content, plan_index + 1, warnings);
        let mut lines = wrap(&words, Font::Regular, BODY_SIZE, CONTENT_WIDTH).into_iter();

        let (frame, top, bottom) = first_page_regions(plan.text_placement, input.image_aspect);
        let mut image = frame.map(|frame| ImageSlot { plan_index, frame });
        let mut band = (top, bottom);
        let mut continuation = false;

        loop {
            let body: Vec<PlacedText> = baselines(band.0, band.1)
                .zip(lines.by_ref())
                .map(|(y, (text, encoded))| PlacedText {
                    font: Font::Regular,
                    size: BODY_SIZE,
                    x: MARGIN,
                    y,
                    text,
                    encoded,
                })
                .collect();

            pages.push(LaidOutPage {
                kind: PageKind::Content {
                    chapter_number: plan.chapter_number,
                    plan_index,
                    continuation,
                },
                label: Some(centred_lossy(
                    Font::Bold,
                    LABEL_SIZE,
                    label_baseline(),
                    &format!("Chapter {}", plan.chapter_number),
                )),
                image: image.take(),
                body,
                footer: Some(centred_lossy(
                    Font::Regular,
                    FOOTER_SIZE,
                    FOOTER_BASELINE,
                    &footer_text,
                )),
                sign_off: None,
                qr: None,
            });

            if lines.as_slice().is_empty() {
                break;
            }
            continuation = true;
            band = (content_top(), MARGIN);
        }
    }

    if let Some(last) = pages.last_mut() {
        let (text, encoded) = encode_lossy(&format!("Written by {}", meta.author));
        let width = text_width(Font::Regular, &encoded, SIGN_OFF_SIZE);
        last.sign_off = Some(PlacedText {
            font: Font::Regular,
            size: SIGN_OFF_SIZE,
            x: PAGE_SIZE - MARGIN - width,
            y: SIGN_OFF_BASELINE,
            text,
            encoded,
        });
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: BookMeta<'static> = BookMeta {
        title: "The Sleepy Fox",
        author: "Grandpa Joe",
        site_name: "Storybook Press",
    };

    fn plan(chapter: u32, content: &str, placement: TextPlacement) -> PagePlan {
        PagePlan {
            chapter_number: chapter,
            content: content.to_string(),
            illustration_prompt: "scene".into(),
            text_placement: placement,
        }
    }

    fn long_text(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_page_fits_on_one_page() {
        let p = plan(1, "The fox ran home.", TextPlacement::Bottom);
        let pages = lay_out_content(
            META,
            &[ContentInput { plan: &p, image_aspect: Some(1.0) }],
            &mut Vec::new(),
        );
        assert_eq!(pages.len(), 1);
        let summary = pages[0].summary();
        assert!(summary.has_image);
        assert_eq!(summary.lines, vec!["The fox ran home."]);
        assert_eq!(summary.footer.as_deref(), Some("STORYBOOK PRESS · THE SLEEPY FOX"));
        assert_eq!(summary.sign_off.as_deref(), Some("Written by Grandpa Joe"));
        assert_eq!(pages[0].label.as_ref().unwrap().text, "Chapter 1");
    }

    #[test]
    fn overflow_spills_without_losing_words() {
        let content = long_text(400);
        let p = plan(2, &content, TextPlacement::Bottom);
        let pages = lay_out_content(
            META,
            &[ContentInput { plan: &p, image_aspect: Some(1.0) }],
            &mut Vec::new(),
        );
        assert!(pages.len() > 1);
        assert!(pages[0].image.is_some());
        assert!(pages[1..].iter().all(|p| p.image.is_none()));
        assert!(pages[1..]
            .iter()
            .all(|p| matches!(p.kind, PageKind::Content { continuation: true, .. })));
        assert!(pages.iter().all(|p| p.footer.is_some()));

        let rejoined = pages
            .iter()
            .flat_map(|p| p.body.iter().map(|l| l.text.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, content);
        assert!(pages[..pages.len() - 1].iter().all(|p| p.sign_off.is_none()));
        assert!(pages.last().unwrap().sign_off.is_some());
    }

    #[test]
    fn lines_stay_inside_the_page() {
        let content = long_text(400);
        for placement in [TextPlacement::Top, TextPlacement::Bottom] {
            let p = plan(1, &content, placement);
            let pages = lay_out_content(
                META,
                &[ContentInput { plan: &p, image_aspect: Some(1.5) }],
                &mut Vec::new(),
            );
            for page in &pages {
                for line in &page.body {
                    assert!(line.y >= MARGIN);
                    assert!(text_width(line.font, &line.encoded, line.size) <= CONTENT_WIDTH);
                    if let Some(slot) = page.image {
                        let clear_above = line.y - 4.0 > slot.frame.y + slot.frame.height;
                        let clear_below = line.y + BODY_SIZE < slot.frame.y;
                        assert!(clear_above || clear_below, "{placement}: text overlaps image");
                    }
                }
            }
        }
    }

    #[test]
    fn over_wide_word_is_broken_to_fit() {
        let giant = "W".repeat(45);
        let content = format!("The {giant} end.");
        let p = plan(1, &content, TextPlacement::Bottom);
        let mut warnings = Vec::new();
        let pages = lay_out_content(
            META,
            &[ContentInput { plan: &p, image_aspect: None }],
            &mut warnings,
        );
        let lines: Vec<&PlacedText> = pages.iter().flat_map(|p| &p.body).collect();
        for line in &lines {
            let right = line.x + text_width(line.font, &line.encoded, line.size);
            assert!(right <= PAGE_SIZE - MARGIN, "{:?} ends at {right}", line.text);
        }
        assert!(lines.len() >= 3);
        assert_eq!(lines[0].text, "The");
        assert!(lines.last().unwrap().text.ends_with(" end."));
        let letters: String = lines
            .iter()
            .flat_map(|l| l.text.chars())
            .filter(|c| *c == 'W')
            .collect();
        assert_eq!(letters, giant);
        assert!(warnings.is_empty());
    }

    #[test]
    fn cover_title_word_is_broken_to_fit() {
        let title = "Supercalifragilisticexpialidocious".repeat(2);
        let meta = BookMeta { title: &title, ..META };
        let cover = lay_out_cover(meta);
        for line in &cover.body {
            assert!(line.x >= MARGIN - 1e-3, "{:?} starts at {}", line.text, line.x);
        }
    }

    #[test]
    fn placement_moves_the_image() {
        let p_bottom = plan(1, "a", TextPlacement::Bottom);
        let p_top = plan(1, "a", TextPlacement::Top);
        let inputs = [
            ContentInput { plan: &p_bottom, image_aspect: Some(1.0) },
            ContentInput { plan: &p_top, image_aspect: Some(1.0) },
        ];
        let pages = lay_out_content(META, &inputs, &mut Vec::new());
        let bottom = &pages[0];
        let top = &pages[1];
        assert!(bottom.body[0].y < bottom.image.unwrap().frame.y);
        assert!(top.body[0].y > top.image.unwrap().frame.y + top.image.unwrap().frame.height);
    }

    #[test]
    fn image_is_scaled_and_centred() {
        let wide = image_frame(4.0, 100.0);
        assert_eq!(wide.width, CONTENT_WIDTH);
        assert!((wide.height - CONTENT_WIDTH / 4.0).abs() < 1e-3);
        assert!((wide.x - MARGIN).abs() < 1e-3);

        let square = image_frame(1.0, 100.0);
        assert_eq!((square.width, square.height), (IMAGE_HEIGHT, IMAGE_HEIGHT));
        assert!((square.x + square.width / 2.0 - PAGE_SIZE / 2.0).abs() < 1e-3);
    }

    #[test]
    fn unencodable_words_are_skipped_and_reported() {
        let p = plan(1, "The 狐 ran home.", TextPlacement::Bottom);
        let mut warnings = Vec::new();
        let pages = lay_out_content(
            META,
            &[ContentInput { plan: &p, image_aspect: None }],
            &mut warnings,
        );
        assert_eq!(pages[0].summary().lines, vec!["The ran home."]);
        assert_eq!(
            warnings,
            vec![StageError::WordSkipped { page: 1, word: "狐".into() }]
        );
    }

    #[test]
    fn cover_wraps_title_and_has_byline() {
        let meta = BookMeta {
            title: "A Very Long Title About Foxes and Owls in the Moonlit Forest",
            ..META
        };
        let cover = lay_out_cover(meta);
        assert_eq!(cover.kind, PageKind::Cover);
        assert!(cover.body.len() >= 3);
        assert_eq!(cover.body.last().unwrap().text, "by Grandpa Joe");
        assert!(cover.qr.is_some());
        for line in &cover.body {
            assert!(line.x >= MARGIN - 0.01);
        }
    }
}
