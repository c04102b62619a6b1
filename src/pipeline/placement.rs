//! Text placement: put the page text over the quieter part of the picture.
//!
//! The image is converted to greyscale and the standard deviation of pixel
//! intensity is measured in the top 30 % and bottom 30 % of rows. The band
//! with the lower deviation is more uniform (sky, floor, plain background)
//! and is chosen for the text. Ties and any decoding failure give `bottom`.

use crate::model::TextPlacement;
use image::GrayImage;
use tracing::{debug, warn};

/// Fraction of the image height examined at the top and at the bottom.
pub const BAND_FRACTION: f64 = 0.30;

/// Intensity standard deviation of the top and bottom bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandBusyness {
    pub top: f64,
    pub bottom: f64,
}

impl BandBusyness {
    pub fn placement(&self) -> TextPlacement {
        if self.top < self.bottom {
            TextPlacement::Top
        } else {
            TextPlacement::Bottom
        }
    }
}

/// Measure both bands of an encoded image.
pub fn measure(image_bytes: &[u8]) -> Result<BandBusyness, image::ImageError> {
    let grey = image::load_from_memory(image_bytes)?.to_luma8();
    Ok(measure_grey(&grey))
}

fn measure_grey(grey: &GrayImage) -> BandBusyness {
    let height = grey.height();
    let band = ((height as f64 * BAND_FRACTION).floor() as u32).clamp(1, height.max(1));
    BandBusyness {
        top: row_std_dev(grey, 0..band),
        bottom: row_std_dev(grey, height.saturating_sub(band)..height),
    }
}

fn row_std_dev(grey: &GrayImage, rows: std::ops::Range<u32>) -> f64 {
    let mut count = 0u64;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    for y in rows {
        for x in 0..grey.width() {
            let v = grey.get_pixel(x, y).0[0] as f64;
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0).sqrt()
}

/// Decide where the text goes for one generated image.
///
/// Returns the analysis error alongside the `bottom` fallback so callers can
/// record it.
pub fn place_text(image_bytes: &[u8]) -> (TextPlacement, Option<image::ImageError>) {
    match measure(image_bytes) {
        Ok(b) => {
            let placement = b.placement();
            debug!(
                "Placement: top σ={:.2}, bottom σ={:.2} → {}",
                b.top, b.bottom, placement
            );
            (placement, None)
        }
        Err(e) => {
            warn!("Placement analysis failed, defaulting to bottom: {}", e);
            (TextPlacement::Bottom, Some(e))
        }
    }
}

/// [`place_text`] without the error.
pub fn analyze_placement(image_bytes: &[u8]) -> TextPlacement {
    place_text(image_bytes).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("encode png");
        buf
    }

    /// Flat colour in the rows where `busy(y)` is false, a checkerboard elsewhere.
    fn image_with_busy_rows(busy: impl Fn(u32) -> bool) -> Vec<u8> {
        let img = RgbImage::from_fn(40, 40, |x, y| {
            if busy(y) && (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else if busy(y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([120, 160, 200])
            }
        });
        png(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn quiet_top_band_gives_top() {
        let bytes = image_with_busy_rows(|y| y >= 20);
        assert_eq!(analyze_placement(&bytes), TextPlacement::Top);
    }

    #[test]
    fn quiet_bottom_band_gives_bottom() {
        let bytes = image_with_busy_rows(|y| y < 20);
        assert_eq!(analyze_placement(&bytes), TextPlacement::Bottom);
    }

    #[test]
    fn tie_gives_bottom() {
        let flat = png(DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([90]))));
        let b = measure(&flat).unwrap();
        assert_eq!(b.top, b.bottom);
        assert_eq!(analyze_placement(&flat), TextPlacement::Bottom);
    }

    #[test]
    fn unreadable_image_gives_bottom() {
        assert_eq!(analyze_placement(b"not an image"), TextPlacement::Bottom);
        assert_eq!(analyze_placement(&[]), TextPlacement::Bottom);
        let (placement, err) = place_text(b"not an image");
        assert_eq!(placement, TextPlacement::Bottom);
        assert!(err.is_some());
    }

    #[test]
    fn readable_image_reports_no_error() {
        let bytes = image_with_busy_rows(|y| y >= 20);
        assert!(matches!(place_text(&bytes), (TextPlacement::Top, None)));
    }

    #[test]
    fn std_dev_of_checkerboard_is_half_range() {
        let img = GrayImage::from_fn(10, 10, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 200 }]));
        let b = measure_grey(&img);
        assert!((b.top - 100.0).abs() < 1e-9, "got {}", b.top);
    }
}
