//! Image embedding: turn a generated image buffer into PDF image data.
//!
//! The image service does not promise a format, so the format is taken from
//! the leading signature bytes, never from a declared content type.
//!
//! - **JPEG** is passed through untouched as `DCTDecode` data; only the
//!   header is read, for the dimensions and channel count.
//! - **PNG** is decoded and re-embedded as zlib-compressed 8-bit samples
//!   (`FlateDecode`), with the alpha channel split into a separate soft mask.
//!
//! Any failure here is page-scoped: the caller renders the page text-only.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ImageDecoder};
use std::io::{Cursor, Write};
use thiserror::Error;

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// Detect the image format from its signature.
pub fn sniff(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageKind::Png)
    } else if bytes.starts_with(JPEG_SIGNATURE) {
        Some(ImageKind::Jpeg)
    } else {
        None
    }
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("unrecognised image signature")]
    UnknownFormat,

    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image could not be compressed: {0}")]
    Compress(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleColor {
    Gray,
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFilter {
    Dct,
    Flate,
}

/// Image samples ready to be written as an image XObject.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub color: SampleColor,
    pub filter: SampleFilter,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha, when the source had transparency.
    pub soft_mask: Option<Vec<u8>>,
}

impl PreparedImage {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, EmbedError> {
    match sniff(bytes).ok_or(EmbedError::UnknownFormat)? {
        ImageKind::Jpeg => prepare_jpeg(bytes),
        ImageKind::Png => {
            let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
            prepare_decoded(decoded)
        }
    }
}

fn prepare_jpeg(bytes: &[u8]) -> Result<PreparedImage, EmbedError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let color = match decoder.color_type() {
        ColorType::L8 => SampleColor::Gray,
        ColorType::Rgb8 => SampleColor::Rgb,
        // CMYK and friends: let the decoder normalise them.
        _ => return prepare_decoded(image::load_from_memory_with_format(
            bytes,
            image::ImageFormat::Jpeg,
        )?),
    };
    Ok(PreparedImage {
        width,
        height,
        color,
        filter: SampleFilter::Dct,
        data: bytes.to_vec(),
        soft_mask: None,
    })
}

fn prepare_decoded(image: DynamicImage) -> Result<PreparedImage, EmbedError> {
    let (width, height) = (image.width(), image.height());
    if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }
        Ok(PreparedImage {
            width,
            height,
            color: SampleColor::Rgb,
            filter: SampleFilter::Flate,
            data: deflate(&rgb)?,
            soft_mask: Some(deflate(&alpha)?),
        })
    } else {
        Ok(PreparedImage {
            width,
            height,
            color: SampleColor::Rgb,
            filter: SampleFilter::Flate,
            data: deflate(image.to_rgb8().as_raw())?,
            soft_mask: None,
        })
    }
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}
