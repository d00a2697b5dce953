//! Image preparation before sending a picture to a vision model.
//!
//! Oversized images are downscaled to fit a bounding box and re-encoded as
//! JPEG; images already within bounds pass through untouched.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, imageops::FilterType};

use crate::error::{Context, Result};

/// Longest side accepted without downscaling.
pub const DEFAULT_MAX_DIMENSION: u32 = 1568;

/// Re-encode threshold; larger payloads are recompressed even when small in pixels.
pub const MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

const JPEG_QUALITY: u8 = 85;

/// Image bytes ready for upload.
#[derive(Debug)]
pub struct PreparedImage {
    pub data: Vec<u8>,
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Decode `data` and downscale it to fit `max_dimension` if needed.
pub fn prepare_for_vision(data: &[u8], max_dimension: u32) -> Result<PreparedImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?;
    let format = reader.format();
    let img = reader.decode()?;
    let (width, height) = img.dimensions();

    if width <= max_dimension && height <= max_dimension && data.len() <= MAX_PAYLOAD_BYTES {
        return Ok(PreparedImage {
            data: data.to_vec(),
            media_type: media_type_for(format),
            width,
            height,
            resized: false,
        });
    }

    let (new_width, new_height) = fit_within(width, height, max_dimension);
    let resized = if (new_width, new_height) == (width, height) {
        img
    } else {
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    };

    Ok(PreparedImage {
        data: encode_jpeg(&resized)?,
        media_type: "image/jpeg",
        width: new_width,
        height: new_height,
        resized: true,
    })
}

/// Scale `(width, height)` down so the longer side is at most `max`.
fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let ratio = f64::from(max) / f64::from(longest);
    let scale = |v: u32| ((f64::from(v) * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

fn media_type_for(format: Option<ImageFormat>) -> &'static str {
    match format {
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::WebP) => "image/webp",
        Some(ImageFormat::Gif) => "image/gif",
        _ => "image/jpeg",
    }
}
