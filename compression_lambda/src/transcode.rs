//! Lossy re-encoding of uploaded images.
//!
//! Whatever format the upload was in, the output is a baseline JPEG with the
//! same pixel dimensions. Decoding and encoding are CPU bound; callers on the
//! async runtime go through [`transcode_to_jpeg_async`].

use std::io::Cursor;

use bytes::Bytes;
use image::{ColorType, DynamicImage, GenericImageView, ImageOutputFormat};
use lambda_runtime::tracing;

use crate::error::{CompressionError, Result};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug)]
pub struct Transcoded {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

pub fn transcode_to_jpeg(original: &[u8], quality: u8) -> Result<Transcoded> {
    let img = image::load_from_memory(original).map_err(CompressionError::Decode)?;
    let (width, height) = img.dimensions();
    tracing::debug!(
        width,
        height,
        color = ?img.color(),
        original_bytes = original.len(),
        "decoded image"
    );

    // JPEG carries neither alpha nor 16-bit samples.
    let img = match img.color() {
        ColorType::L8 | ColorType::Rgb8 => img,
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(quality))
        .map_err(CompressionError::Encode)?;

    Ok(Transcoded {
        data: Bytes::from(buf),
        width,
        height,
    })
}

pub async fn transcode_to_jpeg_async(original: Bytes, quality: u8) -> Result<Transcoded> {
    tokio::task::spawn_blocking(move || transcode_to_jpeg(&original, quality)).await?
}
