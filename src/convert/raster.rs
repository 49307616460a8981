//! Raster transcoding between the supported image formats

use crate::error::{Error, Result};
use crate::format::Format;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

fn image_format(format: Format) -> Option<ImageFormat> {
    match format {
        Format::Png => Some(ImageFormat::Png),
        Format::Jpeg => Some(ImageFormat::Jpeg),
        Format::Webp => Some(ImageFormat::WebP),
        Format::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Decode `data` as `from` and re-encode it as `to`.
///
/// Pixel dimensions are preserved. JPEG has no alpha channel, so
/// transparency is dropped when encoding to it.
pub fn transcode(data: &[u8], from: Format, to: Format) -> Result<Vec<u8>> {
    let (Some(source), Some(target)) = (image_format(from), image_format(to)) else {
        return Err(Error::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        });
    };

    let decoded = image::load_from_memory_with_format(data, source)
        .map_err(|e| Error::Conversion(format!("failed to decode {}: {}", from, e)))?;

    let prepared = match to {
        Format::Jpeg => DynamicImage::ImageRgb8(decoded.to_rgb8()),
        Format::Png => decoded,
        _ => DynamicImage::ImageRgba8(decoded.to_rgba8()),
    };

    let mut buf = Cursor::new(Vec::new());
    prepared
        .write_to(&mut buf, target)
        .map_err(|e| Error::Conversion(format!("failed to encode {}: {}", to, e)))?;
    Ok(buf.into_inner())
}
