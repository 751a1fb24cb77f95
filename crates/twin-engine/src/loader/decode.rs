use image::DynamicImage;

use crate::resource::{Bitmap, PixelFormat};

use super::LoadError;

/// Decodes an encoded image (PNG/JPEG) into an uploadable bitmap.
///
/// Luma maps to R8, luma-alpha to RG8; every other layout becomes RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<Bitmap, LoadError> {
    let img = image::load_from_memory(bytes).map_err(|e| LoadError::Decode(e.to_string()))?;
    Ok(bitmap_from_image(img))
}

pub(crate) fn bitmap_from_image(img: DynamicImage) -> Bitmap {
    let (width, height) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(buf) => Bitmap {
            width,
            height,
            format: PixelFormat::R8,
            pixels: buf.into_raw(),
        },
        DynamicImage::ImageLumaA8(buf) => Bitmap {
            width,
            height,
            format: PixelFormat::Rg8,
            pixels: buf.into_raw(),
        },
        DynamicImage::ImageRgb8(buf) => Bitmap::from_rgb(width, height, buf.as_raw()),
        DynamicImage::ImageRgba8(buf) => Bitmap {
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels: buf.into_raw(),
        },
        other => Bitmap {
            width,
            height,
            format: PixelFormat::Rgba8,
            pixels: other.to_rgba8().into_raw(),
        },
    }
}

#[cfg(test)]
pub(crate) fn encode_png(img: DynamicImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("png encoding succeeds");
    out.into_inner()
}
