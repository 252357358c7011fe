//! Image encoding: `DynamicImage` → baseline JPEG bytes for a PDF XObject.
//!
//! The PDF writer embeds photos with the `DCTDecode` filter, which is plain
//! JPEG data, so no pixel work happens at serialisation time. Whatever the
//! source format (PNG with alpha, WebP-sized phone photos, greyscale) the
//! pixels are flattened to 8-bit RGB and the longest edge is capped, keeping
//! the document small: 1600 px across 170 mm is already ~240 dpi.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Longest edge, in pixels, of an embedded photo.
pub const MAX_EMBED_EDGE: u32 = 1600;

/// JPEG quality used for embedded photos.
pub const JPEG_QUALITY: u8 = 85;

/// Encoded photo ready to be written as an image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedJpeg {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Encode a decoded photo as RGB JPEG, downsampling if needed.
pub fn encode_jpeg(img: &DynamicImage) -> Result<EncodedJpeg, image::ImageError> {
    let img = if img.width().max(img.height()) > MAX_EMBED_EDGE {
        img.thumbnail(MAX_EMBED_EDGE, MAX_EMBED_EDGE)
    } else {
        img.clone()
    };
    let rgb = img.to_rgb8();

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY).encode_image(&rgb)?;
    debug!(
        width = rgb.width(),
        height = rgb.height(),
        bytes = data.len(),
        "Encoded photo as JPEG"
    );

    Ok(EncodedJpeg {
        width: rgb.width(),
        height: rgb.height(),
        data,
    })
}
