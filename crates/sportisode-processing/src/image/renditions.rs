use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use std::io::Cursor;

/// Source bytes that are not a decodable image
#[derive(Debug, thiserror::Error)]
#[error("Could not decode image: {0}")]
pub struct MediaDecodeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutputFormat {
    WebpLossless,
    Jpeg { quality: u8 },
}

impl ImageOutputFormat {
    /// `"jpeg"`/`"jpg"` select JPEG at `jpeg_quality`; anything else is lossless WebP.
    pub fn from_config(name: &str, jpeg_quality: u8) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Self::Jpeg {
                quality: jpeg_quality.clamp(1, 100),
            },
            _ => Self::WebpLossless,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::WebpLossless => "webp",
            Self::Jpeg { .. } => "jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::WebpLossless => "image/webp",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            Self::WebpLossless => "webp",
            Self::Jpeg { .. } => "jpeg",
        }
    }
}

/// Encoded rendition ready for upload
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode any supported container and convert to 8-bit RGB.
pub fn decode_rgb(data: &[u8]) -> Result<DynamicImage, MediaDecodeError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaDecodeError(e.to_string()))?;
    let img = reader
        .decode()
        .map_err(|e| MediaDecodeError(e.to_string()))?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

fn filter_for(orig: (u32, u32), target: (u32, u32)) -> FilterType {
    let ratio = (orig.0 as f32 / target.0.max(1) as f32).max(orig.1 as f32 / target.1.max(1) as f32);
    if ratio > 2.0 {
        FilterType::Triangle
    } else {
        FilterType::Lanczos3
    }
}

/// Scale to cover `size`, then crop the centre to exactly `size`.
pub fn thumbnail_fill(img: &DynamicImage, size: (u32, u32)) -> DynamicImage {
    let filter = filter_for(img.dimensions(), size);
    img.resize_to_fill(size.0.max(1), size.1.max(1), filter)
}

/// Scale down to fit inside `size`, keeping the aspect ratio. Never upscales.
pub fn fit_within(img: &DynamicImage, size: (u32, u32)) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= size.0 && height <= size.1 {
        return img.clone();
    }
    let filter = filter_for((width, height), size);
    img.resize(size.0.max(1), size.1.max(1), filter)
}

/// Encode an image in the output format.
pub fn render(img: &DynamicImage, format: ImageOutputFormat) -> Result<RenderedImage, ImageError> {
    let (width, height) = img.dimensions();
    let mut data = Vec::new();
    match format {
        ImageOutputFormat::WebpLossless => {
            img.write_with_encoder(WebPEncoder::new_lossless(&mut data))?;
        }
        ImageOutputFormat::Jpeg { quality } => {
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut data, quality))?;
        }
    }
    Ok(RenderedImage {
        data,
        width,
        height,
    })
}
