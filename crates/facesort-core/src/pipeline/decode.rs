//! Image decoding and vision-payload encoding.
//!
//! Two distinct concerns live here: `decode` loads a source file (HEIC/HEIF via
//! `libheif-rs`, everything else via `image`) into an in-memory bitmap, and
//! `encode_for_vision` turns that bitmap into a base64 JPEG payload that fits
//! the vision backend's size budget, downscaling iteratively if needed.

use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
pub struct DecodedImage {
    /// Source path, kept for error context during later encode steps.
    pub path: std::path::PathBuf,
    /// The decoded image data
    pub image: DynamicImage,
    /// Format tag ("jpeg", "png", "heic", ...)
    pub format: String,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Original file size in bytes
    pub file_size: u64,
}

/// A base64-encoded JPEG payload ready to send to the vision backend.
pub struct EncodedPayload {
    pub media_type: &'static str,
    pub base64_data: String,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode an image from a file path with validation and timeout.
    ///
    /// Note: magic-byte validation is handled by `Validator::validate()` which runs
    /// before decode in the pipeline. We still read file_size for the output metadata.
    pub async fn decode(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        let file_size =
            std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: format!("Cannot read file: {}", e),
                })?;

        let path_owned = path.to_path_buf();
        let timeout_duration = Duration::from_millis(self.limits.vision_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_sync(&path_owned)).await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(mut decoded))) => {
                if decoded.width > self.limits.max_dimension || decoded.height > self.limits.max_dimension {
                    let scale = self.limits.max_dimension as f64
                        / decoded.width.max(decoded.height) as f64;
                    let new_w = (decoded.width as f64 * scale).round().max(1.0) as u32;
                    let new_h = (decoded.height as f64 * scale).round().max(1.0) as u32;
                    decoded.image =
                        decoded
                            .image
                            .resize(new_w, new_h, image::imageops::FilterType::Lanczos3);
                    decoded.width = new_w;
                    decoded.height = new_h;
                }
                decoded.file_size = file_size;
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Io {
                path: path.to_path_buf(),
                message: format!("decode timed out after {}ms", self.limits.vision_timeout_ms),
            }),
        }
    }

    /// Synchronous decode implementation (runs in spawn_blocking).
    fn decode_sync(path: &Path) -> Result<DecodedImage, PipelineError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let (image, format) = if extension == "heic" || extension == "heif" {
            (Self::decode_heif(path)?, extension.clone())
        } else {
            let fmt = ImageFormat::from_path(path).map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Unknown format: {}", e),
            })?;
            let image = image::open(path).map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            (image, format_to_string(fmt))
        };

        let (width, height) = image.dimensions();
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        Ok(DecodedImage {
            path: path.to_path_buf(),
            image,
            format,
            width,
            height,
            file_size,
        })
    }

    /// Decode a HEIC/HEIF container via libheif, converting the primary image
    /// to an 8-bit RGB `DynamicImage`.
    fn decode_heif(path: &Path) -> Result<DynamicImage, PipelineError> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_file(path.to_string_lossy().as_ref()).map_err(|e| {
            PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("heif container error: {}", e),
            }
        })?;
        let handle = ctx.primary_image_handle().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("heif primary image error: {}", e),
        })?;
        let heif_image = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("heif decode error: {}", e),
            })?;

        let plane = heif_image
            .planes()
            .interleaved
            .ok_or_else(|| PipelineError::Decode {
                path: path.to_path_buf(),
                message: "heif image has no interleaved RGB plane".to_string(),
            })?;

        let width = plane.width;
        let height = plane.height;
        let stride = plane.stride;
        let data = plane.data;

        let mut buf = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buf.extend_from_slice(&data[start..start + width as usize * 3]);
        }

        image::RgbImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PipelineError::Decode {
                path: path.to_path_buf(),
                message: "heif pixel buffer had unexpected size".to_string(),
            })
    }

    /// Encode a decoded image as a base64 JPEG payload within the configured
    /// size budget, downscaling the longest edge and stepping down quality
    /// until the encoded payload fits.
    pub fn encode_for_vision(
        &self,
        decoded: &DecodedImage,
        starting_quality: u8,
    ) -> Result<EncodedPayload, PipelineError> {
        let max_bytes = (self.limits.max_payload_mb * 1024.0 * 1024.0) as usize;
        let mut image = decoded.image.clone();
        let mut quality = starting_quality;

        loop {
            let mut buf = Vec::new();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(&image)
                .map_err(|e| PipelineError::Decode {
                    path: decoded.path.clone(),
                    message: format!("jpeg encode error: {}", e),
                })?;

            if buf.len() <= max_bytes || (quality <= 20 && image.width() <= 512) {
                let base64_data = base64::engine::general_purpose::STANDARD.encode(&buf);
                return Ok(EncodedPayload {
                    media_type: "image/jpeg",
                    base64_data,
                });
            }

            if quality > 20 {
                quality = quality.saturating_sub(15).max(20);
            } else {
                let (w, h) = image.dimensions();
                let new_w = (w as f64 * 0.75).max(256.0) as u32;
                let new_h = (h as f64 * 0.75).max(256.0) as u32;
                image = image.resize(new_w, new_h, image::imageops::FilterType::Lanczos3);
            }
        }
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        _ => "unknown".to_string(),
    }
}
