//! Image I/O operations service
//!
//! Keeps file and codec handling out of the pipeline so that the pipeline
//! works on in-memory buffers only.

use crate::{
    config::OutputFormat,
    error::{Result, WhiteMuseError},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};
use std::{io::Cursor, path::Path};

/// Default JPEG quality for saved results
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Service for handling image decoding, encoding and file access
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content-based format detection when the extension is
    /// missing or wrong.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use whitemuse::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("bag.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(WhiteMuseError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    WhiteMuseError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    WhiteMuseError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to decode image. Extension error: {}. Content error: {}",
                            e, content_err
                        ),
                        Some(&format!(
                            "path: {}, size: {} bytes",
                            path_ref.display(),
                            data.len()
                        )),
                    )
                })
            },
        }
    }

    /// Decode encoded image bytes
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            WhiteMuseError::processing(format!("Failed to decode image from bytes: {}", e))
        })
    }

    /// Encode an RGBA buffer
    ///
    /// JPEG output drops the alpha channel.
    pub fn encode(image: &RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match format {
            OutputFormat::Png => {
                image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100));
                encoder.encode_image(&rgb)?;
            },
        }
        Ok(bytes)
    }

    /// Encode and write an RGBA buffer, creating parent directories
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    WhiteMuseError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        let bytes = Self::encode(image, format, jpeg_quality)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| WhiteMuseError::file_io_error("write image", path_ref, &e))?;
        log::debug!("Saved {} ({:?})", path_ref.display(), format);
        Ok(())
    }

    /// Check if a file path has an extension this build can decode
    ///
    /// WebP is only accepted with the `webp-support` feature.
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| match ext.to_lowercase().as_str() {
                "jpg" | "jpeg" | "png" => true,
                "webp" => cfg!(feature = "webp-support"),
                _ => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(8, 6, |x, y| Rgba([(x * 30) as u8, (y * 40) as u8, 128, 255]))
    }

    #[test]
    fn test_png_roundtrip_is_lossless() {
        let bytes = ImageIOService::encode(&sample(), OutputFormat::Png, DEFAULT_JPEG_QUALITY).unwrap();
        let decoded = ImageIOService::decode(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_jpeg_encodes_without_alpha() {
        let bytes = ImageIOService::encode(&sample(), OutputFormat::Jpeg, 80).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ImageIOService::decode(b"not an image").is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.png");
        ImageIOService::save_image(&sample(), &path, OutputFormat::Png, DEFAULT_JPEG_QUALITY).unwrap();
        let loaded = ImageIOService::load_image(&path).unwrap();
        assert_eq!(loaded.to_rgba8().dimensions(), (8, 6));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ImageIOService::load_image("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, WhiteMuseError::Io(_)));
    }

    #[test]
    fn test_supported_formats() {
        assert!(ImageIOService::is_supported_format("a.JPG"));
        assert!(ImageIOService::is_supported_format("a.png"));
        assert!(!ImageIOService::is_supported_format("a.txt"));
        assert!(!ImageIOService::is_supported_format("noext"));
        assert!(!ImageIOService::is_supported_format("scan.bmp"));
        assert_eq!(
            ImageIOService::is_supported_format("photo.webp"),
            cfg!(feature = "webp-support")
        );
    }
}
