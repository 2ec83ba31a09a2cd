// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Owned raster image. Decoding, quarter and arbitrary rotation, clamped
// cropping, resampling and encoding. Operates on in-memory images using the
// `image` and `imageproc` crates.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Luma, Rgb};
use imageproc::geometric_transformations::{self, Interpolation};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, instrument};

/// Where an image comes from. Resolved exactly once into a [`RasterImage`].
pub enum ImageInput {
    /// Encoded image on disk.
    File(PathBuf),
    /// Encoded image bytes (PNG, JPEG, TIFF, ...).
    Encoded(Vec<u8>),
    /// Already decoded pixels.
    Pixels(DynamicImage),
}

impl ImageInput {
    /// Decode the input into an owned raster.
    pub fn into_raster(self) -> Result<RasterImage> {
        match self {
            Self::File(path) => RasterImage::open(path),
            Self::Encoded(data) => RasterImage::from_bytes(&data),
            Self::Pixels(image) => Ok(RasterImage::from_dynamic(image)),
        }
    }
}

/// An owned, decoded image with 8-bit channels.
///
/// Pixels are always either `Luma8` or `Rgb8`; alpha and 16-bit depths are
/// dropped at construction. Every transforming method returns a new buffer,
/// so a caller holding the original never observes a mutation.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| ScanwerkError::UnreadableSource {
            path: path.as_ref().to_path_buf(),
            detail: err.to_string(),
        })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self::from_dynamic(img))
    }

    /// Decode raw encoded bytes.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            ScanwerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        Ok(Self::from_dynamic(img))
    }

    /// Decode bytes read from `origin`, reporting failures against that file.
    pub fn from_source_bytes(data: &[u8], origin: &Path) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| ScanwerkError::UnreadableSource {
            path: origin.to_path_buf(),
            detail: err.to_string(),
        })?;
        Ok(Self::from_dynamic(img))
    }

    /// Wrap an already-decoded `DynamicImage`, dropping alpha and reducing
    /// to 8 bits per channel.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let image = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) => {
                DynamicImage::ImageLuma8(image.to_luma8())
            }
            DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Number of colour channels (1 or 3).
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Bits per channel.
    pub fn bit_depth(&self) -> u8 {
        (self.image.color().bits_per_pixel() / self.image.color().channel_count() as u16) as u8
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations --------------------------------------------------------

    /// Rotate clockwise by a multiple of 90 degrees (lossless).
    pub fn rotate_quarter(self, degrees: u16) -> Self {
        let image = match degrees % 360 {
            90 => self.image.rotate90(),
            180 => self.image.rotate180(),
            270 => self.image.rotate270(),
            _ => self.image,
        };
        Self { image }
    }

    /// Rotate the content counter-clockwise by `degrees` about `center`,
    /// keeping the canvas size. Uncovered pixels are filled with white.
    ///
    /// A rectangle tilted clockwise by `degrees` comes out axis-aligned.
    pub fn rotate_about(&self, center: (f32, f32), degrees: f64) -> Self {
        if degrees.abs() < 1e-6 {
            return self.clone();
        }
        let theta = -(degrees as f32).to_radians();
        let image = match &self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(geometric_transformations::rotate(
                gray,
                center,
                theta,
                Interpolation::Bilinear,
                Luma([255u8]),
            )),
            other => DynamicImage::ImageRgb8(geometric_transformations::rotate(
                &other.to_rgb8(),
                center,
                theta,
                Interpolation::Bilinear,
                Rgb([255u8, 255, 255]),
            )),
        };
        Self { image }
    }

    /// Crop a rectangle given in signed coordinates. The rectangle is clipped
    /// to the image; `None` if nothing of it remains.
    pub fn crop_clamped(&self, left: i64, top: i64, width: i64, height: i64) -> Option<Self> {
        let img_w = self.image.width() as i64;
        let img_h = self.image.height() as i64;

        let x0 = left.clamp(0, img_w);
        let y0 = top.clamp(0, img_h);
        let x1 = left.saturating_add(width).clamp(0, img_w);
        let y1 = top.saturating_add(height).clamp(0, img_h);

        if x1 <= x0 || y1 <= y0 {
            debug!(left, top, width, height, "Crop rectangle lies outside the image");
            return None;
        }

        let cropped = self
            .image
            .crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        Some(Self { image: cropped })
    }

    /// Resize to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(&self, width: u32, height: u32) -> Self {
        let resized = self
            .image
            .resize_exact(width.max(1), height.max(1), FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Resize to `width`, keeping the aspect ratio.
    pub fn resize_to_width(&self, width: u32) -> Self {
        let height = ((width as f64) * self.height() as f64 / self.width().max(1) as f64)
            .round()
            .max(1.0) as u32;
        self.resize_exact(width, height)
    }

    /// Gaussian blur with the given sigma.
    pub fn blur(&self, sigma: f32) -> Self {
        Self {
            image: self.image.blur(sigma),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| ScanwerkError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| ScanwerkError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbaImage};

    #[test]
    fn alpha_is_dropped_at_construction() {
        let rgba = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 128]));
        let raster = RasterImage::from_dynamic(DynamicImage::ImageRgba8(rgba));
        assert_eq!(raster.channels(), 3);
        assert_eq!(raster.bit_depth(), 8);
        assert_eq!(raster.dimensions(), (4, 3));
    }

    #[test]
    fn crop_is_clamped_to_bounds() {
        let raster = RasterImage::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(100, 80)));
        let cropped = raster.crop_clamped(-20, 70, 50, 50).expect("partially inside");
        assert_eq!(cropped.dimensions(), (30, 10));

        assert!(raster.crop_clamped(200, 0, 10, 10).is_none());
        assert!(raster.crop_clamped(10, 10, -5, 10).is_none());
    }

    #[test]
    fn quarter_rotation_swaps_dimensions() {
        let raster = RasterImage::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(30, 20)));
        assert_eq!(raster.clone().rotate_quarter(90).dimensions(), (20, 30));
        assert_eq!(raster.clone().rotate_quarter(180).dimensions(), (30, 20));
        assert_eq!(raster.rotate_quarter(270).dimensions(), (20, 30));
    }

    #[test]
    fn rotate_about_keeps_original_untouched() {
        let mut gray = GrayImage::from_pixel(40, 40, Luma([255u8]));
        for x in 10..30 {
            gray.put_pixel(x, 20, Luma([0u8]));
        }
        let raster = RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray));
        let rotated = raster.rotate_about((20.0, 20.0), 90.0);

        assert_eq!(raster.as_dynamic().to_luma8().get_pixel(12, 20).0[0], 0);
        // The horizontal stroke becomes vertical.
        assert!(rotated.as_dynamic().to_luma8().get_pixel(20, 12).0[0] < 64);
        assert!(rotated.as_dynamic().to_luma8().get_pixel(12, 20).0[0] > 192);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let gray = GrayImage::from_fn(16, 8, |x, y| Luma([(x * 10 + y) as u8]));
        let raster = RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray.clone()));
        let decoded = RasterImage::from_bytes(&raster.to_png_bytes().expect("encode")).expect("decode");
        assert_eq!(decoded.as_dynamic().to_luma8(), gray);
    }

    #[test]
    fn undecodable_file_is_unreadable_source() {
        let err = RasterImage::from_source_bytes(b"not an image", Path::new("scan.tif"))
            .expect_err("garbage must not decode");
        assert!(matches!(err, ScanwerkError::UnreadableSource { .. }));
    }
}
