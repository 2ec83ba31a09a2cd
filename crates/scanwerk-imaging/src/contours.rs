// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour-based photo region extraction.
//
// Pipeline (all on a downscaled copy, results mapped back to full resolution):
//   1. Background mask: grey plus inverted blue, thresholded
//   2. Gaussian blur
//   3. Grayscale erosion (square mask)
//   4. Bilateral smoothing
//   5. Binary threshold
//   6. Contour tracing, minimum-area rectangle per contour
//   7. Size-class filter and positional de-duplication

use std::collections::HashSet;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use imageproc::morphology::{Mask, grayscale_erode};
use scanwerk_core::config::DetectionConfig;
use scanwerk_core::types::{PixelPoint, Region};
use tracing::{debug, instrument};

use crate::geometry::{GeometryFilter, canonicalize, min_area_rect};
use crate::raster::RasterImage;

/// Finds photo-shaped rectangles on an image.
#[derive(Debug, Clone)]
pub struct ContourExtractor {
    config: DetectionConfig,
}

impl ContourExtractor {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Regions on `image` that pass `filter`, de-duplicated by position, in
    /// tracing order. Never fails: an image without photos yields nothing.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn extract(&self, image: &RasterImage, filter: &GeometryFilter) -> Vec<Region> {
        let candidates = self.candidates(image);
        let total = candidates.len();
        let accepted: Vec<Region> = candidates.into_iter().filter(|r| filter.matches(r)).collect();
        let regions = dedup_regions(accepted, self.config.dedup_bucket_px);
        debug!(candidates = total, regions = regions.len(), "Contours extracted");
        regions
    }

    /// Every traced contour as a [`Region`], before size filtering.
    pub fn candidates(&self, image: &RasterImage) -> Vec<Region> {
        let scale = self.config.detection_scale;
        let binary = self.binarized(image);

        find_contours::<i32>(&binary)
            .into_iter()
            .filter_map(|contour| {
                let rect = min_area_rect(&contour.points)?;
                let (angle, width, height) = canonicalize(rect.angle, rect.width, rect.height);

                let (min_x, max_x, min_y, max_y) = contour.points.iter().fold(
                    (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
                    |(x0, x1, y0, y1), p| (x0.min(p.x), x1.max(p.x), y0.min(p.y), y1.max(p.y)),
                );
                let bound_w = (max_x - min_x + 1) as f64;
                let bound_h = (max_y - min_y + 1) as f64;

                Some(Region {
                    angle,
                    width: (width / scale).round() as u32,
                    height: (height / scale).round() as u32,
                    center: PixelPoint {
                        x: ((min_x as f64 + bound_w / 2.0) / scale).round() as i32,
                        y: ((min_y as f64 + bound_h / 2.0) / scale).round() as i32,
                    },
                    area: width * height / (scale * scale),
                })
            })
            .collect()
    }

    /// Steps 1-5: the downscaled binary image contours are traced on.
    /// Photos come out black on a white background.
    pub fn binarized(&self, image: &RasterImage) -> GrayImage {
        let cfg = &self.config;
        let rgb = image.as_dynamic().to_rgb8();
        let target_w = ((rgb.width() as f64) * cfg.detection_scale).round().max(1.0) as u32;
        let target_h = ((rgb.height() as f64) * cfg.detection_scale).round().max(1.0) as u32;
        let small = if (target_w, target_h) == rgb.dimensions() {
            rgb
        } else {
            imageops::resize(&rgb, target_w, target_h, FilterType::Triangle)
        };

        // -- Background mask --
        let masked = GrayImage::from_fn(small.width(), small.height(), |x, y| {
            let [r, g, b] = small.get_pixel(x, y).0;
            let gray = luma(r, g, b);
            let keep = gray as u16 + (255 - b) as u16 > cfg.mask_threshold as u16;
            Luma([if keep { gray } else { 0 }])
        });

        let blurred = gaussian_blur_f32(&masked, cfg.blur_sigma);
        let eroded = grayscale_erode(&blurred, &Mask::square(cfg.erode_radius));
        let smoothed = self.smooth(eroded);
        threshold(&smoothed, cfg.binary_threshold, ThresholdType::Binary)
    }

    /// Bilateral smoothing over a window reaching `bilateral_radius` pixels
    /// each way. Skipped when there is nothing to smooth: imageproc needs a
    /// non-empty image with a non-zero maximum.
    fn smooth(&self, image: GrayImage) -> GrayImage {
        let cfg = &self.config;
        if cfg.bilateral_radius == 0 || image.iter().all(|&v| v == 0) {
            return image;
        }
        bilateral_filter(
            &image,
            2 * cfg.bilateral_radius,
            cfg.bilateral_sigma_color,
            cfg.bilateral_sigma_space,
        )
    }
}

/// Keep the first region of every `bucket`-sized grid cell, keyed by the
/// floored centre coordinates.
pub fn dedup_regions(regions: Vec<Region>, bucket: u32) -> Vec<Region> {
    let bucket = bucket.max(1) as i32;
    let mut seen: HashSet<(i32, i32)> = HashSet::new();
    regions
        .into_iter()
        .filter(|r| seen.insert((r.center.x.div_euclid(bucket), r.center.y.div_euclid(bucket))))
        .collect()
}

/// Rec. 709 luma, the same weights `image` uses for its grey conversion.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 2126 + g as u32 * 7152 + b as u32 * 722) / 10000) as u8
}
