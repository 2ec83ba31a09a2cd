// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two-pass refinement crop.
//
// The first pass straightens a generous crop around the detected region. The
// photo is then detected again on that smaller, upright image and cropped
// tight, shaving a few pixels of border.

use scanwerk_core::config::{DetectionConfig, RefinementConfig};
use scanwerk_core::types::Region;
use tracing::{debug, instrument};

use crate::contours::ContourExtractor;
use crate::geometry::GeometryFilter;
use crate::raster::RasterImage;

/// Produces a tight, upright photo from a region found on a scan.
#[derive(Debug, Clone)]
pub struct RefinementCropper {
    extractor: ContourExtractor,
    filter: GeometryFilter,
    config: RefinementConfig,
}

impl RefinementCropper {
    pub fn new(extractor: ContourExtractor, filter: GeometryFilter, config: RefinementConfig) -> Self {
        Self {
            extractor,
            filter,
            config,
        }
    }

    pub fn from_config(detection: &DetectionConfig, refinement: RefinementConfig) -> Self {
        Self::new(
            ContourExtractor::new(detection.clone()),
            GeometryFilter::from_config(detection),
            refinement,
        )
    }

    /// Refine `region` of `scan`. `None` when the photo cannot be found
    /// again on the first-pass crop or a crop comes out empty.
    #[instrument(skip_all, fields(cx = region.center.x, cy = region.center.y, angle = region.angle))]
    pub fn refine(&self, scan: &RasterImage, region: &Region) -> Option<RasterImage> {
        let rough = rotate_and_crop(scan, region, self.config.first_pass_inset)?;

        let regions = self.extractor.extract(&rough, &self.filter);
        let Some(inner) = regions.first() else {
            debug!(
                width = rough.width(),
                height = rough.height(),
                "No photo found on first-pass crop"
            );
            return None;
        };
        if regions.len() > 1 {
            debug!(count = regions.len(), "Several candidates on first-pass crop, using the first");
        }

        rotate_and_crop(&rough, inner, self.config.second_pass_inset)
    }
}

/// Straighten `image` around the region centre and crop the region's
/// extent shrunk by `inset` on every side (negative insets grow it).
/// The source is left untouched.
pub fn rotate_and_crop(image: &RasterImage, region: &Region, inset: i32) -> Option<RasterImage> {
    let (cx, cy) = (region.center.x as f64, region.center.y as f64);
    let (w, h) = (region.width as f64, region.height as f64);

    let upright = image.rotate_about((cx as f32, cy as f32), region.angle);

    let left = (cx - w / 2.0).round() as i64;
    let top = (cy - h / 2.0).round() as i64;
    let inset = inset as i64;
    upright.crop_clamped(
        left + inset,
        top + inset,
        region.width as i64 - 2 * inset,
        region.height as i64 - 2 * inset,
    )
}
