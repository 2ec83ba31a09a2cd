// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// Every heuristic the detector depends on lives here so that a different
// scanner or photo format can be tuned without code changes. The defaults
// reproduce the settings existing caches were built with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Physical size class of a photograph, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeClass {
    pub width: f64,
    pub height: f64,
    /// Expected visible area. Not always `width * height`: the printed
    /// border of instant film is excluded.
    pub area: f64,
}

impl SizeClass {
    pub const fn new(width: f64, height: f64, area: f64) -> Self {
        Self {
            width,
            height,
            area,
        }
    }

    /// Expected width / height ratio.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Expected pixel area at `resolution` pixels per inch.
    pub fn pixel_area(&self, resolution: f64) -> f64 {
        self.area * resolution * resolution
    }
}

/// Square instant film and the slightly narrower classic print.
pub const DEFAULT_SIZE_CLASSES: [SizeClass; 2] = [
    SizeClass::new(4.0, 4.1, 16.4),
    SizeClass::new(3.5, 4.2, 14.7),
];

/// Parameters of the contour detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Scan resolution in pixels per inch.
    pub resolution: f64,
    /// Photo sizes that may appear on a scan.
    pub size_classes: Vec<SizeClass>,
    /// Relative tolerance applied to both area and aspect ratio.
    pub tolerance: f64,
    /// Grid size used to collapse duplicate detections of the same photo.
    pub dedup_bucket_px: u32,
    /// Downscale factor applied before filtering (0 < scale <= 1).
    pub detection_scale: f64,
    /// Threshold for the background-removal mask.
    pub mask_threshold: u8,
    /// Threshold that produces the final binary image.
    pub binary_threshold: u8,
    pub blur_sigma: f32,
    pub erode_radius: u8,
    pub bilateral_radius: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            resolution: 600.0,
            size_classes: DEFAULT_SIZE_CLASSES.to_vec(),
            tolerance: 0.1,
            dedup_bucket_px: 100,
            detection_scale: 0.5,
            mask_threshold: 180,
            binary_threshold: 70,
            blur_sigma: 1.4,
            erode_radius: 2,
            bilateral_radius: 4,
            bilateral_sigma_color: 30.0,
            bilateral_sigma_space: 100.0,
        }
    }
}

/// Insets used by the two refinement crops. Negative values grow the crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub first_pass_inset: i32,
    pub second_pass_inset: i32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            first_pass_inset: -30,
            second_pass_inset: 10,
        }
    }
}

/// Face detection service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceServiceConfig {
    /// Detection endpoint (POST, octet-stream body).
    pub endpoint: String,
    /// Name of the environment variable holding the subscription key.
    pub api_key_env: String,
    /// Minimum interval between two requests, shared by the whole process.
    pub min_interval_ms: u64,
    /// Long edge of the image submitted to the service.
    pub long_edge: u32,
    pub jpeg_quality: u8,
    pub timeout_secs: u64,
}

impl Default for FaceServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://westus2.api.cognitive.microsoft.com/face/v1.0/detect".into(),
            api_key_env: "OCP_APIM_SUBSCRIPTION_KEY".into(),
            min_interval_ms: 3334,
            long_edge: 2000,
            jpeg_quality: 85,
            timeout_secs: 60,
        }
    }
}

/// Output directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDirs {
    /// Extracted photos, `{id}.png`.
    pub photos: PathBuf,
    /// Archived scans, `{scan_id}.png`.
    pub scans: PathBuf,
    /// Photo metadata, `{id}/data.json`.
    pub meta: PathBuf,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            photos: PathBuf::from("src/photos"),
            scans: PathBuf::from("src/scans"),
            meta: PathBuf::from("site/content"),
        }
    }
}

impl OutputDirs {
    /// Re-root every directory under `prefix` (used for test runs).
    pub fn prefixed(&self, prefix: &std::path::Path) -> Self {
        Self {
            photos: prefix.join(&self.photos),
            scans: prefix.join(&self.scans),
            meta: prefix.join(&self.meta),
        }
    }

    pub fn all(&self) -> [&PathBuf; 3] {
        [&self.photos, &self.scans, &self.meta]
    }
}

/// Persistent pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    pub refinement: RefinementConfig,
    /// Number of photos normally found on one scan; fewer triggers a warning.
    pub expected_photos_per_scan: usize,
    /// Clockwise rotation applied to every scan before detection.
    pub initial_rotation: u16,
    /// Maximum number of jobs running at once.
    pub concurrency: usize,
    pub dest: OutputDirs,
    pub cache_dir: PathBuf,
    /// Consult the cache before processing (results are always written).
    pub use_cache: bool,
    /// Re-save every decoded scan under its content hash.
    pub archive_scans: bool,
    /// Width of the blurred placeholder embedded in photo metadata.
    pub placeholder_width: u32,
    pub faces: FaceServiceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            refinement: RefinementConfig::default(),
            expected_photos_per_scan: 4,
            initial_rotation: 0,
            concurrency: 8,
            dest: OutputDirs::default(),
            cache_dir: PathBuf::from(".cache"),
            use_cache: true,
            archive_scans: true,
            placeholder_width: 16,
            faces: FaceServiceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the detector cannot work with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if !(d.detection_scale > 0.0 && d.detection_scale <= 1.0) {
            return Err(ScanwerkError::Config(format!(
                "detection_scale must be in (0, 1], got {}",
                d.detection_scale
            )));
        }
        if d.resolution <= 0.0 {
            return Err(ScanwerkError::Config("resolution must be positive".into()));
        }
        if d.size_classes.is_empty() {
            return Err(ScanwerkError::Config(
                "at least one size class is required".into(),
            ));
        }
        if !(0.0..1.0).contains(&d.tolerance) {
            return Err(ScanwerkError::Config(format!(
                "tolerance must be in [0, 1), got {}",
                d.tolerance
            )));
        }
        if d.dedup_bucket_px == 0 {
            return Err(ScanwerkError::Config("dedup_bucket_px must be non-zero".into()));
        }
        if self.initial_rotation % 90 != 0 {
            return Err(ScanwerkError::Config(format!(
                "initial_rotation must be a multiple of 90, got {}",
                self.initial_rotation
            )));
        }
        if self.concurrency == 0 {
            return Err(ScanwerkError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Path of the cache database.
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join("cache.db")
    }
}
