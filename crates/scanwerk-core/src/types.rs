// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an orchestrator job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Perceptual content fingerprint, rendered as `0x` + 16 hex digits.
///
/// This is the identity of a scan or photo everywhere in the pipeline: file
/// names, cache keys and metadata ids are all derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Render a 64-bit fingerprint.
    pub fn from_bits(bits: u64) -> Self {
        Self(format!("0x{bits:016x}"))
    }

    /// Accept a file stem that is already a content hash (`0x` followed by
    /// 1 to 16 hex digits). Older outputs dropped leading zeros, so shorter
    /// stems are accepted as-is.
    pub fn from_stem(stem: &str) -> Option<Self> {
        let digits = stem.strip_prefix("0x")?;
        if digits.is_empty()
            || digits.len() > 16
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        Some(Self(stem.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

/// A photo-shaped rectangle found on an image, in that image's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Rotation of the rectangle in degrees, always within (-45, 45].
    pub angle: f64,
    pub width: u32,
    pub height: u32,
    pub center: PixelPoint,
    pub area: f64,
}

impl Region {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// A photograph extracted from a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub id: ContentHash,
    pub source_region: Region,
    pub path: PathBuf,
}

/// Display transform callers must apply before rendering a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Clockwise rotation in degrees (90, 180 or 270).
    pub rotate: u16,
}

/// Point in unit coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: f64,
    pub y: f64,
}

/// Face rectangle normalized to `[0, 1]` against the displayed photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub center: RelativePoint,
}

/// A face found on a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    /// Stable id derived from the photo id and the face centre.
    pub id: String,
    /// Id assigned by the detection service; changes between runs.
    pub detector_face_id: Option<String>,
    /// Attributes reported by the service, passed through untouched.
    pub attributes: serde_json::Value,
    pub rect: FaceRect,
}

/// Build the stable id of a face: the photo id followed by the centre
/// coordinates in hundredths, zero padded to two digits.
pub fn face_region_id(photo_id: &ContentHash, center: RelativePoint) -> String {
    let hundredths = |n: f64| (n * 100.0).round() as i64;
    format!(
        "{}-{:02}-{:02}",
        photo_id,
        hundredths(center.x),
        hundredths(center.y)
    )
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Cached result of decomposing one scan (`scans` scope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: ContentHash,
    /// File the scan was read from on the run that produced the record.
    pub source: PathBuf,
    pub photos: Vec<PhotoDescriptor>,
}

/// Per-photo metadata (`photos` scope and `{id}/data.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub id: ContentHash,
    pub image: PathBuf,
    pub aspect_ratio: f64,
    /// Tiny blurred PNG as a `data:` URI, used as a loading placeholder.
    pub placeholder: String,
    pub transform: Option<Transform>,
    pub faces: Vec<FaceRegion>,
    pub people: Option<Vec<String>>,
    pub date: Option<String>,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_fixed_width() {
        assert_eq!(ContentHash::from_bits(0).as_str(), "0x0000000000000000");
        assert_eq!(ContentHash::from_bits(0xab).as_str(), "0x00000000000000ab");
        assert_eq!(ContentHash::from_bits(u64::MAX).as_str().len(), 18);
    }

    #[test]
    fn stems_are_recognised() {
        assert!(ContentHash::from_stem("0x00ff00ff00ff00ff").is_some());
        assert!(ContentHash::from_stem("0x1f").is_some());
        assert!(ContentHash::from_stem("scan-001").is_none());
        assert!(ContentHash::from_stem("0x").is_none());
        assert!(ContentHash::from_stem("0xnothex").is_none());
        assert!(ContentHash::from_stem("0x00000000000000000").is_none());
    }

    #[test]
    fn face_id_is_stable_across_nearby_centres() {
        let photo = ContentHash::from_bits(0x1234);
        let a = face_region_id(&photo, RelativePoint { x: 0.3141, y: 0.0712 });
        let b = face_region_id(&photo, RelativePoint { x: 0.3138, y: 0.0688 });
        assert_eq!(a, b);
        assert_eq!(a, "0x0000000000001234-31-07");
    }

    #[test]
    fn face_id_pads_small_values() {
        let photo = ContentHash::from_bits(1);
        let id = face_region_id(&photo, RelativePoint { x: 0.0, y: 0.049 });
        assert!(id.ends_with("-00-05"));
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let meta = PhotoMetadata {
            id: ContentHash::from_bits(7),
            image: PathBuf::from("photos/0x0000000000000007.png"),
            aspect_ratio: 0.97,
            placeholder: String::new(),
            transform: Some(Transform { rotate: 90 }),
            faces: Vec::new(),
            people: None,
            date: None,
            location: None,
        };
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(json["aspectRatio"], 0.97);
        assert_eq!(json["transform"]["rotate"], 90);
        assert_eq!(json["id"], "0x0000000000000007");
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(0.123456789, 8), 0.12345679);
        assert_eq!(round_to(2.5, 0), 3.0);
    }
}
