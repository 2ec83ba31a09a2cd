// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rotation search.
//
// Scans are often placed sideways or upside down, and detection services
// rarely find faces that are not upright. The photo is submitted at each
// quarter turn until faces come back; the winning rotation becomes the
// photo's display transform.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use scanwerk_core::config::FaceServiceConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{
    ContentHash, FaceRect, FaceRegion, RelativePoint, Transform, face_region_id, round_to,
};
use scanwerk_imaging::RasterImage;

use crate::rate_gate::RateGate;
use crate::service::{DetectedFace, FaceDetectionService};

/// Clockwise rotations tried, in order.
pub const SEARCH_ROTATIONS: [u16; 4] = [0, 90, 180, 270];

/// Decimal places kept in normalized face rectangles.
const RECT_PRECISION: i32 = 8;

/// Result of a rotation search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceSearchOutcome {
    pub faces: Vec<FaceRegion>,
    /// Rotation the faces were found at, if not upright.
    pub transform: Option<Transform>,
}

/// Finds faces on a photo regardless of its orientation.
pub struct RotationSearchFaceLocator<S> {
    service: S,
    gate: Arc<RateGate>,
    long_edge: u32,
    jpeg_quality: u8,
}

impl<S: FaceDetectionService> RotationSearchFaceLocator<S> {
    pub fn new(service: S, gate: Arc<RateGate>, config: &FaceServiceConfig) -> Self {
        Self {
            service,
            gate,
            long_edge: config.long_edge,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Search `photo` for faces, stopping at the first rotation with a hit.
    /// A service failure aborts the search.
    #[instrument(skip_all, fields(photo_id = %photo_id))]
    pub async fn locate(&self, photo_id: &ContentHash, photo: &RasterImage) -> Result<FaceSearchOutcome> {
        for rotation in SEARCH_ROTATIONS {
            let (jpeg, width, height) = self.render(photo, rotation).await?;

            self.gate.acquire().await;
            let detected = self.service.detect(jpeg).await?;

            if detected.is_empty() {
                debug!(rotation, "no faces");
                continue;
            }

            let faces: Vec<FaceRegion> = detected
                .into_iter()
                .map(|face| normalize(photo_id, face, width, height))
                .collect();
            let transform = (rotation != 0).then_some(Transform { rotate: rotation });
            info!(rotation, faces = faces.len(), "faces found");
            return Ok(FaceSearchOutcome { faces, transform });
        }

        debug!("no faces at any rotation");
        Ok(FaceSearchOutcome::default())
    }

    /// Rotate, scale to the long edge and encode, off the async threads.
    async fn render(&self, photo: &RasterImage, rotation: u16) -> Result<(Vec<u8>, u32, u32)> {
        let photo = photo.clone();
        let long_edge = self.long_edge;
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let rotated = photo.rotate_quarter(rotation);
            let (w, h) = rotated.dimensions();
            let (tw, th) = fit_long_edge(w, h, long_edge);
            let resized = rotated.resize_exact(tw, th);
            let jpeg = resized.to_jpeg_bytes(quality)?;
            Ok((jpeg, tw, th))
        })
        .await
        .map_err(|e| ScanwerkError::TaskJoin(format!("face render: {e}")))?
    }
}

/// Target size with the longer side equal to `long_edge`.
pub fn fit_long_edge(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    if w >= h {
        (long_edge, (long_edge as f64 * h / w).round().max(1.0) as u32)
    } else {
        ((long_edge as f64 * w / h).round().max(1.0) as u32, long_edge)
    }
}

/// Express a service rectangle in unit coordinates of the submitted image.
/// Edges reaching past the image are pulled back onto it.
fn normalize(photo_id: &ContentHash, face: DetectedFace, width: u32, height: u32) -> FaceRegion {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let r = face.face_rectangle;

    let unit = |v: f64| v.clamp(0.0, 1.0);
    let (x0, x1) = (unit(r.left / w), unit((r.left + r.width) / w));
    let (y0, y1) = (unit(r.top / h), unit((r.top + r.height) / h));

    let top = round_to(y0, RECT_PRECISION);
    let left = round_to(x0, RECT_PRECISION);
    let width = round_to((x1 - x0).max(0.0), RECT_PRECISION);
    let height = round_to((y1 - y0).max(0.0), RECT_PRECISION);
    let center = RelativePoint {
        x: round_to(left + width / 2.0, RECT_PRECISION),
        y: round_to(top + height / 2.0, RECT_PRECISION),
    };

    FaceRegion {
        id: face_region_id(photo_id, center),
        detector_face_id: face.face_id,
        attributes: face.face_attributes,
        rect: FaceRect {
            top,
            left,
            width,
            height,
            center,
        },
    }
}
