// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Photo metadata stage: aspect ratio, faces, display transform and a tiny
// blurred placeholder, cached and written as `{meta}/{id}/data.json`.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, info, instrument};

use scanwerk_core::config::PipelineConfig;
use scanwerk_core::error::Result;
use scanwerk_core::types::{ContentHash, PhotoMetadata, Transform};
use scanwerk_faces::{FaceDetectionService, FaceSearchOutcome, RotationSearchFaceLocator};
use scanwerk_imaging::{ContentHasher, RasterImage};
use scanwerk_store::{CacheScope, ContentAddressedCache, OutputLayout};

use crate::blocking;

/// Blur applied to the placeholder image.
const PLACEHOLDER_BLUR_SIGMA: f32 = 1.5;

/// Describes extracted photos.
pub struct PhotoMetadataStage<S> {
    cache: Arc<ContentAddressedCache>,
    layout: OutputLayout,
    locator: Option<RotationSearchFaceLocator<S>>,
    use_cache: bool,
    placeholder_width: u32,
}

impl<S: FaceDetectionService> PhotoMetadataStage<S> {
    /// `locator` is `None` when no face service is configured; photos are
    /// then described without faces.
    pub fn new(
        config: &PipelineConfig,
        cache: Arc<ContentAddressedCache>,
        layout: OutputLayout,
        locator: Option<RotationSearchFaceLocator<S>>,
    ) -> Self {
        Self {
            cache,
            layout,
            locator,
            use_cache: config.use_cache,
            placeholder_width: config.placeholder_width,
        }
    }

    /// Describe the photo at `path`. A face service failure fails the
    /// photo; nothing is cached or written in that case.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process(&self, path: &Path) -> Result<PhotoMetadata> {
        let photo = {
            let path = path.to_path_buf();
            blocking("load photo", move || RasterImage::open(path)).await?
        };
        let photo = Arc::new(photo);

        let id = match path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(ContentHash::from_stem)
        {
            Some(id) => id,
            None => {
                let photo = photo.clone();
                blocking("hash photo", move || Ok(ContentHasher::new().hash(&photo))).await?
            }
        };

        let _entry = self.cache.lock_entry(CacheScope::Photos, id.as_str()).await?;

        if self.use_cache {
            if let Some(meta) = self.cache.get::<PhotoMetadata>(CacheScope::Photos, id.as_str())? {
                // The site tree may have been cleaned since the entry was cached.
                OutputLayout::write_json(&self.layout.meta_path(&id), &meta).await?;
                debug!(photo_id = %id, "metadata served from cache");
                return Ok(meta);
            }
        }

        let (width, height) = photo.dimensions();
        let aspect_ratio = width as f64 / height.max(1) as f64;

        let search = match &self.locator {
            Some(locator) => locator.locate(&id, &photo).await?,
            None => FaceSearchOutcome::default(),
        };

        let placeholder = {
            let photo = photo.clone();
            let width = self.placeholder_width;
            let transform = search.transform;
            blocking("placeholder", move || placeholder_uri(&photo, width, transform)).await?
        };

        let meta = PhotoMetadata {
            id: id.clone(),
            image: path.to_path_buf(),
            aspect_ratio,
            placeholder,
            transform: search.transform,
            faces: search.faces,
            people: None,
            date: None,
            location: None,
        };

        self.cache.put(CacheScope::Photos, id.as_str(), &meta)?;
        OutputLayout::write_json(&self.layout.meta_path(&id), &meta).await?;

        info!(photo_id = %id, faces = meta.faces.len(), "photo described");
        Ok(meta)
    }
}

/// Tiny blurred PNG of the photo, turned to its display orientation, as a
/// `data:` URI.
pub fn placeholder_uri(photo: &RasterImage, width: u32, transform: Option<Transform>) -> Result<String> {
    let small = photo.resize_to_width(width.max(1));
    let turned = match transform {
        Some(t) => small.rotate_quarter(t.rotate),
        None => small,
    };
    let png = turned.blur(PLACEHOLDER_BLUR_SIGMA).to_png_bytes()?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
