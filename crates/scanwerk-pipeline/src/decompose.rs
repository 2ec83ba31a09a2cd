// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan decomposition.
//
// One scan in, zero or more photos out. Each photo is refined, hashed and
// written under its hash; the list of photos is cached under the scan's own
// hash so an unchanged scan is never processed twice.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use scanwerk_core::config::PipelineConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::taxonomy::failure_scope;
use scanwerk_core::types::{ContentHash, PhotoDescriptor, Region, ScanRecord};
use scanwerk_imaging::{ContentHasher, ContourExtractor, GeometryFilter, RasterImage, RefinementCropper};
use scanwerk_store::{CacheScope, ContentAddressedCache, OutputLayout};

use crate::blocking;

/// Result of decomposing one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub scan_id: ContentHash,
    pub photos: Vec<PhotoDescriptor>,
    /// Served from the cache without touching the pixels.
    pub from_cache: bool,
    /// Fewer photos than a scan normally holds were detected.
    pub under_detected: bool,
    /// Regions that were detected but produced no photo.
    pub failures: usize,
}

/// Image components shared with blocking tasks.
struct Imaging {
    extractor: ContourExtractor,
    filter: GeometryFilter,
    cropper: RefinementCropper,
    hasher: ContentHasher,
}

/// Splits scans into individual, content-addressed photos.
pub struct ScanDecomposer {
    imaging: Arc<Imaging>,
    cache: Arc<ContentAddressedCache>,
    layout: OutputLayout,
    use_cache: bool,
    archive_scans: bool,
    initial_rotation: u16,
    expected_photos: usize,
}

impl ScanDecomposer {
    pub fn new(config: &PipelineConfig, cache: Arc<ContentAddressedCache>, layout: OutputLayout) -> Self {
        let detection = &config.detection;
        let imaging = Imaging {
            extractor: ContourExtractor::new(detection.clone()),
            filter: GeometryFilter::from_config(detection),
            cropper: RefinementCropper::from_config(detection, config.refinement),
            hasher: ContentHasher::new(),
        };
        Self {
            imaging: Arc::new(imaging),
            cache,
            layout,
            use_cache: config.use_cache,
            archive_scans: config.archive_scans,
            initial_rotation: config.initial_rotation,
            expected_photos: config.expected_photos_per_scan,
        }
    }

    /// Decompose the scan at `path`.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn decompose(&self, path: &Path) -> Result<ScanOutcome> {
        let (scan, scan_id) = self.identify(path).await?;

        // Held until the record is written: a concurrent job for an identical
        // scan waits and then hits the cache.
        let _entry = self.cache.lock_entry(CacheScope::Scans, scan_id.as_str()).await?;

        if self.archive_scans {
            if let Err(e) = self.archive(&scan, &scan_id).await {
                warn!(scan_id = %scan_id, error = %e, "could not archive scan");
            }
        }

        if self.use_cache {
            if let Some(record) = self.cache.get::<ScanRecord>(CacheScope::Scans, scan_id.as_str())? {
                info!(scan_id = %scan_id, photos = record.photos.len(), "scan served from cache");
                return Ok(ScanOutcome {
                    under_detected: record.photos.len() < self.expected_photos,
                    scan_id,
                    photos: record.photos,
                    from_cache: true,
                    failures: 0,
                });
            }
        }

        let rotation = self.initial_rotation;
        let imaging = self.imaging.clone();
        let (scan, regions) = blocking("detect regions", move || {
            let scan = if rotation % 360 == 0 {
                scan
            } else {
                Arc::new((*scan).clone().rotate_quarter(rotation))
            };
            let regions = imaging.extractor.extract(&scan, &imaging.filter);
            Ok((scan, regions))
        })
        .await?;

        let under_detected = regions.len() < self.expected_photos;
        if under_detected {
            warn!(
                scan_id = %scan_id,
                found = regions.len(),
                expected = self.expected_photos,
                "fewer photos than expected"
            );
        }

        let mut photos = Vec::with_capacity(regions.len());
        let mut seen = HashSet::new();
        let mut failures = 0;

        for (index, region) in regions.into_iter().enumerate() {
            match self.extract_photo(scan.clone(), region, index).await {
                Ok(photo) => {
                    if seen.insert(photo.id.clone()) {
                        photos.push(photo);
                    } else {
                        warn!(scan_id = %scan_id, photo_id = %photo.id, index, "duplicate photo on scan, skipped");
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        scan_id = %scan_id,
                        index,
                        scope = failure_scope(&e).label(),
                        error = %e,
                        "photo skipped"
                    );
                }
            }
        }

        let record = ScanRecord {
            scan_id: scan_id.clone(),
            source: path.to_path_buf(),
            photos,
        };
        self.cache.put(CacheScope::Scans, scan_id.as_str(), &record)?;

        info!(scan_id = %scan_id, photos = record.photos.len(), failures, "scan decomposed");
        Ok(ScanOutcome {
            scan_id,
            photos: record.photos,
            from_cache: false,
            under_detected,
            failures,
        })
    }

    /// Re-save the scan at `path` under its content hash, regardless of
    /// the `archive_scans` setting.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn archive_file(&self, path: &Path) -> Result<ContentHash> {
        let (scan, scan_id) = self.identify(path).await?;
        self.archive(&scan, &scan_id).await?;
        Ok(scan_id)
    }

    /// Perceptual hash of an image file, ignoring its name.
    pub async fn content_hash(&self, path: &Path) -> Result<ContentHash> {
        let bytes = read_source(path).await?;
        let origin = path.to_path_buf();
        let imaging = self.imaging.clone();
        blocking("hash file", move || {
            let image = RasterImage::from_source_bytes(&bytes, &origin)?;
            Ok(imaging.hasher.hash(&image))
        })
        .await
    }

    /// Read and decode a scan and work out its id: the file stem when it is
    /// already a content hash, the perceptual hash otherwise.
    async fn identify(&self, path: &Path) -> Result<(Arc<RasterImage>, ContentHash)> {
        let bytes = read_source(path).await?;
        let origin = path.to_path_buf();
        let stem_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(ContentHash::from_stem);
        let imaging = self.imaging.clone();

        let (scan, scan_id) = blocking("decode scan", move || {
            let scan = RasterImage::from_source_bytes(&bytes, &origin)?;
            let id = match stem_id {
                Some(id) => id,
                None => imaging.hasher.hash(&scan),
            };
            Ok((Arc::new(scan), id))
        })
        .await?;

        debug!(scan_id = %scan_id, width = scan.width(), height = scan.height(), "scan decoded");
        Ok((scan, scan_id))
    }

    /// Write `{scans}/{scan_id}.png` unless it already exists.
    async fn archive(&self, scan: &Arc<RasterImage>, scan_id: &ContentHash) -> Result<()> {
        let target = self.layout.scan_path(scan_id);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(());
        }
        let scan = scan.clone();
        let png = blocking("encode scan", move || scan.to_png_bytes()).await?;
        OutputLayout::write_bytes(&target, &png).await?;
        info!(scan_id = %scan_id, path = %target.display(), "scan archived");
        Ok(())
    }

    /// Refine, hash and write the photo in `region`.
    async fn extract_photo(&self, scan: Arc<RasterImage>, region: Region, index: usize) -> Result<PhotoDescriptor> {
        let imaging = self.imaging.clone();
        let (id, png) = blocking("refine photo", move || {
            let photo = imaging
                .cropper
                .refine(&scan, &region)
                .ok_or(ScanwerkError::RefinementFailed { index })?;
            let id = imaging.hasher.hash(&photo);
            Ok((id, photo.to_png_bytes()?))
        })
        .await?;

        let path = self.layout.photo_path(&id);
        OutputLayout::write_bytes(&path, &png).await?;
        debug!(photo_id = %id, index, "photo written");

        Ok(PhotoDescriptor {
            id,
            source_region: region,
            path,
        })
    }
}

async fn read_source(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ScanwerkError::UnreadableSource {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}
