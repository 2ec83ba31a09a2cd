// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens the cache, prepares the output directories
// and builds the pipeline stages for each command.
//
// The cache connection sits behind a mutex inside `ContentAddressedCache`,
// so one `Arc` is shared by every stage and worker.

use std::path::PathBuf;
use std::sync::Arc;

use scanwerk_core::PipelineConfig;
use scanwerk_core::error::Result;
use scanwerk_core::types::ContentHash;
use scanwerk_faces::{HttpFaceDetector, RateGate, RotationSearchFaceLocator};
use scanwerk_pipeline::{
    JobOrchestrator, PhotoMetadataStage, PipelineHandler, RunMode, RunReport, ScanDecomposer,
};
use scanwerk_store::{ContentAddressedCache, OutputLayout};
use tracing::{info, warn};

pub struct AppServices {
    config: PipelineConfig,
    cache: Arc<ContentAddressedCache>,
    layout: OutputLayout,
}

impl AppServices {
    /// Validate the configuration, open the cache and create the output
    /// directories.
    pub async fn init(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let cache_path = config.cache_db_path();
        let cache = ContentAddressedCache::open(&cache_path)?;
        let layout = OutputLayout::new(config.dest.clone());
        layout.ensure_dirs().await?;

        info!(
            cache = %cache_path.display(),
            photos = %config.dest.photos.display(),
            use_cache = config.use_cache,
            "services initialised"
        );

        Ok(Self {
            config,
            cache: Arc::new(cache),
            layout,
        })
    }

    fn decomposer(&self) -> ScanDecomposer {
        ScanDecomposer::new(&self.config, self.cache.clone(), self.layout.clone())
    }

    /// Face locator for the configured service, or `None` without an API key.
    fn face_locator(&self) -> Result<Option<RotationSearchFaceLocator<HttpFaceDetector>>> {
        let faces = &self.config.faces;
        match HttpFaceDetector::from_env(faces)? {
            Some(detector) => {
                let gate = Arc::new(RateGate::from_millis(faces.min_interval_ms));
                Ok(Some(RotationSearchFaceLocator::new(detector, gate, faces)))
            }
            None => {
                warn!(
                    variable = %faces.api_key_env,
                    "no face service key set; photos are described without faces"
                );
                Ok(None)
            }
        }
    }

    // -- Commands ------------------------------------------------------------

    /// Run the pipeline over `inputs` in `mode`.
    pub async fn build(&self, mode: RunMode, inputs: Vec<PathBuf>) -> Result<RunReport> {
        let locator = match mode {
            RunMode::Scans => None,
            RunMode::All | RunMode::Photos => self.face_locator()?,
        };
        let metadata = PhotoMetadataStage::new(&self.config, self.cache.clone(), self.layout.clone(), locator);
        let handler = PipelineHandler::new(self.decomposer(), metadata, mode);

        info!(inputs = inputs.len(), ?mode, "starting run");
        JobOrchestrator::new(Arc::new(handler), self.config.concurrency)
            .run(mode.initial_jobs(inputs))
            .await
    }

    /// Content hash of each input, in order.
    pub async fn hash(&self, inputs: Vec<PathBuf>) -> Vec<(PathBuf, Result<ContentHash>)> {
        let decomposer = self.decomposer();
        let mut results = Vec::with_capacity(inputs.len());
        for path in inputs {
            let id = decomposer.content_hash(&path).await;
            results.push((path, id));
        }
        results
    }

    /// Re-save each input scan under its content hash.
    pub async fn archive(&self, inputs: Vec<PathBuf>) -> Vec<(PathBuf, Result<ContentHash>)> {
        let decomposer = self.decomposer();
        let mut results = Vec::with_capacity(inputs.len());
        for path in inputs {
            let id = decomposer.archive_file(&path).await;
            results.push((path, id));
        }
        results
    }
}
