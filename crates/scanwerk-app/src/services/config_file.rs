// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration file persistence.

use std::path::Path;

use scanwerk_core::PipelineConfig;
use scanwerk_core::error::Result;
use tracing::{info, warn};

/// Load the configuration at `path`, falling back to defaults. A missing
/// file is created with the defaults so it can be edited; a malformed one
/// is left alone.
pub fn load_or_init(path: &Path) -> PipelineConfig {
    if let Some(config) = load_config(path) {
        return config;
    }
    let config = PipelineConfig::default();
    if !path.exists() {
        match persist_config(path, &config) {
            Ok(()) => info!(path = %path.display(), "wrote default configuration"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not write default configuration"),
        }
    }
    config
}

pub fn load_config(path: &Path) -> Option<PipelineConfig> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed configuration");
            None
        }
    }
}

pub fn persist_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
