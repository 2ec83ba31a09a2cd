// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk output layout.
//
//   {photos}/{id}.png        extracted photo
//   {scans}/{scan_id}.png    archived scan
//   {meta}/{id}/data.json    photo metadata
//
// Files are written to a sibling temporary and renamed into place, so a
// reader never sees a half-written output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, instrument};

use scanwerk_core::config::OutputDirs;
use scanwerk_core::error::Result;
use scanwerk_core::types::ContentHash;

/// Resolves and writes output files.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    dirs: OutputDirs,
}

impl OutputLayout {
    pub fn new(dirs: OutputDirs) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &OutputDirs {
        &self.dirs
    }

    pub fn photo_path(&self, id: &ContentHash) -> PathBuf {
        self.dirs.photos.join(format!("{id}.png"))
    }

    pub fn scan_path(&self, scan_id: &ContentHash) -> PathBuf {
        self.dirs.scans.join(format!("{scan_id}.png"))
    }

    pub fn meta_path(&self, id: &ContentHash) -> PathBuf {
        self.dirs.meta.join(id.as_str()).join("data.json")
    }

    /// Create every output directory.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in self.dirs.all() {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Write `bytes` to `path`, creating parent directories.
    #[instrument(skip(bytes), fields(path = %path.display(), len = bytes.len()))]
    pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = temp_sibling(path);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("output written");
        Ok(())
    }

    /// Serialize `value` as pretty JSON to `path`.
    pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)?;
        Self::write_bytes(path, &json).await
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique per call, so concurrent writers of the same output never share a
/// temporary file.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}-{n}.tmp", std::process::id()));
    path.with_file_name(name)
}
