// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-pipeline — Turns scan files into photo assets.
//
// `ScanDecomposer` splits one scan into content-addressed photos,
// `PhotoMetadataStage` describes one photo, and `JobOrchestrator` runs both
// over many inputs with bounded concurrency.

pub mod decompose;
pub mod metadata;
pub mod orchestrator;

pub use decompose::{ScanDecomposer, ScanOutcome};
pub use metadata::PhotoMetadataStage;
pub use orchestrator::{
    Job, JobHandler, JobKind, JobOrchestrator, PipelineHandler, Priority, RunMode, RunReport,
};

use scanwerk_core::error::{Result, ScanwerkError};

/// Run CPU-bound image work on the blocking pool.
pub(crate) async fn blocking<T, F>(stage: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ScanwerkError::TaskJoin(format!("{stage}: {e}")))?
}
