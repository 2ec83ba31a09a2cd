// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Source / imaging errors --
    #[error("unreadable source {}: {detail}", path.display())]
    UnreadableSource { path: PathBuf, detail: String },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("refinement failed for region {index}: second pass found no photo boundary")]
    RefinementFailed { index: usize },

    // -- Face detection service --
    #[error("face detection request failed: {0}")]
    FaceService(String),

    #[error("face detection service returned status {status}: {body}")]
    FaceServiceStatus { status: u16, body: String },

    #[error("face detection response could not be parsed: {0}")]
    FaceServiceResponse(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Runtime --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    TaskJoin(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
