// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failure taxonomy.
//
// Maps every error to the unit of work it is fatal to. The orchestrator uses
// this to decide what to log and what to count; nothing short of `Run`
// stops sibling work.

use crate::error::ScanwerkError;

/// The unit of work an error aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// The scan cannot be read or decoded; its photos are never produced.
    Scan,
    /// A single photo could not be refined, hashed or written.
    Photo,
    /// The face search for one photo failed; the extracted photo is kept.
    FaceDiscovery,
    /// Environment-level fault: nothing further can be trusted.
    Run,
}

impl FailureScope {
    /// Short stage label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Photo => "photo",
            Self::FaceDiscovery => "face-discovery",
            Self::Run => "run",
        }
    }
}

/// Classify an error by the work it invalidates.
pub fn failure_scope(err: &ScanwerkError) -> FailureScope {
    match err {
        ScanwerkError::UnreadableSource { .. } => FailureScope::Scan,

        ScanwerkError::ImageError(_) | ScanwerkError::RefinementFailed { .. } => {
            FailureScope::Photo
        }

        ScanwerkError::FaceService(_)
        | ScanwerkError::FaceServiceStatus { .. }
        | ScanwerkError::FaceServiceResponse(_) => FailureScope::FaceDiscovery,

        // A failed write loses one output file; rerunning recreates it.
        ScanwerkError::Io(_) | ScanwerkError::Serialization(_) => FailureScope::Photo,

        ScanwerkError::Database(_) | ScanwerkError::Config(_) | ScanwerkError::TaskJoin(_) => {
            FailureScope::Run
        }
    }
}

/// Whether the failure should stop the whole run.
pub fn is_fatal(err: &ScanwerkError) -> bool {
    failure_scope(err) == FailureScope::Run
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unreadable_source_is_scan_scoped() {
        let err = ScanwerkError::UnreadableSource {
            path: PathBuf::from("scan.tif"),
            detail: "truncated".into(),
        };
        assert_eq!(failure_scope(&err), FailureScope::Scan);
        assert!(!is_fatal(&err));
    }

    #[test]
    fn refinement_is_photo_scoped() {
        let err = ScanwerkError::RefinementFailed { index: 2 };
        assert_eq!(failure_scope(&err), FailureScope::Photo);
    }

    #[test]
    fn service_errors_only_affect_face_discovery() {
        let err = ScanwerkError::FaceServiceStatus {
            status: 429,
            body: "rate limit".into(),
        };
        assert_eq!(failure_scope(&err), FailureScope::FaceDiscovery);
        assert_eq!(failure_scope(&err).label(), "face-discovery");
    }

    #[test]
    fn database_failure_is_fatal() {
        assert!(is_fatal(&ScanwerkError::Database("disk full".into())));
    }
}
