// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-faces — Face discovery on extracted photos.
//
// A remote detection service is queried through the `FaceDetectionService`
// trait, throttled by a process-wide `RateGate`. Photos scanned sideways or
// upside down are found by retrying the query at each quarter turn.

pub mod locator;
pub mod rate_gate;
pub mod service;

pub use locator::{FaceSearchOutcome, RotationSearchFaceLocator};
pub use rate_gate::RateGate;
pub use service::{DetectedFace, FaceDetectionService, FaceRectangle, HttpFaceDetector};
