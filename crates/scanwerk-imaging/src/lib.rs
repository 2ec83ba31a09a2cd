// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-imaging — Everything that looks at pixels.
//
// Provides the owned raster type, the photo size filter, contour-based region
// extraction, the two-pass refinement crop, and the difference hash used as
// content identity.

pub mod contours;
pub mod geometry;
pub mod hash;
pub mod raster;
pub mod refine;

pub use contours::ContourExtractor;
pub use geometry::GeometryFilter;
pub use hash::ContentHasher;
pub use raster::{ImageInput, RasterImage};
pub use refine::RefinementCropper;
