// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Photo geometry — the size-class filter and the minimum-area rectangle of a
// contour.

use imageproc::point::Point;
use scanwerk_core::config::{DetectionConfig, SizeClass};
use scanwerk_core::types::Region;

/// Accepts regions whose area and aspect ratio match one of the configured
/// photo size classes.
///
/// Both checks use a relative band `target * (1 ± tolerance)`, inclusive at
/// both ends. Area and aspect ratio must match the *same* class.
#[derive(Debug, Clone)]
pub struct GeometryFilter {
    classes: Vec<SizeClass>,
    resolution: f64,
    tolerance: f64,
}

impl GeometryFilter {
    pub fn new(classes: Vec<SizeClass>, resolution: f64, tolerance: f64) -> Self {
        Self {
            classes,
            resolution,
            tolerance,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.size_classes.clone(),
            config.resolution,
            config.tolerance,
        )
    }

    /// Whether `region` looks like one of the known photo sizes.
    pub fn matches(&self, region: &Region) -> bool {
        self.matching_class(region).is_some()
    }

    /// Index of the first size class `region` fits.
    pub fn matching_class(&self, region: &Region) -> Option<usize> {
        let aspect = region.aspect_ratio();
        self.classes.iter().position(|class| {
            is_around(region.area, class.pixel_area(self.resolution), self.tolerance)
                && is_around(aspect, class.aspect_ratio(), self.tolerance)
        })
    }

    /// Inclusive pixel-area band of size class `index`.
    pub fn area_band(&self, index: usize) -> Option<(f64, f64)> {
        let target = self.classes.get(index)?.pixel_area(self.resolution);
        Some(band(target, self.tolerance))
    }
}

fn band(target: f64, tolerance: f64) -> (f64, f64) {
    (target * (1.0 - tolerance), target * (1.0 + tolerance))
}

fn is_around(value: f64, target: f64, tolerance: f64) -> bool {
    let (low, high) = band(target, tolerance);
    value >= low && value <= high
}

// -- Rotated rectangles -------------------------------------------------------

/// Minimum-area enclosing rectangle of a point set.
///
/// `angle` is the direction of the `width` edge in degrees, measured in image
/// coordinates (y grows downwards, so positive angles tilt clockwise on
/// screen). Not yet canonical; see [`canonicalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

/// Fold a rectangle description into the canonical form used by [`Region`]:
/// the angle lies in (-45, 45] and width/height are swapped whenever the
/// angle had to move by a quarter turn.
pub fn canonicalize(angle: f64, width: f64, height: f64) -> (f64, f64, f64) {
    let mut angle = (angle + 90.0).rem_euclid(180.0) - 90.0;
    let (mut width, mut height) = (width, height);
    if angle <= -45.0 {
        angle += 90.0;
        std::mem::swap(&mut width, &mut height);
    } else if angle > 45.0 {
        angle -= 90.0;
        std::mem::swap(&mut width, &mut height);
    }
    (angle, width, height)
}

/// Minimum-area rectangle enclosing `points`, read off the four corners
/// imageproc reports in [top-left, top-right, bottom-right, bottom-left]
/// order: `width` is the first edge, `height` the second and `angle` the
/// direction of the first edge. `None` for an empty or degenerate point set.
pub fn min_area_rect(points: &[Point<i32>]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }
    let [c0, c1, c2, _] = imageproc::geometry::min_area_rect(points);
    let (ex, ey) = ((c1.x - c0.x) as f64, (c1.y - c0.y) as f64);
    let width = ex.hypot(ey);
    let height = ((c2.x - c1.x) as f64).hypot((c2.y - c1.y) as f64);
    if width < f64::EPSILON || height < f64::EPSILON {
        return None;
    }
    Some(RotatedRect {
        width,
        height,
        angle: ey.atan2(ex).to_degrees(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::types::PixelPoint;

    fn region(width: u32, height: u32, area: f64) -> Region {
        Region {
            angle: 0.0,
            width,
            height,
            center: PixelPoint { x: 0, y: 0 },
            area,
        }
    }

    fn square_filter() -> GeometryFilter {
        GeometryFilter::new(vec![SizeClass::new(4.0, 4.1, 16.4)], 10.0, 0.1)
    }

    #[test]
    fn area_band_is_inclusive() {
        let filter = square_filter();
        let (low, high) = filter.area_band(0).expect("class 0");

        assert!(filter.matches(&region(40, 41, low)));
        assert!(filter.matches(&region(40, 41, high)));
        assert!(!filter.matches(&region(40, 41, low - 1.0)));
        assert!(!filter.matches(&region(40, 41, high + 1.0)));
    }

    #[test]
    fn aspect_must_match_the_same_class() {
        let filter = GeometryFilter::from_config(&DetectionConfig {
            resolution: 10.0,
            ..Default::default()
        });
        // Area of the square class with the aspect ratio of nothing we know.
        assert!(!filter.matches(&region(60, 27, 1640.0)));
        assert_eq!(filter.matching_class(&region(40, 41, 1640.0)), Some(0));
        assert_eq!(filter.matching_class(&region(35, 42, 1470.0)), Some(1));
    }

    #[test]
    fn canonical_angle_is_in_half_open_range() {
        let mut angle = -90.0;
        while angle < 90.0 {
            let (a, w, h) = canonicalize(angle, 10.0, 20.0);
            assert!(a > -45.0 && a <= 45.0, "angle {angle} folded to {a}");
            let swapped = !(-45.0 < angle && angle <= 45.0);
            assert_eq!((w, h) == (20.0, 10.0), swapped, "angle {angle}");
            angle += 0.25;
        }
    }

    #[test]
    fn canonicalize_quarter_turn() {
        assert_eq!(canonicalize(-90.0, 30.0, 50.0), (0.0, 50.0, 30.0));
        assert_eq!(canonicalize(-45.0, 30.0, 50.0), (45.0, 50.0, 30.0));
        assert_eq!(canonicalize(180.0, 30.0, 50.0), (0.0, 30.0, 50.0));
    }

    fn pt(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    #[test]
    fn axis_aligned_rectangle() {
        let pts = [pt(0, 0), pt(40, 0), pt(40, 20), pt(0, 20), pt(20, 10)];
        let rect = min_area_rect(&pts).expect("rect");
        let (angle, w, h) = canonicalize(rect.angle, rect.width, rect.height);
        assert!(angle.abs() < 1e-9);
        assert!((w - 40.0).abs() < 1e-9);
        assert!((h - 20.0).abs() < 1e-9);
    }

    #[test]
    fn tilted_rectangle_recovers_angle() {
        let (w, h, tilt) = (120.0f64, 60.0f64, 12.0f64.to_radians());
        let (c, s) = (tilt.cos(), tilt.sin());
        // Outline of the tilted rectangle, sampled along each edge.
        let corners = [(-w / 2.0, -h / 2.0), (w / 2.0, -h / 2.0), (w / 2.0, h / 2.0), (-w / 2.0, h / 2.0)];
        let mut pts = Vec::new();
        for i in 0..4 {
            let (ax, ay) = corners[i];
            let (bx, by) = corners[(i + 1) % 4];
            for step in 0..20 {
                let t = step as f64 / 20.0;
                let (x, y) = (ax + (bx - ax) * t, ay + (by - ay) * t);
                pts.push(pt(
                    (200.0 + x * c - y * s).round() as i32,
                    (200.0 + x * s + y * c).round() as i32,
                ));
            }
        }

        let rect = min_area_rect(&pts).expect("rect");
        let (angle, rw, rh) = canonicalize(rect.angle, rect.width, rect.height);
        assert!((angle - 12.0).abs() < 1.5, "angle {angle}");
        assert!((rw - w).abs() < 3.0, "width {rw}");
        assert!((rh - h).abs() < 3.0, "height {rh}");
    }

    #[test]
    fn degenerate_inputs_have_no_rect() {
        assert!(min_area_rect(&[]).is_none());
        assert!(min_area_rect(&[pt(3, 4)]).is_none());
        assert!(min_area_rect(&[pt(0, 0), pt(5, 5)]).is_none());
    }
}
