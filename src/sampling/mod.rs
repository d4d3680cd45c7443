//! Sample point schemes.
//!
//! The same schemes place eye points on a viewer and sample points on a
//! target: the center, the two corners facing a reference point (plus the
//! center for three), the four corners (plus the center for five), or the
//! corners, edge midpoints and center for nine. Corners are pulled toward
//! the center by an inset fraction of the half extent.

use glam::{DVec2, DVec3};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{geometry::Bounds2, scene::Grid};

/// Which points of a rectangle to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PointScheme {
    /// The center only.
    #[default]
    Center,
    /// The two corners nearest the reference point.
    Two,
    /// The two nearest corners and the center.
    Three,
    /// The four corners.
    Four,
    /// The four corners and the center.
    Five,
    /// Corners, edge midpoints and center.
    Nine,
}

impl PointScheme {
    /// Number of points the scheme produces.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Center => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Nine => 9,
        }
    }
}

/// Points of `bounds` under `scheme`.
///
/// `inset` is the fraction of the half extent by which corners and edge
/// midpoints move toward the center (clamped to `[0, 1]`). `reference`
/// picks the facing corners for the two- and three-point schemes.
#[must_use]
pub fn rect_points(
    bounds: &Bounds2,
    scheme: PointScheme,
    inset: f64,
    reference: DVec2,
) -> Vec<DVec2> {
    let center = bounds.center();
    let half = DVec2::new(bounds.width(), bounds.height()) * 0.5 * (1.0 - inset.clamp(0.0, 1.0));
    let corners = [
        center + DVec2::new(-half.x, -half.y),
        center + DVec2::new(half.x, -half.y),
        center + DVec2::new(half.x, half.y),
        center + DVec2::new(-half.x, half.y),
    ];
    let facing = || {
        let mut sorted = corners;
        sorted.sort_by(|a, b| {
            a.distance_squared(reference)
                .total_cmp(&b.distance_squared(reference))
        });
        [sorted[0], sorted[1]]
    };
    match scheme {
        PointScheme::Center => vec![center],
        PointScheme::Two => facing().to_vec(),
        PointScheme::Three => {
            let [a, b] = facing();
            vec![center, a, b]
        }
        PointScheme::Four => corners.to_vec(),
        PointScheme::Five => {
            let mut points = vec![center];
            points.extend(corners);
            points
        }
        PointScheme::Nine => {
            let mut points = vec![center];
            points.extend(corners);
            points.extend([
                center + DVec2::new(0.0, -half.y),
                center + DVec2::new(half.x, 0.0),
                center + DVec2::new(0.0, half.y),
                center + DVec2::new(-half.x, 0.0),
            ]);
            points
        }
    }
}

/// Sample points per grid cell of `bounds`, one group per cell.
#[must_use]
pub fn grid_cell_points(
    grid: &Grid,
    bounds: &Bounds2,
    scheme: PointScheme,
    inset: f64,
    reference: DVec2,
) -> Vec<Vec<DVec2>> {
    grid.cells(bounds)
        .iter()
        .map(|cell| rect_points(cell, scheme, inset, reference))
        .collect()
}

/// Lift 2D points into 3D.
///
/// With `three_d`, each point is duplicated near the bottom and top of the
/// `[bottom, top]` range (pulled inward by the same inset fraction);
/// otherwise it sits at mid height.
#[must_use]
pub fn lift_points(
    points: &[DVec2],
    bottom: f64,
    top: f64,
    inset: f64,
    three_d: bool,
) -> Vec<DVec3> {
    let mid = (bottom + top) * 0.5;
    if !three_d || top <= bottom {
        return points.iter().map(|p| p.extend(mid)).collect();
    }
    let offset = (top - bottom) * 0.5 * inset.clamp(0.0, 1.0);
    points
        .iter()
        .flat_map(|p| [p.extend(top - offset), p.extend(bottom + offset)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Bounds2 {
        Bounds2::from_origin_size(DVec2::ZERO, DVec2::splat(100.0))
    }

    #[test]
    fn counts_match_scheme() {
        for scheme in [
            PointScheme::Center,
            PointScheme::Two,
            PointScheme::Three,
            PointScheme::Four,
            PointScheme::Five,
            PointScheme::Nine,
        ] {
            assert_eq!(rect_points(&square(), scheme, 0.1, DVec2::ZERO).len(), scheme.count());
        }
    }

    #[test]
    fn inset_pulls_corners_in() {
        let pts = rect_points(&square(), PointScheme::Four, 0.5, DVec2::ZERO);
        assert_eq!(pts[0], DVec2::splat(25.0));
        assert_eq!(pts[2], DVec2::splat(75.0));
    }

    #[test]
    fn two_points_face_reference() {
        let pts = rect_points(&square(), PointScheme::Two, 0.0, DVec2::new(500.0, 50.0));
        assert!(pts.iter().all(|p| p.x == 100.0));
    }

    #[test]
    fn grid_cells_each_get_points() {
        let bounds = Bounds2::from_origin_size(DVec2::ZERO, DVec2::new(200.0, 100.0));
        let groups =
            grid_cell_points(&Grid::default(), &bounds, PointScheme::Center, 0.0, DVec2::ZERO);
        assert_eq!(groups, vec![vec![DVec2::splat(50.0)], vec![DVec2::new(150.0, 50.0)]]);
    }

    #[test]
    fn lifting() {
        let flat = lift_points(&[DVec2::ZERO], 0.0, 100.0, 0.0, false);
        assert_eq!(flat, vec![DVec3::new(0.0, 0.0, 50.0)]);
        let tall = lift_points(&[DVec2::ZERO], 0.0, 100.0, 0.2, true);
        assert_eq!(tall, vec![DVec3::new(0.0, 0.0, 90.0), DVec3::new(0.0, 0.0, 10.0)]);
    }
}
