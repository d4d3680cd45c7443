//! Geometric primitives.
//!
//! Pure math with no state: axis-aligned bounds, planes, triangles with
//! barycentric coordinates, ray/segment intersection against triangles and
//! quads, 2D polygon helpers built on `geo`, and an angular-sweep visibility
//! polygon.

/// Axis-aligned 2D bounding rectangles.
pub mod bounds;
/// Infinite planes and ray/plane intersection.
pub mod plane;
/// 2D polygon helpers over `geo` boolean operations.
pub mod polygon;
/// Planar quadrilaterals and ray/quad intersection.
pub mod quad;
/// 2D segment intersection and distance tests.
pub mod segment;
/// Angular-sweep visibility polygons.
pub mod sweep;
/// Triangles, barycentric coordinates and ray/triangle intersection.
pub mod triangle;

pub use bounds::Bounds2;
pub use plane::Plane;
pub use quad::Quad3;
pub use triangle::{Barycentric, RayHit, Triangle3};

/// General-purpose tolerance for geometric predicates.
pub const EPSILON: f64 = 1e-9;

/// Returns `true` when `a` and `b` differ by less than `tolerance`.
#[inline]
#[must_use]
pub fn almost_equal(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}
