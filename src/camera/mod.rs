//! Occlusion-test camera.
//!
//! A look-at camera placed at a viewpoint and aimed at a target, with a
//! field of view fitted to the target's bounding box. Only the pieces the
//! visibility calculators need: view, projection and frustum.

/// Look-at camera with dirty-flagged matrices.
pub mod core;
/// View frustum extraction and intersection tests.
pub mod frustum;

pub use self::core::{Camera, Projection, MAX_FOV_DEGREES, MIN_FOV_DEGREES};
pub use frustum::Frustum;
