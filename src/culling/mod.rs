//! Vision-frustum culling.
//!
//! Narrows the scene down to the placeables that could occlude one eye's
//! view of one target: build the [`VisionPolygon`] between them, query each
//! layer's spatial index with its bounds, then filter by sense rules,
//! elevation band and exact 2D intersection.

mod blocking;
mod vision;

pub use blocking::{find_blocking_objects, token_blocks, BlockingObjects};
pub use vision::VisionPolygon;
