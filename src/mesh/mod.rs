//! Placeable geometry adapters.
//!
//! Each placeable kind maps to a unit template from the
//! [`TemplateRegistry`] plus a per-instance transform (walls, tiles,
//! rectangular tokens, grid cells), or to a prism extruded from a polygon
//! (constrained and lit tokens, regions). [`MeshCache`] keeps the resulting
//! world-space triangles and rebuilds one only when its document changes.

mod cache;
mod geometry;
mod template;

pub use cache::{MeshCache, PlaceableKey, TokenShape};
pub use geometry::{
    box_geometry, region_geometry, tile_geometry, token_geometry, wall_geometry,
    PlaceableGeometry, PlaceableMesh,
};
pub use template::{Template, TemplateKey, TemplateRegistry};
