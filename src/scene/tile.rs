use glam::{DMat4, DQuat, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::{Placeable, TileId};
use crate::geometry::Bounds2;

/// Per-texel alpha of a tile texture, row-major from the top-left.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlphaMask {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// `width * height` alpha values.
    pub alpha: Vec<u8>,
}

impl AlphaMask {
    /// Mask from raw alpha values. Returns `None` if the length does not
    /// match the dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32, alpha: Vec<u8>) -> Option<Self> {
        (width > 0 && height > 0 && alpha.len() == (width * height) as usize).then_some(Self {
            width,
            height,
            alpha,
        })
    }

    /// Alpha in `[0, 1]` at texture coordinate `uv` (nearest texel, clamped).
    #[must_use]
    pub fn sample(&self, uv: DVec2) -> f64 {
        let x = ((uv.x * f64::from(self.width)).floor() as i64).clamp(0, i64::from(self.width) - 1);
        let y = ((uv.y * f64::from(self.height)).floor() as i64)
            .clamp(0, i64::from(self.height) - 1);
        let idx = (y * i64::from(self.width) + x) as usize;
        self.alpha.get(idx).map_or(0.0, |a| f64::from(*a) / 255.0)
    }

    /// UV rectangle enclosing every texel with alpha at or above `threshold`.
    /// `None` when the mask is fully transparent at that threshold.
    #[must_use]
    pub fn alpha_bounds(&self, threshold: f64) -> Option<Bounds2> {
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0_u32, 0_u32);
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                let a = f64::from(self.alpha[(y * self.width + x) as usize]) / 255.0;
                if a >= threshold {
                    any = true;
                    min = (min.0.min(x), min.1.min(y));
                    max = (max.0.max(x + 1), max.1.max(y + 1));
                }
            }
        }
        any.then(|| {
            let w = f64::from(self.width);
            let h = f64::from(self.height);
            Bounds2::new(
                DVec2::new(f64::from(min.0) / w, f64::from(min.1) / h),
                DVec2::new(f64::from(max.0) / w, f64::from(max.1) / h),
            )
        })
    }
}

/// A horizontal image placed in the scene. Only overhead tiles block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tile {
    /// Scene-unique identifier.
    pub id: TileId,
    /// Left edge before rotation.
    pub x: f64,
    /// Top edge before rotation.
    pub y: f64,
    /// Width in scene units.
    pub width: f64,
    /// Height in scene units.
    pub height: f64,
    /// Rotation about the center in degrees.
    pub rotation: f64,
    /// Elevation of the tile plane.
    pub elevation: f64,
    /// Overhead (roof) tile.
    pub overhead: bool,
    /// Texture alpha; `None` means fully opaque.
    pub alpha: Option<AlphaMask>,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            id: TileId(0),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            rotation: 0.0,
            elevation: 0.0,
            overhead: true,
            alpha: None,
        }
    }
}

impl Tile {
    /// Center of the tile.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Maps unit UV space (`[0,1]²`, v pointing down the image) onto the
    /// tile plane in world space.
    #[must_use]
    pub fn uv_to_world(&self) -> DMat4 {
        let c = self.center();
        DMat4::from_translation(DVec3::new(c.x, c.y, self.elevation))
            * DMat4::from_quat(DQuat::from_rotation_z(self.rotation.to_radians()))
            * DMat4::from_scale(DVec3::new(self.width, self.height, 1.0))
            * DMat4::from_translation(DVec3::new(-0.5, -0.5, 0.0))
    }

    /// UV rectangle that blocks at `threshold`; the full tile without a mask.
    #[must_use]
    pub fn opaque_uv_bounds(&self, threshold: f64) -> Option<Bounds2> {
        match &self.alpha {
            None => Some(Bounds2::new(DVec2::ZERO, DVec2::ONE)),
            Some(mask) => mask.alpha_bounds(threshold),
        }
    }

    /// World-space corners of the alpha bounding box, in winding order.
    #[must_use]
    pub fn opaque_corners(&self, threshold: f64) -> Option<[DVec2; 4]> {
        let uv = self.opaque_uv_bounds(threshold)?;
        let m = self.uv_to_world();
        Some(uv.corners().map(|p| m.transform_point3(p.extend(0.0)).truncate()))
    }

    /// Returns `true` if the texel at `uv` blocks at `threshold`.
    #[must_use]
    pub fn is_opaque_at(&self, uv: DVec2, threshold: f64) -> bool {
        self.alpha
            .as_ref()
            .is_none_or(|mask| mask.sample(uv) >= threshold)
    }
}

impl Placeable for Tile {
    type Id = TileId;

    fn id(&self) -> TileId {
        self.id
    }

    fn bounds(&self) -> Bounds2 {
        let m = self.uv_to_world();
        let corners = Bounds2::new(DVec2::ZERO, DVec2::ONE)
            .corners()
            .map(|p| m.transform_point3(p.extend(0.0)).truncate());
        Bounds2::from_points(&corners).unwrap_or_else(|| Bounds2::new(self.center(), self.center()))
    }

    fn layer(scene: &super::Scene) -> &super::Layer<Self> {
        &scene.tiles
    }

    fn layer_mut(scene: &mut super::Scene) -> &mut super::Layer<Self> {
        &mut scene.tiles
    }
}
