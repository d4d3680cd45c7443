//! Fragment-counting visibility.
//!
//! The target and its blockers are projected into the eye's clip space once
//! per calculation ([`RasterFrame`]); a backend then renders three passes and
//! counts pixels:
//!
//! 1. the full target alone, the reference count;
//! 2. for large targets, one grid cell's box alone;
//! 3. the visible target, then every blocker depth-tested against it.
//!
//! A target pixel is blocked when an opaque blocker lies in front of it, or
//! when two or more distinct terrain walls do.

#[cfg(feature = "gpu")]
pub mod gpu;
mod software;

use glam::{DMat4, DVec2, DVec4};
pub use software::SoftwareRasterizer;

use super::{occluders::Occluders, CalcContext, PercentVisibleResult, VisibilityData};
use crate::{
    camera::Frustum,
    error::SightlineError,
    mesh::{MeshCache, PlaceableMesh},
    options::RasterBackend,
    scene::{Tile, TokenId},
};

/// One triangle in clip space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipTriangle {
    /// Homogeneous clip-space corners.
    pub positions: [DVec4; 3],
    /// Texture coordinates per corner, for alpha-masked tiles.
    pub uvs: Option<[DVec2; 3]>,
}

/// Triangles of one opaque blocker.
#[derive(Debug, Clone)]
pub struct RasterLayer<'a> {
    /// Clip-space triangles.
    pub triangles: Vec<ClipTriangle>,
    /// Tile whose alpha mask gates coverage.
    pub tile: Option<&'a Tile>,
}

/// Everything the backends draw for one eye.
#[derive(Debug, Clone, Default)]
pub struct RasterFrame<'a> {
    /// The full target, for the reference count.
    pub reference: Vec<ClipTriangle>,
    /// One grid cell's box, for large targets.
    pub cell: Option<Vec<ClipTriangle>>,
    /// The visible part of the target.
    pub target: Vec<ClipTriangle>,
    /// Opaque blockers.
    pub opaque: Vec<RasterLayer<'a>>,
    /// Terrain walls, one entry per wall.
    pub terrain: Vec<Vec<ClipTriangle>>,
    /// Alpha threshold for tile texels.
    pub alpha_threshold: f64,
}

impl<'a> RasterFrame<'a> {
    /// Project the target and culled blockers of `ctx`. `None` when the
    /// target is dark.
    pub fn build(ctx: &CalcContext<'a>, cache: &mut MeshCache) -> Option<Self> {
        let shape = ctx.target;
        let visible = shape.visible_mesh(cache)?;
        let mut camera = ctx.target_camera();
        let view_proj = camera.view_projection();
        let frustum = camera.frustum();

        let cell = ctx.uses_large_target().then(|| {
            let cell = ctx.scene.grid().center_cell(&shape.bounds);
            to_clip(&cache.cell(&cell, shape.bottom, shape.top), &view_proj)
        });
        let occluders = Occluders::collect(ctx.blocking, cache, ctx.options.tile.alpha_threshold);
        let opaque = occluders
            .opaque
            .iter()
            .filter(|o| frustum_meets(&frustum, &o.mesh))
            .map(|o| RasterLayer {
                triangles: to_clip(&o.mesh, &view_proj),
                tile: o.tile,
            })
            .collect();
        let terrain = occluders
            .terrain
            .iter()
            .filter(|mesh| frustum_meets(&frustum, mesh))
            .map(|mesh| to_clip(mesh, &view_proj))
            .collect();

        Some(Self {
            reference: to_clip(&shape.full_mesh(cache), &view_proj),
            cell,
            target: to_clip(&visible, &view_proj),
            opaque,
            terrain,
            alpha_threshold: occluders.alpha_threshold(),
        })
    }
}

fn frustum_meets(frustum: &Frustum, mesh: &PlaceableMesh) -> bool {
    !mesh.is_empty() && frustum.intersects_box(mesh.min, mesh.max)
}

fn to_clip(mesh: &PlaceableMesh, view_proj: &DMat4) -> Vec<ClipTriangle> {
    mesh.triangles
        .iter()
        .enumerate()
        .map(|(i, tri)| ClipTriangle {
            positions: [tri.a, tri.b, tri.c].map(|p| *view_proj * p.extend(1.0)),
            uvs: mesh.uvs.get(i).copied(),
        })
        .collect()
}

/// Pixel counts from the three passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelCounts {
    /// Pixels covered by the full target.
    pub reference: u32,
    /// Pixels covered by the grid-cell box, for large targets.
    pub cell: Option<u32>,
    /// Visible target pixels left unblocked.
    pub visible: u32,
}

impl PixelCounts {
    /// Visible pixels over the smaller of the reference and cell counts.
    /// A target covering no pixels counts as fully visible.
    #[must_use]
    pub fn into_result(self, target: TokenId) -> PercentVisibleResult {
        if self.reference == 0 {
            return PercentVisibleResult::visible(target);
        }
        let total = match self.cell {
            Some(cell) if cell > 0 => self.reference.min(cell),
            _ => self.reference,
        };
        PercentVisibleResult {
            target,
            data: VisibilityData::Pixels {
                visible: self.visible,
                total,
            },
        }
    }
}

#[derive(Debug)]
enum Backend {
    Software(SoftwareRasterizer),
    #[cfg(feature = "gpu")]
    Gpu(gpu::GpuRasterizer),
}

/// Percent visible by rasterizing the eye's view and counting fragments.
#[derive(Debug)]
pub struct RasterCalculator {
    backend: Backend,
}

impl RasterCalculator {
    /// CPU rasterizer at `resolution`².
    #[must_use]
    pub fn software(resolution: u32) -> Self {
        Self {
            backend: Backend::Software(SoftwareRasterizer::new(resolution)),
        }
    }

    /// wgpu rasterizer at `resolution`² on a shared device.
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn gpu(context: std::sync::Arc<gpu::GpuContext>, resolution: u32) -> Self {
        Self {
            backend: Backend::Gpu(gpu::GpuRasterizer::new(context, resolution)),
        }
    }

    /// Which backend renders.
    #[must_use]
    pub fn backend(&self) -> RasterBackend {
        match self.backend {
            Backend::Software(_) => RasterBackend::Software,
            #[cfg(feature = "gpu")]
            Backend::Gpu(_) => RasterBackend::Gpu,
        }
    }

    /// Render target size along each axis.
    #[must_use]
    pub fn resolution(&self) -> u32 {
        match &self.backend {
            Backend::Software(r) => r.size(),
            #[cfg(feature = "gpu")]
            Backend::Gpu(r) => r.size(),
        }
    }

    /// Render and count.
    ///
    /// # Errors
    ///
    /// [`SightlineError::Readback`] if the GPU pixels cannot be read.
    pub fn calculate(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> Result<PercentVisibleResult, SightlineError> {
        let id = ctx.target.token.id;
        let Some(frame) = RasterFrame::build(ctx, cache) else {
            return Ok(PercentVisibleResult::blocked(id));
        };
        let counts = match &mut self.backend {
            Backend::Software(r) => r.count(&frame),
            #[cfg(feature = "gpu")]
            Backend::Gpu(r) => r.count(&frame)?,
        };
        log::debug!("raster counts: {counts:?}");
        Ok(counts.into_result(id))
    }

    /// Render and count, yielding while GPU pixels are read back.
    ///
    /// # Errors
    ///
    /// See [`Self::calculate`].
    pub async fn calculate_async(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> Result<PercentVisibleResult, SightlineError> {
        let id = ctx.target.token.id;
        let Some(frame) = RasterFrame::build(ctx, cache) else {
            return Ok(PercentVisibleResult::blocked(id));
        };
        let counts = match &mut self.backend {
            Backend::Software(r) => r.count(&frame),
            #[cfg(feature = "gpu")]
            Backend::Gpu(r) => r.count_async(&frame).await?,
        };
        log::debug!("raster counts: {counts:?}");
        Ok(counts.into_result(id))
    }

    /// Drop render targets; they are recreated on next use.
    pub fn destroy(&mut self) {
        match &mut self.backend {
            Backend::Software(r) => r.release(),
            #[cfg(feature = "gpu")]
            Backend::Gpu(r) => r.release(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_use_the_smaller_denominator() {
        let id = TokenId(1);
        let counts = PixelCounts {
            reference: 400,
            cell: Some(100),
            visible: 100,
        };
        assert_eq!(counts.into_result(id).percent(), 1.0);
        let no_cell = PixelCounts {
            cell: None,
            ..counts
        };
        assert_eq!(no_cell.into_result(id).percent(), 0.25);
    }

    #[test]
    fn empty_reference_is_visible() {
        let counts = PixelCounts::default();
        assert_eq!(counts.into_result(TokenId(1)).percent(), 1.0);
    }
}
