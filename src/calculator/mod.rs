//! Percent-visibility calculators.
//!
//! Every algorithm answers the same question for one eye: what fraction of
//! the target's silhouette is unobstructed? [`Calculator`] is the closed set
//! of implementations; [`Algorithm`] is the configuration key selecting
//! one.
//!
//! - [`PointsCalculator`] casts segments from the eye to sample points.
//! - [`GeometricCalculator`] projects meshes into the eye's view and clips
//!   polygons.
//! - [`RasterCalculator`] rasterizes the projected meshes and counts target
//!   fragments, in software or (with the `gpu` feature) through wgpu.

mod geometric;
mod occluders;
mod points;
pub mod raster;
mod result;

pub use geometric::GeometricCalculator;
use glam::DVec3;
pub use occluders::{Occluder, Occluders, SEGMENT_MARGIN};
pub use points::{DebugRay, PointsCalculator};
pub use raster::RasterCalculator;
pub use result::{sanitize_percent, PercentVisibleResult, PointSet, VisibilityData, SNAP_EPSILON};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    camera::Camera,
    culling::BlockingObjects,
    error::SightlineError,
    mesh::MeshCache,
    options::LosOptions,
    scene::{Scene, Token},
    viewer::TargetShape,
};

/// Visibility algorithm selector.
///
/// Unknown keys deserialize to [`Algorithm::Points`] with a warning, so a
/// stale configuration never stops a scene from loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Segment tests against sample points.
    #[default]
    Points,
    /// Projected polygon clipping.
    Geometric,
    /// Fragment counting.
    Rasterized,
}

impl Algorithm {
    /// Every algorithm.
    pub const ALL: [Self; 3] = [Self::Points, Self::Geometric, Self::Rasterized];

    /// Configuration key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Geometric => "geometric",
            Self::Rasterized => "rasterized",
        }
    }

    /// Resolve a configuration key, falling back to points.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "points" => Self::Points,
            "geometric" => Self::Geometric,
            "rasterized" => Self::Rasterized,
            other => {
                log::warn!("unknown visibility algorithm {other:?}; using points");
                Self::Points
            }
        }
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Self::from_key(&key))
    }
}

/// Everything one calculation reads.
#[derive(Debug, Clone, Copy)]
pub struct CalcContext<'a> {
    /// Scene being queried.
    pub scene: &'a Scene,
    /// Active options.
    pub options: &'a LosOptions,
    /// Viewing token.
    pub viewer: &'a Token,
    /// Target border and visible shape.
    pub target: &'a TargetShape,
    /// Eye position.
    pub eye: DVec3,
    /// Culled blockers between eye and target.
    pub blocking: &'a BlockingObjects,
}

impl CalcContext<'_> {
    /// Camera at the eye, framing the target's box.
    #[must_use]
    pub fn target_camera(&self) -> Camera {
        let shape = self.target;
        let center = shape.bounds.center().extend((shape.bottom + shape.top) * 0.5);
        let mut camera = Camera::new(self.eye, center);
        camera.set_target_token_frustum(
            &shape.bounds,
            shape.bottom,
            shape.top,
            self.viewer.vision_angle,
        );
        camera
    }

    /// Returns `true` if the denominator should be capped at one grid cell.
    #[must_use]
    pub fn uses_large_target(&self) -> bool {
        self.options.large_target && self.scene.grid().is_larger_than_cell(&self.target.bounds)
    }
}

/// A visibility calculator, one per eye.
#[derive(Debug)]
pub enum Calculator {
    /// Point sampling.
    Points(PointsCalculator),
    /// Polygon clipping.
    Geometric(GeometricCalculator),
    /// Fragment counting.
    Rasterized(RasterCalculator),
}

impl Calculator {
    /// Calculator for `algorithm`. Rasterization uses the software backend.
    #[must_use]
    pub fn new(algorithm: Algorithm, options: &LosOptions) -> Self {
        match algorithm {
            Algorithm::Points => Self::Points(PointsCalculator::new()),
            Algorithm::Geometric => Self::Geometric(GeometricCalculator::new()),
            Algorithm::Rasterized => {
                Self::Rasterized(RasterCalculator::software(options.raster.resolution))
            }
        }
    }

    /// Calculator for `algorithm`, rendering through `gpu` when given.
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn with_gpu(
        algorithm: Algorithm,
        options: &LosOptions,
        gpu: Option<std::sync::Arc<raster::gpu::GpuContext>>,
    ) -> Self {
        match (algorithm, gpu) {
            (Algorithm::Rasterized, Some(context)) => {
                Self::Rasterized(RasterCalculator::gpu(context, options.raster.resolution))
            }
            (algorithm, _) => Self::new(algorithm, options),
        }
    }

    /// Which algorithm this is.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Points(_) => Algorithm::Points,
            Self::Geometric(_) => Algorithm::Geometric,
            Self::Rasterized(_) => Algorithm::Rasterized,
        }
    }

    /// Percent of the target visible from `ctx.eye`.
    ///
    /// # Errors
    ///
    /// Only the GPU backend fails, when rendered pixels cannot be read back.
    pub fn calculate(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> Result<PercentVisibleResult, SightlineError> {
        match self {
            Self::Points(c) => Ok(c.calculate(ctx, cache)),
            Self::Geometric(c) => Ok(c.calculate(ctx, cache)),
            Self::Rasterized(c) => c.calculate(ctx, cache),
        }
    }

    /// Same as [`Self::calculate`]; the GPU backend yields while waiting
    /// for the pixel readback.
    ///
    /// # Errors
    ///
    /// See [`Self::calculate`].
    pub async fn calculate_async(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> Result<PercentVisibleResult, SightlineError> {
        match self {
            Self::Points(c) => Ok(c.calculate(ctx, cache)),
            Self::Geometric(c) => Ok(c.calculate(ctx, cache)),
            Self::Rasterized(c) => c.calculate_async(ctx, cache).await,
        }
    }

    /// Sightlines traced by the last calculation (point sampling only).
    #[must_use]
    pub fn debug_rays(&self) -> &[DebugRay] {
        match self {
            Self::Points(c) => c.rays(),
            _ => &[],
        }
    }

    /// Release any GPU resources.
    pub fn destroy(&mut self) {
        match self {
            Self::Points(c) => c.clear(),
            Self::Geometric(_) => {}
            Self::Rasterized(c) => c.destroy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(Algorithm::from_key(algorithm.key()), algorithm);
        }
    }

    #[test]
    fn unknown_key_falls_back() {
        assert_eq!(Algorithm::from_key("webgpu"), Algorithm::Points);
        let parsed: Algorithm = serde_json::from_str("\"nope\"").unwrap();
        assert_eq!(parsed, Algorithm::Points);
        assert_eq!(serde_json::to_string(&Algorithm::Rasterized).unwrap(), "\"rasterized\"");
    }

    #[test]
    fn calculator_matches_algorithm() {
        let options = LosOptions::default();
        for algorithm in Algorithm::ALL {
            assert_eq!(Calculator::new(algorithm, &options).algorithm(), algorithm);
        }
    }
}
