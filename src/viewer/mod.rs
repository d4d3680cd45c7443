//! Multi-eye visibility for one viewing token.
//!
//! ```
//! # use glam::DVec2;
//! # use sightline::{geometry::Bounds2, scene::{Scene, Token, TokenId}, LosOptions, Viewer};
//! let mut scene = Scene::new(Bounds2::new(DVec2::splat(-1000.0), DVec2::splat(1000.0)));
//! let _ = scene.upsert(Token::new(TokenId(1), 0.0, 0.0));
//! let _ = scene.upsert(Token::new(TokenId(2), 500.0, 0.0));
//!
//! let mut viewer = Viewer::builder().with_options(LosOptions::default()).build();
//! viewer.set_viewer(&scene, TokenId(1))?;
//! assert!(viewer.has_los(&scene, TokenId(2), None)?);
//! # Ok::<(), sightline::SightlineError>(())
//! ```

mod prefilter;
mod target_shape;

#[cfg(feature = "gpu")]
use std::sync::Arc;

use glam::DVec2;
pub use prefilter::{outside_vision_cone, overlaps_directly};
pub use target_shape::{TargetShape, VisibleShape};
use web_time::Instant;

#[cfg(feature = "gpu")]
use crate::calculator::raster::gpu::GpuContext;
use crate::{
    calculator::{Algorithm, Calculator, SNAP_EPSILON},
    debug::{DebugDraw, DebugStyle},
    error::SightlineError,
    geometry::almost_equal,
    mesh::MeshCache,
    options::{LosOptions, RasterBackend},
    sampling::{rect_points, PointScheme},
    scene::{Placeable, Scene, Token, TokenId},
    viewpoint::Viewpoint,
};

/// Lifecycle of a [`Viewer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    /// No viewer token yet.
    Uninitialized,
    /// Viewer token and eyes set; nothing evaluated.
    Configured,
    /// At least one query has run against the current target.
    Active,
    /// Torn down; every query fails.
    Destroyed,
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
#[derive(Debug, Default)]
pub struct ViewerBuilder {
    options: Option<LosOptions>,
    #[cfg(feature = "gpu")]
    gpu: Option<Arc<GpuContext>>,
}

impl ViewerBuilder {
    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: LosOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Override only the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.options.get_or_insert_with(LosOptions::default).algorithm = algorithm;
        self
    }

    /// Render on an existing device instead of opening one on first use.
    #[cfg(feature = "gpu")]
    #[must_use]
    pub fn with_gpu_context(mut self, context: Arc<GpuContext>) -> Self {
        self.gpu = Some(context);
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        let mut viewer = Viewer::new(self.options.unwrap_or_default());
        #[cfg(feature = "gpu")]
        {
            viewer.gpu = self.gpu;
        }
        viewer
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A cached target shape and the scene generation it was built from.
#[derive(Debug)]
struct CachedTarget {
    generation: u64,
    shape: TargetShape,
}

/// Percent visibility from one token, as the best of its eyes.
///
/// Set the viewing token with [`set_viewer`](Self::set_viewer), then ask
/// [`percent_visible`](Self::percent_visible) or
/// [`has_los`](Self::has_los) for any target. Changing the viewer, target,
/// options or the scene itself drops every cached culling result.
#[derive(Debug)]
pub struct Viewer {
    options: LosOptions,
    state: ViewerState,
    viewer: Option<TokenId>,
    target: Option<TokenId>,
    viewpoints: Vec<Viewpoint>,
    cached_target: Option<CachedTarget>,
    generation: Option<u64>,
    mesh_cache: MeshCache,
    #[cfg(feature = "gpu")]
    gpu: Option<Arc<GpuContext>>,
    #[cfg(feature = "gpu")]
    gpu_failed: bool,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::default()
    }

    /// Viewer with `options` and no viewing token.
    #[must_use]
    pub fn new(options: LosOptions) -> Self {
        Self {
            options,
            state: ViewerState::Uninitialized,
            viewer: None,
            target: None,
            viewpoints: Vec::new(),
            cached_target: None,
            generation: None,
            mesh_cache: MeshCache::new(),
            #[cfg(feature = "gpu")]
            gpu: None,
            #[cfg(feature = "gpu")]
            gpu_failed: false,
        }
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> ViewerState {
        self.state
    }

    /// Active options.
    #[must_use]
    pub fn options(&self) -> &LosOptions {
        &self.options
    }

    /// The viewing token, if set.
    #[must_use]
    pub fn viewer(&self) -> Option<TokenId> {
        self.viewer
    }

    /// The last queried target, if any.
    #[must_use]
    pub fn target(&self) -> Option<TokenId> {
        self.target
    }

    /// Eyes in evaluation order.
    #[must_use]
    pub fn viewpoints(&self) -> &[Viewpoint] {
        &self.viewpoints
    }

    /// Target shape from the last query.
    #[must_use]
    pub fn target_shape(&self) -> Option<&TargetShape> {
        self.cached_target.as_ref().map(|c| &c.shape)
    }

    fn ensure_alive(&self) -> Result<(), SightlineError> {
        if self.state == ViewerState::Destroyed {
            Err(SightlineError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Use `id` as the viewing token and rebuild its eyes.
    ///
    /// # Errors
    ///
    /// [`SightlineError::UnknownToken`] if `id` is not in `scene`,
    /// [`SightlineError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn set_viewer(&mut self, scene: &Scene, id: TokenId) -> Result<(), SightlineError> {
        self.ensure_alive()?;
        let token = scene.token(id).ok_or(SightlineError::UnknownToken(id))?;
        let offsets = self.eye_offsets(token, token.center());
        self.viewer = Some(id);
        self.rebuild_viewpoints(offsets);
        self.invalidate();
        self.state = ViewerState::Configured;
        Ok(())
    }

    /// Make `id` the current target, dropping cached culling results.
    ///
    /// # Errors
    ///
    /// [`SightlineError::UnknownToken`] if `id` is not in `scene`,
    /// [`SightlineError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn set_target(&mut self, scene: &Scene, id: TokenId) -> Result<(), SightlineError> {
        self.ensure_alive()?;
        if scene.token(id).is_none() {
            return Err(SightlineError::UnknownToken(id));
        }
        self.target = Some(id);
        self.invalidate();
        Ok(())
    }

    /// Switch every eye to `algorithm`, keeping the eyes themselves.
    pub fn update_algorithm(&mut self, algorithm: Algorithm) {
        let current = self
            .viewpoints
            .iter()
            .all(|v| v.calculator().algorithm() == algorithm);
        if self.options.algorithm == algorithm && current {
            return;
        }
        log::debug!("visibility algorithm -> {}", algorithm.key());
        self.options.algorithm = algorithm;
        let mut viewpoints = std::mem::take(&mut self.viewpoints);
        for vp in &mut viewpoints {
            vp.set_calculator(self.make_calculator());
        }
        self.viewpoints = viewpoints;
        self.invalidate();
    }

    /// Replace the options. Eyes are rebuilt when a viewer is set.
    pub fn set_options(&mut self, scene: &Scene, options: LosOptions) {
        self.options = options;
        self.mesh_cache.clear();
        for vp in &mut self.viewpoints {
            vp.destroy();
        }
        self.viewpoints.clear();
        if let Some(token) = self.viewer.and_then(|id| scene.token(id)) {
            let offsets = self.eye_offsets(token, token.center());
            self.rebuild_viewpoints(offsets);
        }
        self.invalidate();
    }

    /// Drop cached culling results and target shapes.
    pub fn invalidate(&mut self) {
        self.cached_target = None;
        self.generation = None;
        for vp in &mut self.viewpoints {
            vp.invalidate();
        }
        if self.state == ViewerState::Active {
            self.state = ViewerState::Configured;
        }
    }

    fn eye_offsets(&self, viewer: &Token, reference: DVec2) -> Vec<DVec2> {
        let scheme = self.options.viewer.points;
        let center = viewer.center();
        rect_points(&viewer.bounds(), scheme, self.options.viewer.inset, reference)
            .into_iter()
            .map(|p| p - center)
            .collect()
    }

    fn rebuild_viewpoints(&mut self, offsets: Vec<DVec2>) {
        let unchanged = offsets.len() == self.viewpoints.len()
            && offsets.iter().zip(&self.viewpoints).all(|(o, v)| *o == v.offset());
        if unchanged {
            return;
        }
        for vp in &mut self.viewpoints {
            vp.destroy();
        }
        let mut viewpoints = Vec::with_capacity(offsets.len());
        for offset in offsets {
            viewpoints.push(Viewpoint::new(offset, self.make_calculator()));
        }
        self.viewpoints = viewpoints;
        log::debug!("rebuilt {} viewpoints", self.viewpoints.len());
    }

    #[cfg(feature = "gpu")]
    fn make_calculator(&mut self) -> Calculator {
        let wants_gpu = self.options.algorithm == Algorithm::Rasterized
            && self.options.raster.backend == RasterBackend::Gpu;
        if wants_gpu && self.gpu.is_none() && !self.gpu_failed {
            match pollster::block_on(GpuContext::new()) {
                Ok(context) => self.gpu = Some(Arc::new(context)),
                Err(e) => {
                    log::warn!("GPU rasterization unavailable, using software: {e}");
                    self.gpu_failed = true;
                }
            }
        }
        let gpu = if wants_gpu { self.gpu.clone() } else { None };
        Calculator::with_gpu(self.options.algorithm, &self.options, gpu)
    }

    #[cfg(not(feature = "gpu"))]
    fn make_calculator(&mut self) -> Calculator {
        if self.options.algorithm == Algorithm::Rasterized
            && self.options.raster.backend == RasterBackend::Gpu
        {
            log::warn!("built without the gpu feature; rasterizing in software");
        }
        Calculator::new(self.options.algorithm, &self.options)
    }

    /// Resolve tokens, refresh caches and return the viewer token, target
    /// token and target shape for a query. Also reorients two- and
    /// three-point eyes toward the target.
    fn prepare(
        &mut self,
        scene: &Scene,
        target: TokenId,
    ) -> Result<(Token, TargetShape), SightlineError> {
        self.ensure_alive()?;
        let viewer_id = self.viewer.ok_or(SightlineError::NoViewer)?;
        let viewer = scene
            .token(viewer_id)
            .ok_or(SightlineError::UnknownToken(viewer_id))?
            .clone();
        let target_token = scene.token(target).ok_or(SightlineError::UnknownToken(target))?;

        if self.generation != Some(scene.generation()) || self.target != Some(target) {
            if self.generation.is_some_and(|g| g != scene.generation()) {
                self.mesh_cache.retain_present(scene);
            }
            self.invalidate();
            self.target = Some(target);
            self.generation = Some(scene.generation());
        }
        if matches!(self.options.viewer.points, PointScheme::Two | PointScheme::Three) {
            let offsets = self.eye_offsets(&viewer, target_token.center());
            self.rebuild_viewpoints(offsets);
        }

        let shape = match &self.cached_target {
            Some(cached)
                if cached.generation == scene.generation() && cached.shape.token.id == target =>
            {
                cached.shape.clone()
            }
            _ => {
                let shape = TargetShape::build(scene, target_token, &self.options);
                self.cached_target = Some(CachedTarget {
                    generation: scene.generation(),
                    shape: shape.clone(),
                });
                shape
            }
        };
        self.state = ViewerState::Active;
        Ok((viewer, shape))
    }

    /// Answer from the pre-filters alone, if they decide the query.
    fn prefiltered(viewer: &Token, shape: &TargetShape) -> Option<f64> {
        if overlaps_directly(viewer, &shape.token) {
            return Some(1.0);
        }
        if outside_vision_cone(viewer, &shape.border) {
            return Some(0.0);
        }
        None
    }

    /// Percent of `target` visible to the viewer: the maximum over its
    /// eyes, stopping at the first eye that sees all of it.
    ///
    /// An eye whose calculation fails counts as seeing nothing.
    ///
    /// # Errors
    ///
    /// [`SightlineError::NoViewer`] before [`set_viewer`](Self::set_viewer),
    /// [`SightlineError::UnknownToken`] for a missing token,
    /// [`SightlineError::Destroyed`] after [`destroy`](Self::destroy).
    pub fn percent_visible(
        &mut self,
        scene: &Scene,
        target: TokenId,
    ) -> Result<f64, SightlineError> {
        let start = Instant::now();
        let (viewer, shape) = self.prepare(scene, target)?;
        if let Some(percent) = Self::prefiltered(&viewer, &shape) {
            self.skip_all();
            return Ok(percent);
        }

        let mut best = 0.0_f64;
        let mut done = false;
        for vp in &mut self.viewpoints {
            if done {
                vp.skip();
                continue;
            }
            let percent = vp
                .percent_visible(scene, &viewer, &shape, &self.options, &mut self.mesh_cache)
                .unwrap_or_else(|e| {
                    log::warn!("viewpoint failed, counting it as blocked: {e}");
                    0.0
                });
            best = best.max(percent);
            done = best >= 1.0;
        }
        log::debug!(
            "{} -> {target}: {best:.4} ({}, {:?})",
            viewer.id,
            self.options.algorithm.key(),
            start.elapsed()
        );
        Ok(best)
    }

    /// Async counterpart of [`percent_visible`](Self::percent_visible).
    /// Suspends only while GPU pixels are read back.
    ///
    /// # Errors
    ///
    /// See [`percent_visible`](Self::percent_visible).
    pub async fn percent_visible_async(
        &mut self,
        scene: &Scene,
        target: TokenId,
    ) -> Result<f64, SightlineError> {
        let start = Instant::now();
        let (viewer, shape) = self.prepare(scene, target)?;
        if let Some(percent) = Self::prefiltered(&viewer, &shape) {
            self.skip_all();
            return Ok(percent);
        }

        let mut best = 0.0_f64;
        let mut done = false;
        for vp in &mut self.viewpoints {
            if done {
                vp.skip();
                continue;
            }
            let percent = match vp
                .percent_visible_async(scene, &viewer, &shape, &self.options, &mut self.mesh_cache)
                .await
            {
                Ok(percent) => percent,
                Err(e) => {
                    log::warn!("viewpoint failed, counting it as blocked: {e}");
                    0.0
                }
            };
            best = best.max(percent);
            done = best >= 1.0;
        }
        log::debug!(
            "{} -> {target}: {best:.4} async ({}, {:?})",
            viewer.id,
            self.options.algorithm.key(),
            start.elapsed()
        );
        Ok(best)
    }

    /// Each eye's own percent for `target`, without early exit or
    /// pre-filters.
    ///
    /// # Errors
    ///
    /// See [`percent_visible`](Self::percent_visible). Per-eye failures
    /// are reported as `0`.
    pub fn viewpoint_percentages(
        &mut self,
        scene: &Scene,
        target: TokenId,
    ) -> Result<Vec<f64>, SightlineError> {
        let (viewer, shape) = self.prepare(scene, target)?;
        let options = &self.options;
        let cache = &mut self.mesh_cache;
        Ok(self
            .viewpoints
            .iter_mut()
            .map(|vp| {
                vp.percent_visible(scene, &viewer, &shape, options, cache)
                    .unwrap_or_else(|e| {
                        log::warn!("viewpoint failed, counting it as blocked: {e}");
                        0.0
                    })
            })
            .collect())
    }

    /// Returns `true` if the viewer sees at least `threshold` of `target`
    /// (the configured threshold when `None`). The boundary counts as
    /// seen; a target with nothing visible is never seen.
    ///
    /// # Errors
    ///
    /// See [`percent_visible`](Self::percent_visible).
    pub fn has_los(
        &mut self,
        scene: &Scene,
        target: TokenId,
        threshold: Option<f64>,
    ) -> Result<bool, SightlineError> {
        let percent = self.percent_visible(scene, target)?;
        Ok(self.passes(percent, threshold))
    }

    /// Async counterpart of [`has_los`](Self::has_los).
    ///
    /// # Errors
    ///
    /// See [`percent_visible`](Self::percent_visible).
    pub async fn has_los_async(
        &mut self,
        scene: &Scene,
        target: TokenId,
        threshold: Option<f64>,
    ) -> Result<bool, SightlineError> {
        let percent = self.percent_visible_async(scene, target).await?;
        Ok(self.passes(percent, threshold))
    }

    fn passes(&self, percent: f64, threshold: Option<f64>) -> bool {
        let threshold = threshold.unwrap_or(self.options.threshold);
        percent > 0.0 && (percent > threshold || almost_equal(percent, threshold, SNAP_EPSILON))
    }

    fn skip_all(&mut self) {
        for vp in &mut self.viewpoints {
            vp.skip();
        }
    }

    /// Describe the last query: the target border, its lit part, and for
    /// every eye that was evaluated its vision polygon, blockers and rays.
    pub fn draw_canvas_debug(&self, draw: &mut dyn DebugDraw) {
        if let Some(shape) = self.target_shape() {
            draw.polygon(&shape.border, DebugStyle::Target);
            if let VisibleShape::Partial { ring, .. } = &shape.visible {
                draw.polygon(ring, DebugStyle::VisibleTarget);
            }
        }
        for vp in &self.viewpoints {
            vp.draw_debug(draw);
        }
    }

    /// Release every eye's resources. The viewer is unusable afterwards.
    pub fn destroy(&mut self) {
        for vp in &mut self.viewpoints {
            vp.destroy();
        }
        self.viewpoints.clear();
        self.cached_target = None;
        self.mesh_cache.clear();
        self.viewer = None;
        self.target = None;
        #[cfg(feature = "gpu")]
        {
            self.gpu = None;
        }
        self.state = ViewerState::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        debug::DebugRecorder,
        geometry::Bounds2,
        scene::{Wall, WallId},
    };

    fn scene() -> Scene {
        let mut scene = Scene::new(Bounds2::new(DVec2::splat(-1000.0), DVec2::splat(2000.0)));
        let _ = scene.upsert(Token::new(TokenId(1), 0.0, 0.0));
        let _ = scene.upsert(Token::new(TokenId(2), 500.0, 0.0));
        scene
    }

    /// Wall across the sightline at x = 300.
    fn wall(id: u32, y0: f64, y1: f64) -> Wall {
        Wall::new(WallId(id), DVec2::new(300.0, y0), DVec2::new(300.0, y1))
    }

    #[test]
    fn lifecycle() {
        let scene = scene();
        let mut viewer = Viewer::new(LosOptions::default());
        assert_eq!(viewer.state(), ViewerState::Uninitialized);
        assert!(matches!(
            viewer.percent_visible(&scene, TokenId(2)),
            Err(SightlineError::NoViewer)
        ));
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        assert_eq!(viewer.state(), ViewerState::Configured);
        assert_eq!(viewer.percent_visible(&scene, TokenId(2)).unwrap(), 1.0);
        assert_eq!(viewer.state(), ViewerState::Active);
        viewer.destroy();
        assert_eq!(viewer.state(), ViewerState::Destroyed);
        assert!(matches!(
            viewer.percent_visible(&scene, TokenId(2)),
            Err(SightlineError::Destroyed)
        ));
    }

    #[test]
    fn unknown_tokens_are_errors() {
        let scene = scene();
        let mut viewer = Viewer::new(LosOptions::default());
        assert!(matches!(
            viewer.set_viewer(&scene, TokenId(9)),
            Err(SightlineError::UnknownToken(TokenId(9)))
        ));
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        assert!(matches!(
            viewer.percent_visible(&scene, TokenId(9)),
            Err(SightlineError::UnknownToken(TokenId(9)))
        ));
    }

    #[test]
    fn eye_count_follows_the_scheme() {
        let scene = scene();
        let mut options = LosOptions::default();
        options.viewer.points = PointScheme::Nine;
        let mut viewer = Viewer::builder().with_options(options).build();
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        assert_eq!(viewer.viewpoints().len(), 9);
    }

    #[test]
    fn threshold_is_inclusive() {
        let viewer = Viewer::new(LosOptions::default());
        assert!(viewer.passes(0.4, Some(0.4)));
        assert!(viewer.passes(0.5, Some(0.4)));
        assert!(!viewer.passes(0.3, Some(0.4)));
        assert!(!viewer.passes(0.0, Some(0.0)));
    }

    #[test]
    fn removed_placeables_leave_the_mesh_cache() {
        let mut scene = scene();
        let mut viewer = Viewer::new(LosOptions::default());
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        let _ = scene.upsert(wall(1, 30.0, 70.0));
        let _ = viewer.percent_visible(&scene, TokenId(2)).unwrap();
        let cached = viewer.mesh_cache.len();
        assert!(cached > 0);

        let _ = scene.remove::<Wall>(WallId(1));
        assert_eq!(viewer.percent_visible(&scene, TokenId(2)).unwrap(), 1.0);
        assert!(viewer.mesh_cache.len() < cached);
    }

    #[test]
    fn scene_changes_are_noticed() {
        let mut scene = scene();
        let mut viewer = Viewer::new(LosOptions::default());
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        assert_eq!(viewer.percent_visible(&scene, TokenId(2)).unwrap(), 1.0);
        let _ = scene.upsert(wall(1, -500.0, 500.0));
        assert_eq!(viewer.percent_visible(&scene, TokenId(2)).unwrap(), 0.0);
    }

    #[test]
    fn algorithm_switch_keeps_eyes() {
        let scene = scene();
        let mut options = LosOptions::default();
        options.viewer.points = PointScheme::Four;
        let mut viewer = Viewer::new(options);
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        viewer.update_algorithm(Algorithm::Geometric);
        assert_eq!(viewer.viewpoints().len(), 4);
        assert!(viewer
            .viewpoints()
            .iter()
            .all(|v| v.calculator().algorithm() == Algorithm::Geometric));
    }

    #[test]
    fn early_exit_skips_later_eyes() {
        let scene = scene();
        let mut options = LosOptions::default();
        options.viewer.points = PointScheme::Five;
        let mut viewer = Viewer::new(options);
        viewer.set_viewer(&scene, TokenId(1)).unwrap();
        assert_eq!(viewer.percent_visible(&scene, TokenId(2)).unwrap(), 1.0);
        let evaluated: Vec<bool> = viewer.viewpoints().iter().map(Viewpoint::evaluated).collect();
        assert_eq!(evaluated, vec![true, false, false, false, false]);

        let mut recorder = DebugRecorder::new();
        viewer.draw_canvas_debug(&mut recorder);
        assert_eq!(recorder.count(DebugStyle::Target), 1);
        assert_eq!(recorder.count(DebugStyle::Eye), 1);
    }
}
