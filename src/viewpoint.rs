//! One eye of a viewer.
//!
//! A [`Viewpoint`] sits at a fixed offset from the viewer's center. For a
//! given target it culls the scene to plausible blockers (cached until the
//! viewer, target or scene changes), answers trivially decidable cases
//! directly and otherwise hands the question to its [`Calculator`].

use glam::{DVec2, DVec3};

use crate::{
    calculator::{sanitize_percent, CalcContext, Calculator},
    culling::{find_blocking_objects, BlockingObjects, VisionPolygon},
    debug::{DebugDraw, DebugStyle},
    error::SightlineError,
    geometry::Bounds2,
    mesh::MeshCache,
    options::LosOptions,
    scene::{Placeable, Scene, Token, TokenId},
    viewer::TargetShape,
};

/// Culling results for one eye and one target.
#[derive(Debug)]
struct Culled {
    target: TokenId,
    bounds: Bounds2,
    eye: DVec3,
    vision: Option<VisionPolygon>,
    blocking: BlockingObjects,
}

/// An eye point and the calculator that evaluates it.
#[derive(Debug)]
pub struct Viewpoint {
    offset: DVec2,
    calculator: Calculator,
    culled: Option<Culled>,
    evaluated: bool,
}

impl Viewpoint {
    /// Eye at `offset` from the viewer's center.
    #[must_use]
    pub fn new(offset: DVec2, calculator: Calculator) -> Self {
        Self {
            offset,
            calculator,
            culled: None,
            evaluated: false,
        }
    }

    /// Offset from the viewer's center.
    #[must_use]
    pub fn offset(&self) -> DVec2 {
        self.offset
    }

    /// The calculator in use.
    #[must_use]
    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    /// Swap the calculator, releasing the old one.
    pub fn set_calculator(&mut self, calculator: Calculator) {
        self.calculator.destroy();
        self.calculator = calculator;
    }

    /// Eye position for `viewer`: the offset center, raised to the
    /// configured fraction of the viewer's height.
    #[must_use]
    pub fn eye(&self, viewer: &Token, options: &LosOptions) -> DVec3 {
        let height = viewer.top_z() - viewer.bottom_z();
        (viewer.center() + self.offset)
            .extend(viewer.bottom_z() + height * options.viewer.eye_height)
    }

    /// Whether the last query reached this eye.
    #[must_use]
    pub fn evaluated(&self) -> bool {
        self.evaluated
    }

    /// Mark as not evaluated, e.g. when an earlier eye settled the query.
    pub fn skip(&mut self) {
        self.evaluated = false;
    }

    /// Drop cached culling results.
    pub fn invalidate(&mut self) {
        self.culled = None;
        self.evaluated = false;
    }

    /// Culled blockers for the current target, if computed.
    #[must_use]
    pub fn blocking_objects(&self) -> Option<&BlockingObjects> {
        self.culled.as_ref().map(|c| &c.blocking)
    }

    /// Vision polygon for the current target, if computed and not
    /// degenerate.
    #[must_use]
    pub fn vision_polygon(&self) -> Option<&VisionPolygon> {
        self.culled.as_ref().and_then(|c| c.vision.as_ref())
    }

    fn cull(&mut self, scene: &Scene, viewer: &Token, target: &TargetShape, options: &LosOptions) {
        let eye = self.eye(viewer, options);
        let fresh = self.culled.as_ref().is_some_and(|c| {
            c.target == target.token.id && c.bounds == target.bounds && c.eye == eye
        });
        if fresh {
            return;
        }
        let vision = VisionPolygon::build(eye, &target.border, target.bottom, target.top);
        let blocking =
            find_blocking_objects(scene, vision.as_ref(), viewer, &target.token, options);
        self.culled = Some(Culled {
            target: target.token.id,
            bounds: target.bounds,
            eye,
            vision,
            blocking,
        });
    }

    /// Answer without a calculator when the result is certain:
    ///
    /// - `1` if the eye is inside the target's box;
    /// - `0` if the eye and target are on opposite sides of the scene's
    ///   background elevation;
    /// - `0` if no part of the target is lit;
    /// - `1` if nothing can block and the whole target counts.
    ///
    /// `None` means the full calculation is needed.
    pub fn simple_visibility(
        &mut self,
        scene: &Scene,
        viewer: &Token,
        target: &TargetShape,
        options: &LosOptions,
    ) -> Option<f64> {
        let eye = self.eye(viewer, options);
        if target.bounds.contains(eye.truncate()) && (target.bottom..=target.top).contains(&eye.z) {
            return Some(1.0);
        }
        let floor = scene.background_elevation();
        let eye_below = eye.z < floor;
        let target_below = target.top < floor;
        let target_above = target.bottom >= floor;
        if (eye_below && target_above) || (!eye_below && target_below) {
            return Some(0.0);
        }
        if target.is_dark() {
            return Some(0.0);
        }
        self.cull(scene, viewer, target, options);
        let open = self
            .culled
            .as_ref()
            .is_some_and(|c| !c.blocking.has_potential_obstacles());
        (open && !target.is_restricted()).then_some(1.0)
    }

    /// Percent of `target` visible from this eye.
    ///
    /// # Errors
    ///
    /// Propagates calculator failures (GPU readback).
    pub fn percent_visible(
        &mut self,
        scene: &Scene,
        viewer: &Token,
        target: &TargetShape,
        options: &LosOptions,
        cache: &mut MeshCache,
    ) -> Result<f64, SightlineError> {
        self.evaluated = true;
        if let Some(percent) = self.simple_visibility(scene, viewer, target, options) {
            return Ok(percent);
        }
        let Some(culled) = self.culled.as_ref() else {
            return Ok(1.0);
        };
        let ctx = CalcContext {
            scene,
            options,
            viewer,
            target,
            eye: culled.eye,
            blocking: &culled.blocking,
        };
        let result = self.calculator.calculate(&ctx, cache)?;
        Ok(sanitize_percent(result.percent()))
    }

    /// Async counterpart of [`Self::percent_visible`].
    ///
    /// # Errors
    ///
    /// See [`Self::percent_visible`].
    pub async fn percent_visible_async(
        &mut self,
        scene: &Scene,
        viewer: &Token,
        target: &TargetShape,
        options: &LosOptions,
        cache: &mut MeshCache,
    ) -> Result<f64, SightlineError> {
        self.evaluated = true;
        if let Some(percent) = self.simple_visibility(scene, viewer, target, options) {
            return Ok(percent);
        }
        let Some(culled) = self.culled.as_ref() else {
            return Ok(1.0);
        };
        let ctx = CalcContext {
            scene,
            options,
            viewer,
            target,
            eye: culled.eye,
            blocking: &culled.blocking,
        };
        let result = self.calculator.calculate_async(&ctx, cache).await?;
        Ok(sanitize_percent(result.percent()))
    }

    /// Describe the last evaluation: vision polygon, blockers, eye and any
    /// traced sightlines. Nothing is drawn for an eye the last query
    /// skipped.
    pub fn draw_debug(&self, draw: &mut dyn DebugDraw) {
        if !self.evaluated {
            return;
        }
        let Some(culled) = &self.culled else {
            return;
        };
        if let Some(vision) = &culled.vision {
            draw.polygon(&vision.points(), DebugStyle::VisionPolygon);
        }
        let blocking = &culled.blocking;
        for wall in &blocking.walls {
            draw.segment(wall.a, wall.b, DebugStyle::Blocker);
        }
        for wall in &blocking.terrain_walls {
            draw.segment(wall.a, wall.b, DebugStyle::Terrain);
        }
        for tile in &blocking.tiles {
            draw.polygon(&tile.bounds().corners(), DebugStyle::Blocker);
        }
        for token in &blocking.tokens {
            draw.polygon(&token.rectangle(), DebugStyle::Blocker);
        }
        for region in &blocking.regions {
            draw.polygon(&region.shape, DebugStyle::Blocker);
        }
        draw.point(culled.eye.truncate(), DebugStyle::Eye);
        for ray in self.calculator.debug_rays() {
            let style = if ray.blocked {
                DebugStyle::BlockedRay
            } else {
                DebugStyle::ClearRay
            };
            draw.segment(ray.start.truncate(), ray.end.truncate(), style);
        }
    }

    /// Release calculator resources and cached state.
    pub fn destroy(&mut self) {
        self.calculator.destroy();
        self.invalidate();
    }
}
