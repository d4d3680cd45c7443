use glam::{DVec2, DVec3};

use super::{occluders::Occluders, CalcContext, PercentVisibleResult, PointSet, VisibilityData};
use crate::{
    mesh::MeshCache,
    sampling::{grid_cell_points, lift_points, rect_points},
};

/// One traced sightline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugRay {
    /// Eye.
    pub start: DVec3,
    /// Sample point on the target.
    pub end: DVec3,
    /// Whether the sightline was blocked.
    pub blocked: bool,
}

/// Percent visible as the fraction of target sample points the eye can
/// reach with an unobstructed segment.
#[derive(Debug, Default)]
pub struct PointsCalculator {
    rays: Vec<DebugRay>,
}

impl PointsCalculator {
    /// Calculator with no recorded rays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rays from the last calculation, when debug output is enabled.
    #[must_use]
    pub fn rays(&self) -> &[DebugRay] {
        &self.rays
    }

    /// Forget recorded rays.
    pub fn clear(&mut self) {
        self.rays.clear();
    }

    /// Sample the target and test each sightline.
    ///
    /// A sample is blocked if it lies outside the visible target shape or
    /// its segment is blocked. Large targets are sampled per grid cell and
    /// the most visible cell wins.
    pub fn calculate(
        &mut self,
        ctx: &CalcContext<'_>,
        cache: &mut MeshCache,
    ) -> PercentVisibleResult {
        self.rays.clear();
        let shape = ctx.target;
        let id = shape.token.id;
        if shape.is_dark() {
            return PercentVisibleResult::blocked(id);
        }

        let scheme = &ctx.options.target;
        let reference = ctx.eye.truncate();
        let groups: Vec<Vec<DVec2>> = if ctx.uses_large_target() {
            grid_cell_points(
                ctx.scene.grid(),
                &shape.bounds,
                scheme.points,
                scheme.inset,
                reference,
            )
        } else {
            vec![rect_points(&shape.bounds, scheme.points, scheme.inset, reference)]
        };

        let occluders = Occluders::collect(ctx.blocking, cache, ctx.options.tile.alpha_threshold);
        let record = ctx.options.debug.enabled;
        let mut best: Option<PercentVisibleResult> = None;
        for group in groups {
            let samples =
                lift_points(&group, shape.bottom, shape.top, scheme.inset, scheme.points_3d);
            let mut set = PointSet::new(samples.len());
            for (i, &sample) in samples.iter().enumerate() {
                let blocked = !shape.visible_contains(sample.truncate())
                    || occluders.segment_blocked(ctx.eye, sample);
                if !blocked {
                    set.set_visible(i);
                }
                if record {
                    self.rays.push(DebugRay {
                        start: ctx.eye,
                        end: sample,
                        blocked,
                    });
                }
            }
            let result = PercentVisibleResult {
                target: id,
                data: VisibilityData::Points(set),
            };
            let done = result.percent() >= 1.0;
            best = Some(match best {
                Some(previous) => previous.max(result),
                None => result,
            });
            if done {
                break;
            }
        }
        best.unwrap_or_else(|| PercentVisibleResult::blocked(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        culling::{find_blocking_objects, BlockingObjects, VisionPolygon},
        geometry::Bounds2,
        options::LosOptions,
        scene::{Scene, Token, TokenId, Wall, WallId},
        viewer::TargetShape,
    };

    struct Fixture {
        scene: Scene,
        viewer: Token,
        target: Token,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new(Bounds2::new(DVec2::splat(-1000.0), DVec2::splat(2000.0)));
        let viewer = Token::new(TokenId(1), 0.0, 0.0);
        let target = Token::new(TokenId(2), 500.0, 0.0);
        let _ = scene.upsert(viewer.clone());
        let _ = scene.upsert(target.clone());
        Fixture { scene, viewer, target }
    }

    /// Wall across the sightline at x = 300.
    fn wall(y0: f64, y1: f64) -> Wall {
        Wall::new(WallId(1), DVec2::new(300.0, y0), DVec2::new(300.0, y1))
    }

    fn run(f: &Fixture, options: &LosOptions) -> (f64, Vec<DebugRay>) {
        let eye = DVec3::new(50.0, 50.0, 100.0);
        let shape = TargetShape::build(&f.scene, &f.target, options);
        let vision = VisionPolygon::build(eye, &shape.border, shape.bottom, shape.top);
        let blocking: BlockingObjects =
            find_blocking_objects(&f.scene, vision.as_ref(), &f.viewer, &f.target, options);
        let ctx = CalcContext {
            scene: &f.scene,
            options,
            viewer: &f.viewer,
            target: &shape,
            eye,
            blocking: &blocking,
        };
        let mut calc = PointsCalculator::new();
        let mut cache = MeshCache::new();
        let percent = calc.calculate(&ctx, &mut cache).percent();
        (percent, calc.rays().to_vec())
    }

    #[test]
    fn open_scene_is_fully_visible() {
        assert_eq!(run(&fixture(), &LosOptions::default()).0, 1.0);
    }

    #[test]
    fn short_wall_blocks_the_center_and_far_corners() {
        let mut f = fixture();
        let _ = f.scene.upsert(wall(30.0, 70.0));
        let (percent, _) = run(&f, &LosOptions::default());
        assert!((percent - 0.4).abs() < 1e-9, "percent {percent}");
    }

    #[test]
    fn long_wall_blocks_everything() {
        let mut f = fixture();
        let _ = f.scene.upsert(wall(-500.0, 500.0));
        assert_eq!(run(&f, &LosOptions::default()).0, 0.0);
    }

    #[test]
    fn rays_recorded_only_when_debugging() {
        let f = fixture();
        assert!(run(&f, &LosOptions::default()).1.is_empty());
        let mut options = LosOptions::default();
        options.debug.enabled = true;
        let rays = run(&f, &options).1;
        // Five points, each at two heights.
        assert_eq!(rays.len(), 10);
        assert!(rays.iter().all(|r| !r.blocked));
    }
}
