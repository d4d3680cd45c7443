//! End-to-end visibility scenarios through the public `Viewer` API.

use glam::DVec2;
use sightline::{
    geometry::Bounds2,
    options::LosOptions,
    sampling::PointScheme,
    scene::{Light, LightId, Scene, SenseRestriction, Token, TokenId, Wall, WallId},
    Algorithm, SightlineError, Viewer,
};

const VIEWER: TokenId = TokenId(1);
const TARGET: TokenId = TokenId(2);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Viewer at the origin, default-sized target 500 units to the east.
fn scene() -> Scene {
    init_logging();
    let mut scene = Scene::new(Bounds2::new(DVec2::splat(-2000.0), DVec2::splat(2000.0)));
    let _ = scene.upsert(Token::new(VIEWER, 0.0, 0.0));
    let _ = scene.upsert(Token::new(TARGET, 500.0, 0.0));
    scene
}

fn wall(id: u32, a: (f64, f64), b: (f64, f64)) -> Wall {
    Wall::new(WallId(id), DVec2::new(a.0, a.1), DVec2::new(b.0, b.1))
}

fn terrain(id: u32, x: f64) -> Wall {
    wall(id, (x, -500.0), (x, 500.0)).with_restriction(SenseRestriction::Limited)
}

fn viewer(scene: &Scene, options: LosOptions) -> Viewer {
    let mut viewer = Viewer::builder().with_options(options).build();
    viewer.set_viewer(scene, VIEWER).unwrap();
    viewer
}

fn options(algorithm: Algorithm) -> LosOptions {
    LosOptions {
        algorithm,
        ..LosOptions::default()
    }
}

fn percent(scene: &Scene, options: LosOptions) -> f64 {
    viewer(scene, options).percent_visible(scene, TARGET).unwrap()
}

#[test]
fn empty_scene_is_fully_visible() {
    let scene = scene();
    for algorithm in Algorithm::ALL {
        let mut viewer = viewer(&scene, options(algorithm));
        assert_eq!(viewer.percent_visible(&scene, TARGET).unwrap(), 1.0, "{algorithm:?}");
        assert!(viewer.has_los(&scene, TARGET, Some(0.5)).unwrap());
    }
}

#[test]
fn short_wall_blocks_part_of_the_target() {
    let mut scene = scene();
    let _ = scene.upsert(wall(1, (300.0, 30.0), (300.0, 70.0)));
    assert!((percent(&scene, options(Algorithm::Points)) - 0.4).abs() < 1e-9);
    for algorithm in [Algorithm::Geometric, Algorithm::Rasterized] {
        let p = percent(&scene, options(algorithm));
        assert!(p > 0.0 && p < 1.0, "{algorithm:?}: {p}");
    }
}

#[test]
fn spanning_wall_blocks_everything() {
    let mut scene = scene();
    let _ = scene.upsert(wall(1, (300.0, -500.0), (300.0, 500.0)));
    for algorithm in Algorithm::ALL {
        assert_eq!(percent(&scene, options(algorithm)), 0.0, "{algorithm:?}");
    }
}

#[test]
fn terrain_walls_block_only_in_pairs() {
    let mut scene = scene();
    let _ = scene.upsert(terrain(1, 250.0));
    for algorithm in Algorithm::ALL {
        assert!((percent(&scene, options(algorithm)) - 1.0).abs() < 1e-6, "{algorithm:?}");
    }
    let _ = scene.upsert(terrain(2, 350.0));
    for algorithm in Algorithm::ALL {
        assert_eq!(percent(&scene, options(algorithm)), 0.0, "{algorithm:?}");
    }
}

#[test]
fn target_behind_a_narrow_vision_cone_is_never_seen() {
    let mut scene = scene();
    let mut looker = Token::new(VIEWER, 0.0, 0.0);
    looker.vision_angle = 90.0;
    looker.rotation = 0.0;
    let _ = scene.upsert(looker);
    let _ = scene.upsert(Token::new(TARGET, -600.0, 0.0));
    let mut viewer = viewer(&scene, LosOptions::default());
    assert_eq!(viewer.percent_visible(&scene, TARGET).unwrap(), 0.0);
    for threshold in [0.0, 0.5, 1.0] {
        assert!(!viewer.has_los(&scene, TARGET, Some(threshold)).unwrap());
    }
}

/// A 4x4-cell target behind a gap that exposes its nearest row.
fn large_target_scene() -> Scene {
    let mut scene = scene();
    let mut target = Token::new(TARGET, 500.0, 0.0);
    target.width = 400.0;
    target.height = 400.0;
    let _ = scene.upsert(target);
    let _ = scene.upsert(wall(1, (450.0, -1500.0), (450.0, -20.0)));
    let _ = scene.upsert(wall(2, (450.0, 120.0), (450.0, 1500.0)));
    scene
}

#[test]
fn one_clear_cell_makes_a_large_target_visible() {
    let scene = large_target_scene();
    for algorithm in Algorithm::ALL {
        let mut opts = options(algorithm);
        let partial = percent(&scene, opts.clone());
        assert!(partial < 1.0, "{algorithm:?}: {partial}");
        opts.large_target = true;
        let full = percent(&scene, opts);
        assert!((full - 1.0).abs() < 1e-9, "{algorithm:?}: {full}");
    }
}

#[test]
fn lit_shape_limits_what_counts() {
    let mut scene = scene();
    scene.set_global_light(false);
    // Lights the southern strip of the target, below the sample center.
    let _ = scene.upsert(Light::new(LightId(1), 550.0, -170.0, 210.0));
    let lit = |algorithm: Algorithm| LosOptions {
        use_lit_target_shape: true,
        ..options(algorithm)
    };

    assert!((percent(&scene, lit(Algorithm::Points)) - 0.4).abs() < 1e-9);
    for algorithm in [Algorithm::Geometric, Algorithm::Rasterized] {
        let p = percent(&scene, lit(algorithm));
        assert!(p > 0.15 && p < 0.75, "{algorithm:?}: {p}");
    }

    let mut viewer = viewer(&scene, lit(Algorithm::Points));
    let _ = viewer.percent_visible(&scene, TARGET).unwrap();
    assert!(viewer.target_shape().is_some_and(|s| s.is_restricted()));
}

#[test]
fn unlit_target_is_not_visible() {
    let mut scene = scene();
    scene.set_global_light(false);
    for algorithm in Algorithm::ALL {
        let opts = LosOptions {
            use_lit_target_shape: true,
            ..options(algorithm)
        };
        assert_eq!(percent(&scene, opts), 0.0, "{algorithm:?}");
    }
}

#[test]
fn adding_blockers_never_increases_visibility() {
    let walls = [
        wall(1, (300.0, 30.0), (300.0, 70.0)),
        wall(2, (350.0, 60.0), (350.0, 130.0)),
        wall(3, (400.0, -40.0), (400.0, 20.0)),
        wall(4, (250.0, -500.0), (250.0, 500.0)),
    ];
    for algorithm in Algorithm::ALL {
        let mut scene = scene();
        let mut last = percent(&scene, options(algorithm));
        for w in &walls {
            let _ = scene.upsert(w.clone());
            let next = percent(&scene, options(algorithm));
            assert!(next <= last + 1e-9, "{algorithm:?}: {next} > {last}");
            last = next;
        }
        assert_eq!(last, 0.0);
    }
}

#[test]
fn threshold_boundary_counts_as_seen() {
    let mut scene = scene();
    let _ = scene.upsert(wall(1, (300.0, 30.0), (300.0, 70.0)));
    let mut viewer = viewer(&scene, LosOptions::default());
    assert!(viewer.has_los(&scene, TARGET, Some(0.4)).unwrap());
    assert!(!viewer.has_los(&scene, TARGET, Some(0.41)).unwrap());

    let _ = scene.upsert(wall(2, (200.0, -500.0), (200.0, 500.0)));
    assert!(!viewer.has_los(&scene, TARGET, Some(0.0)).unwrap());
}

#[test]
fn overlapping_tokens_always_see_each_other() {
    let mut scene = scene();
    let _ = scene.upsert(Token::new(TARGET, 60.0, 60.0));
    let _ = scene.upsert(wall(1, (80.0, -500.0), (80.0, 500.0)));
    for algorithm in Algorithm::ALL {
        assert_eq!(percent(&scene, options(algorithm)), 1.0, "{algorithm:?}");
    }
}

#[test]
fn floor_hides_the_level_below() {
    let mut scene = scene();
    let mut below = Token::new(VIEWER, 0.0, 0.0);
    below.elevation = -300.0;
    let _ = scene.upsert(below);
    for algorithm in Algorithm::ALL {
        assert_eq!(percent(&scene, options(algorithm)), 0.0, "{algorithm:?}");
    }
}

#[test]
fn viewer_sees_the_best_of_its_eyes() {
    let mut scene = scene();
    // Blocks the left half of the viewer's eyes more than the right.
    let _ = scene.upsert(wall(1, (150.0, -100.0), (150.0, 40.0)));
    let _ = scene.upsert(wall(2, (300.0, 30.0), (300.0, 70.0)));
    for algorithm in Algorithm::ALL {
        let mut opts = options(algorithm);
        opts.viewer.points = PointScheme::Nine;
        let mut viewer = viewer(&scene, opts);
        let each = viewer.viewpoint_percentages(&scene, TARGET).unwrap();
        assert_eq!(each.len(), 9);
        let best = each.iter().copied().fold(0.0, f64::max);
        let combined = viewer.percent_visible(&scene, TARGET).unwrap();
        assert!((combined - best).abs() < 1e-12, "{algorithm:?}: {combined} vs {best}");
    }
}

#[test]
fn lateral_eyes_turn_toward_each_target() {
    let mut scene = scene();
    let north = TokenId(3);
    let _ = scene.upsert(Token::new(north, 0.0, 500.0));
    // Hides the south-east eye from the eastern target only.
    let _ = scene.upsert(wall(1, (120.0, -200.0), (120.0, 50.0)));
    for scheme in [PointScheme::Two, PointScheme::Three] {
        let mut opts = LosOptions::default();
        opts.viewer.points = scheme;
        let mut viewer = viewer(&scene, opts);

        let east = viewer.viewpoint_percentages(&scene, TARGET).unwrap();
        let lateral: Vec<f64> = east.iter().rev().take(2).rev().copied().collect();
        assert_eq!(lateral, vec![0.0, 1.0], "{scheme:?}: {east:?}");
        assert!(viewer.viewpoints().iter().all(|vp| vp.offset().x >= 0.0));
        assert_eq!(viewer.percent_visible(&scene, TARGET).unwrap(), 1.0);

        let northern = viewer.viewpoint_percentages(&scene, north).unwrap();
        assert!(northern.iter().all(|&p| p == 1.0), "{scheme:?}: {northern:?}");
        assert!(viewer.viewpoints().iter().all(|vp| vp.offset().y >= 0.0));
    }
}

#[test]
fn large_target_mode_never_lowers_visibility() {
    let scenes = [large_target_scene(), scene()];
    for scene in &scenes {
        for algorithm in Algorithm::ALL {
            let off = percent(scene, options(algorithm));
            let on = percent(
                scene,
                LosOptions {
                    large_target: true,
                    ..options(algorithm)
                },
            );
            assert!(on + 1e-9 >= off, "{algorithm:?}: {on} < {off}");
        }
    }
}

#[test]
fn async_matches_sync() {
    let mut scene = scene();
    let _ = scene.upsert(wall(1, (300.0, 30.0), (300.0, 70.0)));
    for algorithm in Algorithm::ALL {
        let mut viewer = viewer(&scene, options(algorithm));
        let sync = viewer.percent_visible(&scene, TARGET).unwrap();
        let r#async = pollster::block_on(viewer.percent_visible_async(&scene, TARGET)).unwrap();
        assert!((sync - r#async).abs() < 1e-12, "{algorithm:?}");
        assert!(pollster::block_on(viewer.has_los_async(&scene, TARGET, Some(0.1))).unwrap());
    }
}

#[test]
fn queries_without_a_viewer_fail() {
    let scene = scene();
    let mut viewer = Viewer::new(LosOptions::default());
    assert!(matches!(
        viewer.has_los(&scene, TARGET, None),
        Err(SightlineError::NoViewer)
    ));
}

#[test]
fn options_survive_a_toml_round_trip() {
    let mut opts = options(Algorithm::Geometric);
    opts.large_target = true;
    opts.viewer.points = PointScheme::Four;
    let text = toml::to_string(&opts).unwrap();
    let parsed = LosOptions::from_toml_str(&text).unwrap();
    assert_eq!(parsed, opts);
}
