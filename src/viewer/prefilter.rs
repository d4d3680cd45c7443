//! Checks made before any eye is consulted.

use crate::{
    geometry::polygon::{polygon_from_points, polygons_intersect},
    scene::{Placeable, Token},
};

/// Returns `true` if the two tokens' rectangles share area and their
/// vertical ranges overlap. A rider and its mount, or two tokens squeezed
/// into one space, always see each other.
#[must_use]
pub fn overlaps_directly(viewer: &Token, target: &Token) -> bool {
    let shares_area = viewer
        .bounds()
        .intersection(&target.bounds())
        .is_some_and(|b| b.area() > 0.0);
    let shares_height = viewer.bottom_z() <= target.top_z() && target.bottom_z() <= viewer.top_z();
    shares_area && shares_height
}

/// Returns `true` if `border` lies entirely outside the viewer's vision
/// cone. All-around vision never excludes anything.
#[must_use]
pub fn outside_vision_cone(viewer: &Token, border: &[glam::DVec2]) -> bool {
    let center = viewer.center();
    let reach = border
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0_f64, f64::max);
    let Some(cone) = viewer.vision_cone(reach * 1.01 + 1.0) else {
        return false;
    };
    !polygons_intersect(&polygon_from_points(&cone), &polygon_from_points(border))
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::scene::TokenId;

    #[test]
    fn stacked_tokens_overlap() {
        let a = Token::new(TokenId(1), 0.0, 0.0);
        let mut b = Token::new(TokenId(2), 50.0, 50.0);
        assert!(overlaps_directly(&a, &b));
        b.elevation = 500.0;
        assert!(!overlaps_directly(&a, &b));
    }

    #[test]
    fn adjacent_tokens_do_not_overlap() {
        let a = Token::new(TokenId(1), 0.0, 0.0);
        let b = Token::new(TokenId(2), 100.0, 0.0);
        assert!(!overlaps_directly(&a, &b));
    }

    #[test]
    fn target_behind_a_narrow_cone_is_excluded() {
        let mut viewer = Token::new(TokenId(1), 0.0, 0.0);
        viewer.vision_angle = 90.0;
        // Facing +x; the target sits at -x.
        let behind = Token::new(TokenId(2), -600.0, 0.0).rectangle();
        let ahead = Token::new(TokenId(3), 600.0, 0.0).rectangle();
        assert!(outside_vision_cone(&viewer, &behind));
        assert!(!outside_vision_cone(&viewer, &ahead));
        viewer.vision_angle = 360.0;
        assert!(!outside_vision_cone(&viewer, &behind));
    }

    #[test]
    fn cone_reaches_the_far_side() {
        let mut viewer = Token::new(TokenId(1), 0.0, 0.0);
        viewer.vision_angle = 10.0;
        let border = [
            DVec2::new(900.0, 40.0),
            DVec2::new(1000.0, 40.0),
            DVec2::new(1000.0, 60.0),
            DVec2::new(900.0, 60.0),
        ];
        assert!(!outside_vision_cone(&viewer, &border));
    }
}
