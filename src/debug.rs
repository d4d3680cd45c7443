//! Debug drawing sink.
//!
//! The visibility pipeline does not render anything itself. When debug
//! output is enabled it describes intermediate shapes (vision polygons,
//! blockers, eye points, lit target shapes) to a [`DebugDraw`]
//! implementation supplied by the host. [`DebugRecorder`] simply stores the
//! calls, which is what tests use.

use glam::DVec2;

/// Semantic role of a debug shape, so hosts can pick colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugStyle {
    /// Vision polygon between an eye and the target.
    VisionPolygon,
    /// The target's border.
    Target,
    /// The lit or otherwise visible part of the target.
    VisibleTarget,
    /// A fully blocking object.
    Blocker,
    /// A terrain (limited) wall.
    Terrain,
    /// An eye point.
    Eye,
    /// A sightline that was blocked.
    BlockedRay,
    /// A sightline that reached the target.
    ClearRay,
}

/// Receiver of debug shapes.
pub trait DebugDraw {
    /// A closed polygon.
    fn polygon(&mut self, points: &[DVec2], style: DebugStyle);
    /// A line segment.
    fn segment(&mut self, a: DVec2, b: DVec2, style: DebugStyle);
    /// A point marker.
    fn point(&mut self, p: DVec2, style: DebugStyle);
}

/// One recorded debug call.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugShape {
    /// From [`DebugDraw::polygon`].
    Polygon(Vec<DVec2>, DebugStyle),
    /// From [`DebugDraw::segment`].
    Segment(DVec2, DVec2, DebugStyle),
    /// From [`DebugDraw::point`].
    Point(DVec2, DebugStyle),
}

impl DebugShape {
    /// Style of the shape.
    #[must_use]
    pub fn style(&self) -> DebugStyle {
        match self {
            Self::Polygon(_, s) | Self::Segment(_, _, s) | Self::Point(_, s) => *s,
        }
    }
}

/// [`DebugDraw`] that keeps every call in order.
#[derive(Debug, Clone, Default)]
pub struct DebugRecorder {
    /// Recorded shapes.
    pub shapes: Vec<DebugShape>,
}

impl DebugRecorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded shapes with `style`.
    #[must_use]
    pub fn count(&self, style: DebugStyle) -> usize {
        self.shapes.iter().filter(|s| s.style() == style).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

impl DebugDraw for DebugRecorder {
    fn polygon(&mut self, points: &[DVec2], style: DebugStyle) {
        self.shapes.push(DebugShape::Polygon(points.to_vec(), style));
    }

    fn segment(&mut self, a: DVec2, b: DVec2, style: DebugStyle) {
        self.shapes.push(DebugShape::Segment(a, b, style));
    }

    fn point(&mut self, p: DVec2, style: DebugStyle) {
        self.shapes.push(DebugShape::Point(p, style));
    }
}
