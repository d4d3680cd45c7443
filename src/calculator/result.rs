use crate::scene::TokenId;

/// Results below this are reported as exactly zero.
pub const SNAP_EPSILON: f64 = 1e-4;

/// Clamp to `[0, 1]`, map non-finite values to 0 and snap slivers to 0.
#[must_use]
pub fn sanitize_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped < SNAP_EPSILON {
        0.0
    } else {
        clamped
    }
}

/// Fixed-size set of sample points, each either visible or not.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PointSet {
    words: Vec<u64>,
    len: usize,
}

impl PointSet {
    /// `len` points, none visible.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of sample points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark point `index` visible. Out-of-range indices are ignored.
    pub fn set_visible(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    /// Whether point `index` is visible.
    #[must_use]
    pub fn is_visible(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Number of visible points.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Points visible in either set. `None` if the sizes differ.
    #[must_use]
    pub fn union(&self, other: &Self) -> Option<Self> {
        (self.len == other.len).then(|| Self {
            words: self.words.iter().zip(&other.words).map(|(a, b)| a | b).collect(),
            len: self.len,
        })
    }
}

/// Raw measurement behind a percent-visible value.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityData {
    /// Per-sample visibility from point sampling.
    Points(PointSet),
    /// Counted fragments from rasterization.
    Pixels {
        /// Target fragments not blocked.
        visible: u32,
        /// Reference fragment count.
        total: u32,
    },
    /// Projected areas from polygon clipping.
    Area {
        /// Unblocked projected area.
        visible: f64,
        /// Reference projected area.
        total: f64,
    },
    /// A value decided without measuring.
    Fixed(f64),
}

/// Outcome of one visibility calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentVisibleResult {
    /// Token the result is about.
    pub target: TokenId,
    /// Underlying measurement.
    pub data: VisibilityData,
}

impl PercentVisibleResult {
    /// Result fixed at `percent`.
    #[must_use]
    pub fn fixed(target: TokenId, percent: f64) -> Self {
        Self {
            target,
            data: VisibilityData::Fixed(percent),
        }
    }

    /// Fully visible.
    #[must_use]
    pub fn visible(target: TokenId) -> Self {
        Self::fixed(target, 1.0)
    }

    /// Fully blocked.
    #[must_use]
    pub fn blocked(target: TokenId) -> Self {
        Self::fixed(target, 0.0)
    }

    /// Fraction of the target visible, in `[0, 1]`.
    #[must_use]
    pub fn percent(&self) -> f64 {
        let raw = match &self.data {
            VisibilityData::Points(set) if set.is_empty() => 0.0,
            VisibilityData::Points(set) => set.visible_count() as f64 / set.len() as f64,
            VisibilityData::Pixels { total: 0, .. } => 0.0,
            VisibilityData::Pixels { visible, total } => f64::from(*visible) / f64::from(*total),
            VisibilityData::Area { visible, total } => {
                if *total > 0.0 {
                    visible / total
                } else {
                    0.0
                }
            }
            VisibilityData::Fixed(p) => *p,
        };
        sanitize_percent(raw)
    }

    /// The more visible of the two.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other.percent() > self.percent() {
            other
        } else {
            self
        }
    }

    /// The less visible of the two.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if other.percent() < self.percent() {
            other
        } else {
            self
        }
    }

    /// Merge results from two eyes looking at the same samples: a point is
    /// visible if either eye sees it, counts take the larger numerator and
    /// denominator. Mismatched kinds fall back to [`Self::max`].
    #[must_use]
    pub fn blend_maximums(self, other: Self) -> Self {
        let target = self.target;
        let data = match (&self.data, &other.data) {
            (VisibilityData::Points(a), VisibilityData::Points(b)) => match a.union(b) {
                Some(set) => VisibilityData::Points(set),
                None => return self.max(other),
            },
            (
                VisibilityData::Pixels { visible: va, total: ta },
                VisibilityData::Pixels { visible: vb, total: tb },
            ) => VisibilityData::Pixels {
                visible: (*va).max(*vb),
                total: (*ta).max(*tb),
            },
            (
                VisibilityData::Area { visible: va, total: ta },
                VisibilityData::Area { visible: vb, total: tb },
            ) => VisibilityData::Area {
                visible: va.max(*vb),
                total: ta.max(*tb),
            },
            _ => return self.max(other),
        };
        Self { target, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: TokenId = TokenId(1);

    fn points(len: usize, visible: &[usize]) -> PercentVisibleResult {
        let mut set = PointSet::new(len);
        for &i in visible {
            set.set_visible(i);
        }
        PercentVisibleResult {
            target: T,
            data: VisibilityData::Points(set),
        }
    }

    #[test]
    fn percent_is_clamped_and_snapped() {
        assert_eq!(PercentVisibleResult::fixed(T, 1.5).percent(), 1.0);
        assert_eq!(PercentVisibleResult::fixed(T, -0.2).percent(), 0.0);
        assert_eq!(PercentVisibleResult::fixed(T, 5e-5).percent(), 0.0);
        assert_eq!(PercentVisibleResult::fixed(T, f64::NAN).percent(), 0.0);
        let zero_area = PercentVisibleResult {
            target: T,
            data: VisibilityData::Area { visible: 1.0, total: 0.0 },
        };
        assert_eq!(zero_area.percent(), 0.0);
    }

    #[test]
    fn point_fraction() {
        assert!((points(10, &[0, 1, 2, 3]).percent() - 0.4).abs() < 1e-12);
        assert_eq!(points(0, &[]).percent(), 0.0);
    }

    #[test]
    fn bitset_spans_words() {
        let mut set = PointSet::new(130);
        set.set_visible(0);
        set.set_visible(64);
        set.set_visible(129);
        set.set_visible(500);
        assert_eq!(set.visible_count(), 3);
        assert!(set.is_visible(129));
        assert!(!set.is_visible(128));
    }

    #[test]
    fn blend_unions_points() {
        let a = points(4, &[0, 1]);
        let b = points(4, &[1, 2]);
        assert!((a.blend_maximums(b).percent() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn blend_mismatched_takes_max() {
        let a = points(4, &[0]);
        let b = PercentVisibleResult::fixed(T, 0.5);
        assert_eq!(a.blend_maximums(b).percent(), 0.5);
        let c = points(3, &[0, 1, 2]);
        assert_eq!(points(4, &[0]).blend_maximums(c).percent(), 1.0);
    }

    #[test]
    fn max_and_min_pick_by_percent() {
        let low = PercentVisibleResult {
            target: T,
            data: VisibilityData::Pixels { visible: 10, total: 100 },
        };
        let high = PercentVisibleResult {
            target: T,
            data: VisibilityData::Area { visible: 3.0, total: 4.0 },
        };
        assert_eq!(low.clone().max(high.clone()).percent(), 0.75);
        assert!((low.min(high).percent() - 0.1).abs() < 1e-12);
    }
}
