use std::hash::{Hash, Hasher};

use glam::{DVec2, DVec3};
use rustc_hash::FxHasher;

/// Hash a single `f64` by its bit pattern.
pub fn hash_f64(v: f64, hasher: &mut impl Hasher) {
    v.to_bits().hash(hasher);
}

/// Hash a single [`DVec2`] by converting each component to bits.
pub fn hash_dvec2(v: DVec2, hasher: &mut impl Hasher) {
    hash_f64(v.x, hasher);
    hash_f64(v.y, hasher);
}

/// Hash a single [`DVec3`] by converting each component to bits.
pub fn hash_dvec3(v: DVec3, hasher: &mut impl Hasher) {
    hash_f64(v.x, hasher);
    hash_f64(v.y, hasher);
    hash_f64(v.z, hasher);
}

/// Hash every point of a polygon ring.
///
/// Rings are short (token borders, region outlines), so unlike a summary
/// hash every vertex participates.
pub fn hash_dvec2_slice(slice: &[DVec2], hasher: &mut impl Hasher) {
    slice.len().hash(hasher);
    for v in slice {
        hash_dvec2(*v, hasher);
    }
}

/// Start a fresh hasher for document fingerprints.
pub fn fingerprint_hasher() -> FxHasher {
    FxHasher::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(points: &[DVec2]) -> u64 {
        let mut hasher = fingerprint_hasher();
        hash_dvec2_slice(points, &mut hasher);
        hasher.finish()
    }

    #[test]
    fn identical_rings_hash_equal() {
        let a = [DVec2::ZERO, DVec2::X, DVec2::Y];
        assert_eq!(digest(&a), digest(&a.clone()));
    }

    #[test]
    fn moved_vertex_changes_hash() {
        let a = [DVec2::ZERO, DVec2::X, DVec2::Y];
        let b = [DVec2::ZERO, DVec2::X, DVec2::new(0.0, 1.5)];
        assert_ne!(digest(&a), digest(&b));
    }
}
