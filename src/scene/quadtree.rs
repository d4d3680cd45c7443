//! Region quadtree used as the scene's spatial index.
//!
//! Items are stored with their bounding rectangle in the deepest node that
//! fully contains it. Items that straddle a split line stay in the parent.

use crate::geometry::Bounds2;

/// Maximum items a leaf holds before splitting.
const MAX_ITEMS: usize = 8;
/// Maximum subdivision depth.
const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: Bounds2,
    depth: usize,
    items: Vec<(Bounds2, T)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy + PartialEq> Node<T> {
    fn new(bounds: Bounds2, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn child_for(&mut self, bounds: &Bounds2) -> Option<&mut Self> {
        self.children
            .as_mut()?
            .iter_mut()
            .find(|c| c.bounds.contains_bounds(bounds))
    }

    fn split(&mut self) {
        let c = self.bounds.center();
        let (min, max) = (self.bounds.min, self.bounds.max);
        let depth = self.depth + 1;
        self.children = Some(Box::new([
            Self::new(Bounds2::new(min, c), depth),
            Self::new(
                Bounds2::new(glam::DVec2::new(c.x, min.y), glam::DVec2::new(max.x, c.y)),
                depth,
            ),
            Self::new(Bounds2::new(c, max), depth),
            Self::new(
                Bounds2::new(glam::DVec2::new(min.x, c.y), glam::DVec2::new(c.x, max.y)),
                depth,
            ),
        ]));
        let items = std::mem::take(&mut self.items);
        for (b, item) in items {
            self.insert(b, item);
        }
    }

    fn insert(&mut self, bounds: Bounds2, item: T) {
        if let Some(child) = self.child_for(&bounds) {
            child.insert(bounds, item);
            return;
        }
        self.items.push((bounds, item));
        if self.children.is_none() && self.items.len() > MAX_ITEMS && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    fn remove(&mut self, bounds: &Bounds2, item: T) -> bool {
        if let Some(pos) = self.items.iter().position(|(_, i)| *i == item) {
            let _ = self.items.swap_remove(pos);
            return true;
        }
        self.child_for(bounds)
            .is_some_and(|child| child.remove(bounds, item))
    }

    fn query(&self, region: &Bounds2, out: &mut Vec<T>) {
        if !self.bounds.intersects(region) && self.depth > 0 {
            return;
        }
        out.extend(
            self.items
                .iter()
                .filter(|(b, _)| b.intersects(region))
                .map(|(_, i)| *i),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(region, out);
            }
        }
    }
}

/// Spatial index answering "which items might intersect this rectangle?".
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    root: Node<T>,
    len: usize,
}

impl<T: Copy + PartialEq> QuadTree<T> {
    /// Create an empty tree covering `bounds`. Items outside the bounds are
    /// still accepted; they live in the root node.
    #[must_use]
    pub fn new(bounds: Bounds2) -> Self {
        Self {
            root: Node::new(bounds, 0),
            len: 0,
        }
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an item with its bounding rectangle.
    pub fn insert(&mut self, bounds: Bounds2, item: T) {
        self.root.insert(bounds, item);
        self.len += 1;
    }

    /// Remove an item previously inserted with `bounds`.
    /// Returns `false` if it was not found.
    pub fn remove(&mut self, bounds: &Bounds2, item: T) -> bool {
        let removed = self.root.remove(bounds, item);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Items whose bounds intersect `region`, in no particular order.
    #[must_use]
    pub fn query(&self, region: &Bounds2) -> Vec<T> {
        let mut out = Vec::new();
        self.root.query(region, &mut out);
        out
    }
}
