use glam::DVec2;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::Bounds2;

/// Upper bound on the cells one shape is split into.
pub const MAX_CELLS: usize = 4096;

/// Grid layout of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Square cells aligned to the scene origin.
    #[default]
    Square,
    /// No grid; cells are laid out from each shape's own corner.
    Gridless,
}

/// Scene grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Grid {
    /// Cell edge length in scene units.
    pub size: f64,
    /// Layout.
    pub kind: GridKind,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            size: 100.0,
            kind: GridKind::Square,
        }
    }
}

impl Grid {
    /// Cells covering `bounds`, each clipped to it. Cells with no area are
    /// skipped. A non-positive cell size, or one so small that the cell
    /// count would exceed [`MAX_CELLS`], yields `bounds` itself.
    #[must_use]
    pub fn cells(&self, bounds: &Bounds2) -> Vec<Bounds2> {
        if self.size <= 0.0 || !self.size.is_finite() {
            return vec![*bounds];
        }
        let origin = match self.kind {
            GridKind::Square => DVec2::new(
                (bounds.min.x / self.size).floor() * self.size,
                (bounds.min.y / self.size).floor() * self.size,
            ),
            GridKind::Gridless => bounds.min,
        };
        let columns = ((bounds.max.x - origin.x) / self.size).ceil();
        let rows = ((bounds.max.y - origin.y) / self.size).ceil();
        if !(columns * rows).is_finite() || columns * rows > MAX_CELLS as f64 {
            let size = self.size;
            log::warn!("grid size {size} splits {bounds:?} into too many cells; using one");
            return vec![*bounds];
        }
        let (columns, rows) = (columns.max(0.0) as usize, rows.max(0.0) as usize);

        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            let y = origin.y + row as f64 * self.size;
            for column in 0..columns {
                let x = origin.x + column as f64 * self.size;
                let cell = Bounds2::from_origin_size(DVec2::new(x, y), DVec2::splat(self.size));
                if let Some(clipped) = cell.intersection(bounds) {
                    if clipped.area() > 0.0 {
                        cells.push(clipped);
                    }
                }
            }
        }
        if cells.is_empty() {
            cells.push(*bounds);
        }
        cells
    }

    /// One cell centered on `bounds`, no larger than `bounds` along either
    /// axis.
    #[must_use]
    pub fn center_cell(&self, bounds: &Bounds2) -> Bounds2 {
        let half = DVec2::new(
            self.size.min(bounds.width()),
            self.size.min(bounds.height()),
        ) * 0.5;
        let c = bounds.center();
        Bounds2::new(c - half, c + half)
    }

    /// Returns `true` if `bounds` spans more than one cell along either axis.
    #[must_use]
    pub fn is_larger_than_cell(&self, bounds: &Bounds2) -> bool {
        self.size > 0.0 && (bounds.width() > self.size + 1e-9 || bounds.height() > self.size + 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_cells_align_to_grid() {
        let grid = Grid::default();
        let cells = grid.cells(&Bounds2::new(DVec2::new(50.0, 0.0), DVec2::new(250.0, 100.0)));
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].width(), 50.0);
        assert_eq!(cells[1].width(), 100.0);
    }

    #[test]
    fn gridless_cells_start_at_corner() {
        let grid = Grid {
            kind: GridKind::Gridless,
            ..Grid::default()
        };
        let cells = grid.cells(&Bounds2::new(DVec2::new(50.0, 0.0), DVec2::new(250.0, 100.0)));
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.width() == 100.0));
    }

    #[test]
    fn center_cell_is_clamped() {
        let grid = Grid::default();
        let cell = grid.center_cell(&Bounds2::new(DVec2::ZERO, DVec2::new(400.0, 50.0)));
        assert_eq!(cell.width(), 100.0);
        assert_eq!(cell.height(), 50.0);
        assert_eq!(cell.center(), DVec2::new(200.0, 25.0));
        assert!(grid.is_larger_than_cell(&Bounds2::new(DVec2::ZERO, DVec2::new(400.0, 50.0))));
    }

    #[test]
    fn far_coordinates_terminate() {
        let grid = Grid {
            size: 1.0,
            ..Grid::default()
        };
        let far = Bounds2::new(DVec2::splat(1e17), DVec2::splat(1e17 + 100.0));
        let cells = grid.cells(&far);
        assert!(!cells.is_empty());
        assert!(cells.len() <= MAX_CELLS);
    }

    #[test]
    fn tiny_cells_fall_back_to_whole_shape() {
        let grid = Grid {
            size: 1e-3,
            ..Grid::default()
        };
        let bounds = Bounds2::new(DVec2::ZERO, DVec2::splat(100.0));
        assert_eq!(grid.cells(&bounds), vec![bounds]);
    }
}
