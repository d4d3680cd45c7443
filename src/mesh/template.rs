//! Unit-shape templates shared by every placeable of a kind.

use glam::{DVec2, DVec3};

/// Which unit shape a template describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    /// Unit quad standing in the xz plane: x in `[-0.5, 0.5]`, z in `[0, 1]`.
    VerticalQuad,
    /// Unit quad lying in the xy plane: x, y in `[-0.5, 0.5]`, with UVs.
    HorizontalQuad,
    /// Unit box: x, y in `[-0.5, 0.5]`, z in `[0, 1]`.
    Cube,
}

/// Vertex and index data of a unit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Model-space positions.
    pub vertices: Vec<DVec3>,
    /// Per-vertex texture coordinates; empty when untextured.
    pub uvs: Vec<DVec2>,
    /// Triangle list.
    pub indices: Vec<u16>,
}

/// Templates built once and looked up by [`TemplateKey`].
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    vertical_quad: Template,
    horizontal_quad: Template,
    cube: Template,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Build every template.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertical_quad: vertical_quad(),
            horizontal_quad: horizontal_quad(),
            cube: cube(),
        }
    }

    /// Template for `key`.
    #[must_use]
    pub fn get(&self, key: TemplateKey) -> &Template {
        match key {
            TemplateKey::VerticalQuad => &self.vertical_quad,
            TemplateKey::HorizontalQuad => &self.horizontal_quad,
            TemplateKey::Cube => &self.cube,
        }
    }
}

fn vertical_quad() -> Template {
    Template {
        vertices: vec![
            DVec3::new(-0.5, 0.0, 0.0),
            DVec3::new(0.5, 0.0, 0.0),
            DVec3::new(0.5, 0.0, 1.0),
            DVec3::new(-0.5, 0.0, 1.0),
        ],
        uvs: Vec::new(),
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

fn horizontal_quad() -> Template {
    Template {
        vertices: vec![
            DVec3::new(-0.5, -0.5, 0.0),
            DVec3::new(0.5, -0.5, 0.0),
            DVec3::new(0.5, 0.5, 0.0),
            DVec3::new(-0.5, 0.5, 0.0),
        ],
        uvs: vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 1.0),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

fn cube() -> Template {
    let vertices = vec![
        // Bottom ring, counter-clockwise from above.
        DVec3::new(-0.5, -0.5, 0.0),
        DVec3::new(0.5, -0.5, 0.0),
        DVec3::new(0.5, 0.5, 0.0),
        DVec3::new(-0.5, 0.5, 0.0),
        // Top ring.
        DVec3::new(-0.5, -0.5, 1.0),
        DVec3::new(0.5, -0.5, 1.0),
        DVec3::new(0.5, 0.5, 1.0),
        DVec3::new(-0.5, 0.5, 1.0),
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2, // bottom
        4, 5, 6, 4, 6, 7, // top
        0, 1, 5, 0, 5, 4, // -y
        1, 2, 6, 1, 6, 5, // +x
        2, 3, 7, 2, 7, 6, // +y
        3, 0, 4, 3, 4, 7, // -x
    ];
    Template {
        vertices,
        uvs: Vec::new(),
        indices,
    }
}
