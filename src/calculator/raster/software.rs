use glam::{DVec2, DVec4};

use super::{ClipTriangle, PixelCounts, RasterFrame};
use crate::options::clamp_resolution;

/// One covered pixel.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    index: usize,
    /// Normalized device depth in `[0, 1]`.
    depth: f64,
    uv: Option<DVec2>,
}

/// Deterministic CPU rasterizer sampling pixel centers with a top-left fill
/// rule, so triangles sharing an edge never both cover a pixel.
#[derive(Debug, Clone)]
pub struct SoftwareRasterizer {
    size: u32,
    depth: Vec<f64>,
    blocked: Vec<bool>,
    terrain_hits: Vec<u8>,
    terrain_stamp: Vec<u32>,
}

impl SoftwareRasterizer {
    /// Rasterizer with a `size`² target, clamped to the accepted
    /// resolution range.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self {
            size: clamp_resolution(size),
            depth: Vec::new(),
            blocked: Vec::new(),
            terrain_hits: Vec::new(),
            terrain_stamp: Vec::new(),
        }
    }

    /// Target size along each axis.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Free the scratch buffers.
    pub fn release(&mut self) {
        self.depth = Vec::new();
        self.blocked = Vec::new();
        self.terrain_hits = Vec::new();
        self.terrain_stamp = Vec::new();
    }

    /// Run the reference, cell and main passes over `frame`.
    pub fn count(&mut self, frame: &RasterFrame<'_>) -> PixelCounts {
        let reference = self.coverage(&frame.reference);
        let cell = frame.cell.as_ref().map(|tris| self.coverage(tris));
        let visible = self.visible_pixels(frame);
        PixelCounts {
            reference,
            cell,
            visible,
        }
    }

    fn reset(&mut self) {
        let side = self.size as usize;
        let pixels = side * side;
        self.depth.clear();
        self.depth.resize(pixels, f64::INFINITY);
        self.blocked.clear();
        self.blocked.resize(pixels, false);
        self.terrain_hits.clear();
        self.terrain_hits.resize(pixels, 0);
        self.terrain_stamp.clear();
        self.terrain_stamp.resize(pixels, 0);
    }

    fn coverage(&mut self, triangles: &[ClipTriangle]) -> u32 {
        self.reset();
        let size = self.size;
        let blocked = &mut self.blocked;
        let mut count = 0;
        for tri in triangles {
            rasterize(size, tri, |f| {
                if !blocked[f.index] {
                    blocked[f.index] = true;
                    count += 1;
                }
            });
        }
        count
    }

    fn visible_pixels(&mut self, frame: &RasterFrame<'_>) -> u32 {
        self.reset();
        let size = self.size;
        let Self {
            depth,
            blocked,
            terrain_hits,
            terrain_stamp,
            ..
        } = self;

        for tri in &frame.target {
            rasterize(size, tri, |f| {
                if f.depth < depth[f.index] {
                    depth[f.index] = f.depth;
                }
            });
        }

        for layer in &frame.opaque {
            for tri in &layer.triangles {
                rasterize(size, tri, |f| {
                    if f.depth >= depth[f.index] || blocked[f.index] {
                        return;
                    }
                    let opaque = match (layer.tile, f.uv) {
                        (Some(tile), Some(uv)) => tile.is_opaque_at(uv, frame.alpha_threshold),
                        _ => true,
                    };
                    if opaque {
                        blocked[f.index] = true;
                    }
                });
            }
        }

        for (wall, triangles) in frame.terrain.iter().enumerate() {
            let stamp = wall as u32 + 1;
            for tri in triangles {
                rasterize(size, tri, |f| {
                    if f.depth < depth[f.index] && terrain_stamp[f.index] != stamp {
                        terrain_stamp[f.index] = stamp;
                        terrain_hits[f.index] = terrain_hits[f.index].saturating_add(1);
                    }
                });
            }
        }

        let visible = depth
            .iter()
            .zip(blocked.iter())
            .zip(terrain_hits.iter())
            .filter(|((d, b), t)| d.is_finite() && !**b && **t < 2)
            .count();
        u32::try_from(visible).unwrap_or(u32::MAX)
    }
}

/// Clip-space vertex with its texture coordinate.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    position: DVec4,
    uv: DVec2,
}

/// Screen-space vertex ready for interpolation.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    xy: DVec2,
    depth: f64,
    inv_w: f64,
    uv_over_w: DVec2,
}

/// Cut a clip-space polygon at the near plane (`z >= 0`).
fn clip_near(polygon: &[ClipVertex]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, &current) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        let (dc, dn) = (current.position.z, next.position.z);
        if dc >= 0.0 {
            out.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push(ClipVertex {
                position: current.position + (next.position - current.position) * t,
                uv: current.uv + (next.uv - current.uv) * t,
            });
        }
    }
    out
}

fn edge(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top or left edge of a triangle with positive `edge` area in y-down
/// screen space.
fn is_top_left(a: DVec2, b: DVec2) -> bool {
    (a.y == b.y && b.x > a.x) || b.y < a.y
}

/// Visit every pixel center covered by `tri` on a `size`² target.
fn rasterize(size: u32, tri: &ClipTriangle, mut visit: impl FnMut(Fragment)) {
    let uvs = tri.uvs.unwrap_or([DVec2::ZERO; 3]);
    let corners: Vec<ClipVertex> = (0..3)
        .map(|i| ClipVertex {
            position: tri.positions[i],
            uv: uvs[i],
        })
        .collect();
    let polygon = clip_near(&corners);
    if polygon.len() < 3 {
        return;
    }
    let extent = f64::from(size);
    let screen: Vec<ScreenVertex> = polygon
        .iter()
        .map(|v| {
            let inv_w = 1.0 / v.position.w;
            let ndc = v.position.truncate() * inv_w;
            ScreenVertex {
                xy: DVec2::new((ndc.x + 1.0) * 0.5 * extent, (1.0 - ndc.y) * 0.5 * extent),
                depth: ndc.z,
                inv_w,
                uv_over_w: v.uv * inv_w,
            }
        })
        .collect();
    for i in 1..screen.len() - 1 {
        fill(size, [screen[0], screen[i], screen[i + 1]], tri.uvs.is_some(), &mut visit);
    }
}

fn fill(size: u32, mut v: [ScreenVertex; 3], textured: bool, visit: &mut impl FnMut(Fragment)) {
    let mut area = edge(v[0].xy, v[1].xy, v[2].xy);
    if !area.is_finite() || area.abs() < 1e-12 {
        return;
    }
    if area < 0.0 {
        v.swap(1, 2);
        area = -area;
    }
    let extent = f64::from(size);
    let min = v[0].xy.min(v[1].xy).min(v[2].xy).max(DVec2::ZERO);
    let max = v[0].xy.max(v[1].xy).max(v[2].xy).min(DVec2::splat(extent));
    if min.x >= max.x || min.y >= max.y {
        return;
    }
    let edges = [(1, 2), (2, 0), (0, 1)];
    let bias = edges.map(|(a, b)| is_top_left(v[a].xy, v[b].xy));
    let span = |lo: f64, hi: f64| {
        (
            (lo - 0.5).floor().max(0.0) as u32,
            (hi - 0.5).ceil().min(extent - 1.0) as u32,
        )
    };
    let (x0, x1) = span(min.x, max.x);
    let (y0, y1) = span(min.y, max.y);

    for py in y0..=y1 {
        for px in x0..=x1 {
            let p = DVec2::new(f64::from(px) + 0.5, f64::from(py) + 0.5);
            let mut weights = [0.0; 3];
            let mut inside = true;
            for (k, &(a, b)) in edges.iter().enumerate() {
                let w = edge(v[a].xy, v[b].xy, p);
                if w < 0.0 || (w == 0.0 && !bias[k]) {
                    inside = false;
                    break;
                }
                weights[k] = w / area;
            }
            if !inside {
                continue;
            }
            let depth = weights[0] * v[0].depth
                + weights[1] * v[1].depth
                + weights[2] * v[2].depth;
            let uv = textured.then(|| {
                let inv_w = weights[0] * v[0].inv_w
                    + weights[1] * v[1].inv_w
                    + weights[2] * v[2].inv_w;
                (v[0].uv_over_w * weights[0]
                    + v[1].uv_over_w * weights[1]
                    + v[2].uv_over_w * weights[2])
                    / inv_w
            });
            visit(Fragment {
                index: py as usize * size as usize + px as usize,
                depth,
                uv,
            });
        }
    }
}
