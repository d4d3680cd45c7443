use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Smallest render target edge accepted.
pub const MIN_RESOLUTION: u32 = 16;
/// Largest render target edge accepted.
pub const MAX_RESOLUTION: u32 = 1024;

/// Clamp a render target edge to `MIN_RESOLUTION..=MAX_RESOLUTION`.
#[must_use]
pub fn clamp_resolution(resolution: u32) -> u32 {
    resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION)
}

/// Where the rasterized algorithm counts fragments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RasterBackend {
    /// Deterministic CPU rasterizer.
    #[default]
    Software,
    /// wgpu offscreen render with buffer readback. Falls back to software
    /// when the `gpu` feature is off or no adapter is available.
    Gpu,
}

/// Rasterized algorithm settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Rasterization", inline)]
#[serde(default)]
pub struct RasterOptions {
    /// Square render target edge in pixels.
    #[schemars(title = "Resolution", range(min = 16, max = 1024))]
    pub resolution: u32,
    /// Backend.
    pub backend: RasterBackend,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            resolution: 128,
            backend: RasterBackend::Software,
        }
    }
}

impl RasterOptions {
    /// Clamp out-of-range values, warning about each one.
    pub fn sanitize(&mut self) {
        let clamped = clamp_resolution(self.resolution);
        if clamped != self.resolution {
            log::warn!(
                "raster resolution {} outside {MIN_RESOLUTION}..={MAX_RESOLUTION}; using {clamped}",
                self.resolution
            );
            self.resolution = clamped;
        }
    }
}
