//! Visibility options with TOML preset support.
//!
//! Everything a host can tune (sense, threshold, algorithm, sampling
//! schemes, which placeables block, rasterization backend, debug output)
//! lives in [`LosOptions`]. Options serialize to/from TOML; every section
//! uses `#[serde(default)]` so partial files work.

mod block;
mod debug;
mod points;
mod raster;

use std::path::Path;

pub use block::{BlockOptions, TileOptions, TokenBlockOptions};
pub use debug::DebugOptions;
pub use points::{TargetPointOptions, ViewerPointOptions};
pub use raster::{
    clamp_resolution, RasterBackend, RasterOptions, MAX_RESOLUTION, MIN_RESOLUTION,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{calculator::Algorithm, error::SightlineError, scene::SenseType};

/// Top-level options container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct LosOptions {
    /// Sense the test is run for.
    pub sense_type: SenseType,
    /// Minimum percent visible (`[0, 1]`) for `has_los`.
    #[schemars(title = "Threshold", range(min = 0.0, max = 1.0), extend("step" = 0.05))]
    pub threshold: f64,
    /// Visibility algorithm.
    pub algorithm: Algorithm,
    /// Cap the denominator at one grid cell for targets larger than a cell.
    pub large_target: bool,
    /// Count only the lit part of the target as visible.
    pub use_lit_target_shape: bool,
    /// Clip the target's border by walls crossing it.
    pub use_constrained_target_border: bool,
    /// Eye placement on the viewer.
    pub viewer: ViewerPointOptions,
    /// Sample placement on the target.
    pub target: TargetPointOptions,
    /// Which placeables block.
    pub block: BlockOptions,
    /// Tile transparency.
    pub tile: TileOptions,
    /// Rasterization settings.
    pub raster: RasterOptions,
    /// Debug output.
    pub debug: DebugOptions,
}

impl Default for LosOptions {
    fn default() -> Self {
        Self {
            sense_type: SenseType::Sight,
            threshold: 0.0,
            algorithm: Algorithm::Points,
            large_target: false,
            use_lit_target_shape: false,
            use_constrained_target_border: true,
            viewer: ViewerPointOptions::default(),
            target: TargetPointOptions::default(),
            block: BlockOptions::default(),
            tile: TileOptions::default(),
            raster: RasterOptions::default(),
            debug: DebugOptions::default(),
        }
    }
}

impl LosOptions {
    /// Generate JSON Schema describing the options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(LosOptions)
    }

    /// Parse options from TOML text. Missing fields use defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, SightlineError> {
        let mut options: Self =
            toml::from_str(content).map_err(|e| SightlineError::OptionsParse(e.to_string()))?;
        options.raster.sanitize();
        Ok(options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, SightlineError> {
        let content = std::fs::read_to_string(path).map_err(SightlineError::Io)?;
        let options = Self::from_toml_str(&content)?;
        log::info!("loaded visibility options from {}", path.display());
        Ok(options)
    }

    /// Save options to a TOML file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<(), SightlineError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SightlineError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SightlineError::Io)?;
        }
        std::fs::write(path, content).map_err(SightlineError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::PointScheme;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = LosOptions::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed = LosOptions::from_toml_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
algorithm = "geometric"

[viewer]
points = "nine"

[block.tokens]
dead = true
"#;
        let opts = LosOptions::from_toml_str(toml_str).unwrap();
        assert_eq!(opts.algorithm, Algorithm::Geometric);
        assert_eq!(opts.viewer.points, PointScheme::Nine);
        assert_eq!(opts.viewer.inset, 0.1);
        assert!(opts.block.tokens.dead);
        assert!(opts.block.tokens.live);
        assert_eq!(opts.target.points, PointScheme::Five);
        assert_eq!(opts.tile.alpha_threshold, 0.75);
    }

    #[test]
    fn out_of_range_resolution_is_clamped_on_load() {
        let big = LosOptions::from_toml_str("[raster]\nresolution = 70000").unwrap();
        assert_eq!(big.raster.resolution, MAX_RESOLUTION);
        let small = LosOptions::from_toml_str("[raster]\nresolution = 2").unwrap();
        assert_eq!(small.raster.resolution, MIN_RESOLUTION);
    }

    #[test]
    fn unknown_algorithm_falls_back_to_points() {
        let opts = LosOptions::from_toml_str("algorithm = \"webgl2\"").unwrap();
        assert_eq!(opts.algorithm, Algorithm::Points);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = LosOptions::from_toml_str("threshold = [").unwrap_err();
        assert!(matches!(err, SightlineError::OptionsParse(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("sightline-options-{}", std::process::id()));
        let path = dir.join("preset.toml");
        let opts = LosOptions {
            threshold: 0.5,
            large_target: true,
            ..LosOptions::default()
        };
        opts.save(&path).unwrap();
        assert_eq!(LosOptions::load(&path).unwrap(), opts);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value = serde_json::to_value(LosOptions::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();
        for key in ["threshold", "algorithm", "viewer", "target", "block", "raster", "debug"] {
            assert!(props.contains_key(key), "missing {key}");
        }
        assert!(props["viewer"]["properties"].get("eye_height").is_some());
    }
}
