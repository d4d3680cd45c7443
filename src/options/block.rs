use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which placeable categories may block a sightline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Blocking", inline)]
#[serde(default)]
pub struct BlockOptions {
    /// Walls block.
    pub walls: bool,
    /// Overhead tiles block.
    pub tiles: bool,
    /// Sight-blocking regions block.
    pub regions: bool,
    /// Which tokens block.
    pub tokens: TokenBlockOptions,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            walls: true,
            tiles: true,
            regions: true,
            tokens: TokenBlockOptions::default(),
        }
    }
}

/// Token blocking by status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Token Blocking", inline)]
#[serde(default)]
pub struct TokenBlockOptions {
    /// Living tokens block.
    pub live: bool,
    /// Dead tokens block.
    pub dead: bool,
    /// Prone tokens block.
    pub prone: bool,
}

impl Default for TokenBlockOptions {
    fn default() -> Self {
        Self {
            live: true,
            dead: false,
            prone: false,
        }
    }
}

/// Tile transparency handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Tiles", inline)]
#[serde(default)]
pub struct TileOptions {
    /// Texels with alpha below this do not block.
    #[schemars(title = "Alpha Threshold", range(min = 0.0, max = 1.0), extend("step" = 0.05))]
    pub alpha_threshold: f64,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            alpha_threshold: 0.75,
        }
    }
}
