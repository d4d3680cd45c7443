use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Debug visualization toggles.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[schemars(title = "Debug", inline)]
#[serde(default)]
pub struct DebugOptions {
    /// Record vision polygons, blockers and eye points for each evaluated
    /// viewpoint.
    #[schemars(title = "Draw Debug")]
    pub enabled: bool,
}
