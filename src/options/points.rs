use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sampling::PointScheme;

/// Eye points placed on the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Viewer", inline)]
#[serde(default)]
pub struct ViewerPointOptions {
    /// Where eyes are placed on the viewer's border.
    #[schemars(title = "Viewer Points")]
    pub points: PointScheme,
    /// Fraction of the half extent by which eye points move inward.
    #[schemars(title = "Inset", range(min = 0.0, max = 0.99), extend("step" = 0.01))]
    pub inset: f64,
    /// Eye elevation as a fraction of the viewer's vertical height.
    #[schemars(title = "Eye Height", range(min = 0.0, max = 1.0), extend("step" = 0.05))]
    pub eye_height: f64,
}

impl Default for ViewerPointOptions {
    fn default() -> Self {
        Self {
            points: PointScheme::Center,
            inset: 0.1,
            eye_height: 1.0,
        }
    }
}

/// Sample points placed on the target (point-sampling algorithm).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Target", inline)]
#[serde(default)]
pub struct TargetPointOptions {
    /// Where samples are placed on the target's border.
    #[schemars(title = "Target Points")]
    pub points: PointScheme,
    /// Fraction of the half extent by which samples move inward.
    #[schemars(title = "Inset", range(min = 0.0, max = 0.99), extend("step" = 0.01))]
    pub inset: f64,
    /// Sample at the target's top and bottom instead of mid height.
    #[schemars(title = "3D Points")]
    pub points_3d: bool,
}

impl Default for TargetPointOptions {
    fn default() -> Self {
        Self {
            points: PointScheme::Five,
            inset: 0.25,
            points_3d: true,
        }
    }
}
