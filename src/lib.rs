// -- Lint policy ---------------------------------------------------------
// Compile-time lints live here; clippy groups live in Cargo.toml.

// Documentation
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// Unused / redundant code
#![warn(unused_results)]
#![warn(unused_qualifications)]
// Cast hygiene
#![warn(trivial_casts)]
#![warn(trivial_numeric_casts)]

//! Line-of-sight and percent-visibility for 2.5D tabletop scenes.
//!
//! Sightline answers one question for a pair of tokens: what fraction of
//! the target's silhouette can the viewer see, given the walls, overhead
//! tiles, other tokens, regions and lights of a [`scene::Scene`]?
//!
//! # Key entry points
//!
//! - [`viewer::Viewer`] - multi-eye aggregator exposing `percent_visible`
//!   and `has_los` (plus async variants)
//! - [`options::LosOptions`] - runtime configuration, TOML-serializable
//! - [`calculator::Algorithm`] - the interchangeable visibility algorithms
//!
//! # Architecture
//!
//! A [`viewer::Viewer`] owns one [`viewpoint::Viewpoint`] per eye. Each
//! viewpoint culls the scene down to plausible blockers with a
//! [`culling::VisionPolygon`], short-circuits trivially decidable cases, and
//! otherwise delegates to a [`calculator::Calculator`]: point sampling,
//! projected polygon clipping, or rasterized fragment counting (software, or
//! wgpu with the `gpu` feature). The viewer keeps the maximum over its eyes.

pub mod calculator;
pub mod camera;
pub mod culling;
pub mod debug;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod options;
pub mod sampling;
pub mod scene;
pub mod util;
pub mod viewer;
pub mod viewpoint;

pub use calculator::{Algorithm, PercentVisibleResult};
pub use error::SightlineError;
pub use options::LosOptions;
pub use scene::{Scene, TokenId};
pub use viewer::Viewer;
