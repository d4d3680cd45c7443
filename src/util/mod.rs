//! Shared utilities.
//!
//! Hash helpers used for change detection on placeable documents.

pub mod hash;
