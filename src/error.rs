//! Crate-level error types.

use std::fmt;

#[cfg(feature = "gpu")]
use crate::calculator::raster::gpu::GpuContextError;
use crate::scene::TokenId;

/// Errors produced by the sightline crate.
///
/// Geometry never fails: degenerate shapes resolve to safe defaults. These
/// errors cover API misuse, configuration I/O and GPU backend failures.
#[derive(Debug)]
pub enum SightlineError {
    /// GPU context initialization failure.
    #[cfg(feature = "gpu")]
    Gpu(GpuContextError),
    /// Reading rendered pixels back from the GPU failed.
    Readback(String),
    /// The referenced token does not exist in the scene.
    UnknownToken(TokenId),
    /// A visibility query was made before a viewer token was assigned.
    NoViewer,
    /// The viewer was used after `destroy()`.
    Destroyed,
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl fmt::Display for SightlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "gpu")]
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Readback(msg) => write!(f, "pixel readback failed: {msg}"),
            Self::UnknownToken(id) => write!(f, "unknown token {id}"),
            Self::NoViewer => write!(f, "no viewer token assigned"),
            Self::Destroyed => write!(f, "viewer has been destroyed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for SightlineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "gpu")]
            Self::Gpu(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "gpu")]
impl From<GpuContextError> for SightlineError {
    fn from(e: GpuContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for SightlineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_token() {
        let err = SightlineError::UnknownToken(TokenId(7));
        assert_eq!(err.to_string(), "unknown token token#7");
    }

    #[test]
    fn io_errors_expose_their_source() {
        use std::error::Error;
        let err = SightlineError::from(std::io::Error::other("disk"));
        assert!(err.source().is_some());
        assert!(SightlineError::NoViewer.source().is_none());
    }
}
