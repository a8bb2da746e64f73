//! Error types for tile math.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Errors raised by projection and tile addressing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    #[error("Zoom level {zoom} exceeds maximum supported zoom {max}")]
    ZoomOutOfRange { zoom: u32, max: u32 },

    #[error("Invalid coordinate ({lng}, {lat}): longitude and latitude must be finite")]
    InvalidCoordinate { lng: f64, lat: f64 },
}
