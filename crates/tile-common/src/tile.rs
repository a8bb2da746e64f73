//! WebMercatorQuad tile addressing.
//!
//! Implements the slippy-map tiling scheme: zoom level `z` has `2^z` tiles
//! per axis, origin in the top-left (north-west) corner.

use crate::{TileError, TileResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Highest zoom level accepted by the projection.
pub const MAX_ZOOM: u32 = 30;

/// Latitude limit of the Web Mercator projection, in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level (TileMatrix identifier)
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Build a coordinate from signed indices, pulling each axis into
    /// `[0, 2^z - 1]` independently.
    pub fn clamped(z: u32, x: i64, y: i64) -> Self {
        let max = max_tile_for_zoom(z) as i64;
        Self {
            z,
            x: x.clamp(0, max) as u32,
            y: y.clamp(0, max) as u32,
        }
    }

    /// Whether both axes lie inside the grid for this zoom.
    pub fn is_valid(&self) -> bool {
        let max = max_tile_for_zoom(self.z);
        self.x <= max && self.y <= max
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Get the maximum tile index for a zoom level.
///
/// Saturates at `u32::MAX` for zooms whose grid does not fit in a `u32`.
pub fn max_tile_for_zoom(zoom: u32) -> u32 {
    match 1u64.checked_shl(zoom) {
        Some(n) if n <= u32::MAX as u64 + 1 => (n - 1) as u32,
        _ => u32::MAX,
    }
}

/// Geographic bounds of a tile, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// The WebMercatorQuad tile matrix set.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorQuad;

impl WebMercatorQuad {
    /// Tile containing the point `(lng, lat)` at `zoom`.
    ///
    /// Latitudes beyond the Mercator limit are pulled to the limit and the
    /// result is kept inside the grid, so `lng = 180` maps to the last column.
    pub fn tile(&self, lng: f64, lat: f64, zoom: u32) -> TileResult<TileCoord> {
        if !lng.is_finite() || !lat.is_finite() {
            return Err(TileError::InvalidCoordinate { lng, lat });
        }
        if zoom > MAX_ZOOM {
            return Err(TileError::ZoomOutOfRange {
                zoom,
                max: MAX_ZOOM,
            });
        }

        let n = (1u64 << zoom) as f64;
        let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

        let x = ((lng + 180.0) / 360.0 * n).floor() as i64;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as i64;

        Ok(TileCoord::clamped(zoom, x, y))
    }

    /// Geographic bounds of a tile.
    pub fn bounds(&self, coord: &TileCoord) -> LngLatBounds {
        tile_to_latlon_bounds(coord)
    }
}

/// Convert lat/lon to Web Mercator tile coordinates.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileResult<TileCoord> {
    WebMercatorQuad.tile(lon, lat, zoom)
}

/// Convert Web Mercator tile coordinates to lat/lon bounds.
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> LngLatBounds {
    let n = (1u64 << coord.z.min(MAX_ZOOM)) as f64;
    let x = coord.x as f64;
    let y = coord.y as f64;

    let lat_at = |row: f64| (PI * (1.0 - 2.0 * row / n)).sinh().atan().to_degrees();

    LngLatBounds {
        west: x / n * 360.0 - 180.0,
        east: (x + 1.0) / n * 360.0 - 180.0,
        north: lat_at(y),
        south: lat_at(y + 1.0),
    }
}
