//! Viewport tile enumeration.
//!
//! A viewport is the rectangular block of tiles a map client requests to fill
//! a screen around a focal tile. Tiles that would fall outside the grid are
//! clamped to the nearest edge tile rather than dropped, so viewports near the
//! grid boundary request some edge tiles more than once.

use crate::tile::TileCoord;
use serde::{Deserialize, Serialize};

/// Viewport size in tiles.
///
/// `width` is the x-extent (columns) and `height` the y-extent (rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportExtent {
    pub width: u32,
    pub height: u32,
}

impl ViewportExtent {
    pub const DEFAULT_WIDTH: u32 = 7;
    pub const DEFAULT_HEIGHT: u32 = 9;

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of tiles the viewport requests, duplicates included.
    pub fn tile_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for ViewportExtent {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

/// Enumerate the tiles of a viewport centered on `(center_x, center_y)`.
///
/// Rows are the outer loop and columns the inner loop, so the output is in
/// row-major order. The window starts `extent / 2` tiles before the center on
/// each axis; for even extents that leaves one more tile on the low side than
/// on the high side. Each axis is clamped to `[0, 2^zoom - 1]` on its own.
/// The result always holds exactly `width * height` entries.
pub fn surrounding_tiles(
    center_x: u32,
    center_y: u32,
    zoom: u32,
    extent: ViewportExtent,
) -> Vec<TileCoord> {
    let start_x = center_x as i64 - (extent.width / 2) as i64;
    let start_y = center_y as i64 - (extent.height / 2) as i64;

    let mut tiles = Vec::with_capacity(extent.tile_count());
    for row in 0..extent.height as i64 {
        for col in 0..extent.width as i64 {
            tiles.push(TileCoord::clamped(zoom, start_x + col, start_y + row));
        }
    }
    tiles
}

impl TileCoord {
    /// Tiles of the viewport centered on this tile.
    pub fn surrounding(&self, extent: ViewportExtent) -> Vec<TileCoord> {
        surrounding_tiles(self.x, self.y, self.z, extent)
    }
}
