//! Common tile types and math shared by the tile benchmark crates.

pub mod error;
pub mod tile;
pub mod viewport;

pub use error::{TileError, TileResult};
pub use tile::{latlon_to_tile, max_tile_for_zoom, LngLatBounds, TileCoord, WebMercatorQuad};
pub use viewport::{surrounding_tiles, ViewportExtent};
