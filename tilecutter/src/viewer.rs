//! Coordinate helpers for slippy-map viewers that display a generated pyramid.
//!
//! Game-world positions map linearly onto a `±90°` square of latitude and
//! longitude, and the tile grid wraps horizontally when the viewer repeats the
//! map. These functions compute which file a viewer should request for a
//! given tile coordinate.

use crate::plan::{tiles_per_side, OutputFormat, MAX_ZOOM};

/// Default world extent in game units.
pub const DEFAULT_WORLD_SIZE: f64 = 6000.0;

/// Latitude and longitude bound of the square a world maps onto.
pub const WORLD_BOUND: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Clamps into the `±90°` square so a viewer cannot pan off the map.
    pub fn clamped(&self) -> Self {
        Self {
            lat: self.lat.clamp(-WORLD_BOUND, WORLD_BOUND),
            lng: self.lng.clamp(-WORLD_BOUND, WORLD_BOUND),
        }
    }
}

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPos {
    pub x: f64,
    pub y: f64,
}

/// Linear mapping between world positions and lat/lng.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldProjection {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for WorldProjection {
    fn default() -> Self {
        Self {
            width: DEFAULT_WORLD_SIZE,
            height: DEFAULT_WORLD_SIZE,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl WorldProjection {
    pub fn new(width: f64, height: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            width,
            height,
            offset_x,
            offset_y,
        }
    }

    pub fn lat_lng_from_pos(&self, x: f64, y: f64) -> LatLng {
        LatLng::new(
            (y - self.offset_y) / self.height * 180.0,
            (x - self.offset_x) / self.width * 180.0,
        )
    }

    pub fn pos_from_lat_lng(&self, lat_lng: LatLng) -> WorldPos {
        WorldPos {
            x: lat_lng.lng * self.width / 180.0 + self.offset_x,
            y: lat_lng.lat * self.height / 180.0 + self.offset_y,
        }
    }
}

/// Linear lat/lng to pixel mapping at zoom 0 for square tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelProjection {
    origin: f64,
    pixels_per_degree: f64,
}

impl PixelProjection {
    pub fn new(tile_size: u32) -> Self {
        let range = tile_size as f64;
        Self {
            origin: range / 2.0,
            pixels_per_degree: range / 360.0 * 2.0,
        }
    }

    /// Pixel point of `lat_lng`; y grows southwards.
    pub fn to_point(&self, lat_lng: LatLng) -> (f64, f64) {
        (
            self.origin + lat_lng.lng * self.pixels_per_degree,
            self.origin - lat_lng.lat * self.pixels_per_degree,
        )
    }

    pub fn to_lat_lng(&self, x: f64, y: f64) -> LatLng {
        LatLng::new(
            (self.origin - y) / self.pixels_per_degree,
            (x - self.origin) / self.pixels_per_degree,
        )
    }
}

/// What a viewer should load for a grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileRequest {
    Tile { zoom: u8, x: u32, y: u32 },
    /// Outside the map; show an empty tile.
    Blank { zoom: u8 },
}

impl TileRequest {
    /// File name using the pyramid naming. Blank tiles use `-1.-1`.
    pub fn file_name(&self, base: &str, format: OutputFormat) -> String {
        match *self {
            TileRequest::Tile { zoom, x, y } => crate::plan::tile_file_name(base, zoom, x, y, format),
            TileRequest::Blank { zoom } => format!("{}.{}.-1.-1{}", base, zoom, format.extension()),
        }
    }
}

/// Maps a (possibly out-of-range) grid coordinate to a request.
///
/// Rows outside the grid are always blank. Columns outside it are blank
/// unless `repeating`, in which case they wrap around. Zoom levels past
/// [`MAX_ZOOM`] are never generated and resolve to blank.
pub fn resolve_tile(zoom: u8, x: i64, y: i64, repeating: bool) -> TileRequest {
    if zoom > MAX_ZOOM {
        return TileRequest::Blank { zoom };
    }
    let max = tiles_per_side(zoom) as i64;
    if y < 0 || y >= max || (!repeating && (x < 0 || x >= max)) {
        return TileRequest::Blank { zoom };
    }
    TileRequest::Tile {
        zoom,
        x: x.rem_euclid(max) as u32,
        y: y as u32,
    }
}
