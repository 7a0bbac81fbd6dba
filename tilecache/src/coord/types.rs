//! Coordinate types for tile enumeration.

use std::fmt;

/// Highest zoom level the tile grid is defined for.
pub const MAX_ZOOM: u32 = 22;

/// Northern limit of the Web Mercator projection, in degrees.
pub const MAX_LAT: f64 = 85.05112878;

/// Southern limit of the Web Mercator projection, in degrees.
pub const MIN_LAT: f64 = -85.05112878;

/// A geographic bounding box in degrees.
///
/// Stored as `[min_lng, min_lat, max_lng, max_lat]`, the same order bulk
/// run requests use on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Western edge (longitude)
    pub min_lng: f64,
    /// Southern edge (latitude)
    pub min_lat: f64,
    /// Eastern edge (longitude)
    pub max_lng: f64,
    /// Northern edge (latitude)
    pub max_lat: f64,
}

impl Bounds {
    /// Create a bounding box from its four edges.
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Build a bounding box from a `[min_lng, min_lat, max_lng, max_lat]` slice.
    ///
    /// Returns `None` unless the slice holds exactly four values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [min_lng, min_lat, max_lng, max_lat] => {
                Some(Self::new(*min_lng, *min_lat, *max_lng, *max_lat))
            }
            _ => None,
        }
    }

    /// Return a copy with each axis sorted so that min <= max.
    pub fn normalized(&self) -> Self {
        Self {
            min_lng: self.min_lng.min(self.max_lng),
            min_lat: self.min_lat.min(self.max_lat),
            max_lng: self.min_lng.max(self.max_lng),
            max_lat: self.min_lat.max(self.max_lat),
        }
    }

    /// The edges as an array, in wire order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}

/// A single tile address in the Web Mercator grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u32,
    /// Column, increasing eastward
    pub x: i64,
    /// Row, increasing southward
    pub y: i64,
}

impl TileCoord {
    pub fn new(zoom: u32, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive range of tiles covering a bounding box at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u32,
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl TileRange {
    /// Number of tiles in the range.
    ///
    /// A collapsed range (max below min on either axis) holds zero tiles.
    pub fn tile_count(&self) -> u64 {
        let columns = span(self.x_min, self.x_max);
        let rows = span(self.y_min, self.y_max);
        columns.saturating_mul(rows)
    }

    /// Whether the range holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.tile_count() == 0
    }

    /// Iterate the tiles column by column (x outer, y inner).
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            x: self.x_min,
            y: self.y_min,
        }
    }
}

/// Inclusive length of `min..=max`, zero when collapsed.
fn span(min: i64, max: i64) -> u64 {
    if max < min {
        0
    } else {
        max.abs_diff(min).saturating_add(1)
    }
}

impl IntoIterator for TileRange {
    type Item = TileCoord;
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over every tile of a [`TileRange`], column by column.
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    x: i64,
    y: i64,
}

impl Iterator for TileRangeIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.y_max < self.range.y_min || self.x > self.range.x_max {
            return None;
        }

        let coord = TileCoord::new(self.range.zoom, self.x, self.y);

        self.y += 1;
        if self.y > self.range.y_max {
            self.y = self.range.y_min;
            self.x += 1;
        }

        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.range.y_max < self.range.y_min || self.x > self.range.x_max {
            return (0, Some(0));
        }
        let rows = span(self.range.y_min, self.range.y_max);
        let full_columns = self.range.x_max.abs_diff(self.x);
        let current = span(self.y, self.range.y_max);
        let remaining = full_columns.saturating_mul(rows).saturating_add(current);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileRangeIter {}
