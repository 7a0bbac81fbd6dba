//! Coordinate enumeration module
//!
//! Converts geographic bounding boxes into the Web Mercator tile ranges that
//! cover them, one range per zoom level.
//!
//! # Example
//!
//! ```
//! use tilecache::coord::{Bounds, TileRange};
//!
//! let bounds = Bounds::new(-0.1, -0.1, 0.1, 0.1);
//! let range = TileRange::covering(&bounds, 10);
//! assert_eq!(range.tile_count(), 4);
//! ```

mod types;

pub use types::{Bounds, TileCoord, TileRange, TileRangeIter, MAX_LAT, MAX_ZOOM, MIN_LAT};

use std::f64::consts::PI;

/// Converts a longitude/latitude pair to tile indices at the given zoom.
///
/// Uses `x = floor((lng + 180) / 360 * 2^z)` and
/// `y = floor((1 - ln(tan(lat) + sec(lat)) / PI) / 2 * 2^z)`.
///
/// Latitude is clamped to `MIN_LAT..=MAX_LAT` first and both indices are
/// clamped to `[0, 2^z)`, so the poles and the antimeridian land on edge
/// tiles of the grid.
#[inline]
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u32) -> (i64, i64) {
    let n = 2.0_f64.powi(zoom as i32);
    let last = (n as i64).saturating_sub(1);

    let x = ((lng + 180.0) / 360.0 * n).floor();

    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT) * PI / 180.0;
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    ((x as i64).clamp(0, last), (y as i64).clamp(0, last))
}

impl TileRange {
    /// Compute the inclusive tile range covering `bounds` at `zoom`.
    ///
    /// The north-west corner (min longitude, max latitude) yields the minimum
    /// x and y; the south-east corner yields the maximum. Edge ordering is the
    /// caller's responsibility: unsorted bounds produce an empty range rather
    /// than an error.
    pub fn covering(bounds: &Bounds, zoom: u32) -> Self {
        let (x_min, y_min) = lng_lat_to_tile(bounds.min_lng, bounds.max_lat, zoom);
        let (x_max, y_max) = lng_lat_to_tile(bounds.max_lng, bounds.min_lat, zoom);

        Self {
            zoom,
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

/// Build the ordered zoom sequence `min..=max`.
///
/// The bounds are swapped when `min > max`, so a reversed request still
/// enumerates every level once, lowest first.
pub fn zoom_levels(min: u32, max: u32) -> Vec<u32> {
    let (low, high) = if min > max { (max, min) } else { (min, max) };
    (low..=high).collect()
}

/// Total number of tiles covering `bounds` across every level in `zooms`.
pub fn total_tiles(bounds: &Bounds, zooms: &[u32]) -> u64 {
    zooms
        .iter()
        .map(|&zoom| TileRange::covering(bounds, zoom).tile_count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_tile_at_zoom_zero() {
        assert_eq!(lng_lat_to_tile(0.0, 0.0, 0), (0, 0));
        assert_eq!(lng_lat_to_tile(-179.9, 85.0, 0), (0, 0));
        assert_eq!(lng_lat_to_tile(179.9, -85.0, 0), (0, 0));
    }

    #[test]
    fn test_poles_and_antimeridian_land_on_edge_tiles() {
        assert_eq!(lng_lat_to_tile(0.0, -90.0, 0), (0, 0));
        assert_eq!(lng_lat_to_tile(0.0, 90.0, 0), (0, 0));
        assert_eq!(lng_lat_to_tile(180.0, 0.0, 0), (0, 0));
        assert_eq!(lng_lat_to_tile(180.0, -90.0, 2), (3, 3));
        assert_eq!(lng_lat_to_tile(-180.0, 90.0, 2), (0, 0));
        assert_eq!(lng_lat_to_tile(-200.0, 0.0, 3), (0, 4));
    }

    #[test]
    fn test_whole_world_covers_full_grid() {
        let world = Bounds::new(-180.0, -90.0, 180.0, 90.0);

        assert_eq!(TileRange::covering(&world, 0).tile_count(), 1);
        assert_eq!(TileRange::covering(&world, 2).tile_count(), 16);
        assert_eq!(total_tiles(&world, &[0, 1, 2]), 1 + 4 + 16);

        let tiles: Vec<_> = TileRange::covering(&world, 1).iter().collect();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| (0..2).contains(&t.x) && (0..2).contains(&t.y)));
    }

    #[test]
    fn test_mercator_limits_cover_full_grid() {
        let world = Bounds::new(-180.0, -85.0, 180.0, 85.0);
        let range = TileRange::covering(&world, 0);

        assert_eq!((range.x_min, range.x_max), (0, 0));
        assert_eq!(range.tile_count(), 1);
    }

    #[test]
    fn test_extreme_range_count_saturates() {
        let range = TileRange {
            zoom: 0,
            x_min: i64::MIN,
            x_max: i64::MAX,
            y_min: 0,
            y_max: i64::MAX,
        };

        assert_eq!(range.tile_count(), u64::MAX);
        assert_eq!(range.iter().size_hint().0, usize::MAX);
    }

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // 40.7128°N, 74.0060°W
        let (x, y) = lng_lat_to_tile(-74.0060, 40.7128, 16);
        assert_eq!(x, 19295);
        assert_eq!(y, 24640);
    }

    #[test]
    fn test_quadrants_at_zoom_one() {
        assert_eq!(lng_lat_to_tile(-90.0, 45.0, 1), (0, 0));
        assert_eq!(lng_lat_to_tile(90.0, 45.0, 1), (1, 0));
        assert_eq!(lng_lat_to_tile(-90.0, -45.0, 1), (0, 1));
        assert_eq!(lng_lat_to_tile(90.0, -45.0, 1), (1, 1));
    }

    #[test]
    fn test_box_straddling_corner_covers_two_by_two() {
        let bounds = Bounds::new(-0.1, -0.1, 0.1, 0.1);
        let range = TileRange::covering(&bounds, 10);

        assert_eq!((range.x_min, range.x_max), (511, 512));
        assert_eq!((range.y_min, range.y_max), (511, 512));
        assert_eq!(range.tile_count(), 4);
    }

    #[test]
    fn test_box_inside_one_tile_covers_one() {
        let bounds = Bounds::new(0.01, 0.01, 0.02, 0.02);
        let range = TileRange::covering(&bounds, 11);

        assert_eq!(range.tile_count(), 1);
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles, vec![TileCoord::new(11, 1024, 1023)]);
    }

    #[test]
    fn test_unsorted_bounds_yield_empty_range() {
        let bounds = Bounds::new(10.0, 0.0, -10.0, 5.0);
        let range = TileRange::covering(&bounds, 8);

        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn test_normalized_bounds_sort_each_axis() {
        let bounds = Bounds::new(10.0, 5.0, -10.0, 0.0).normalized();
        assert_eq!(bounds, Bounds::new(-10.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn test_bounds_from_slice_requires_four_values() {
        assert!(Bounds::from_slice(&[1.0, 2.0, 3.0]).is_none());
        assert!(Bounds::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_none());
        assert_eq!(
            Bounds::from_slice(&[1.0, 2.0, 3.0, 4.0]),
            Some(Bounds::new(1.0, 2.0, 3.0, 4.0))
        );
    }

    #[test]
    fn test_iteration_matches_count() {
        let range = TileRange {
            zoom: 5,
            x_min: 3,
            x_max: 5,
            y_min: 10,
            y_max: 11,
        };

        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles.len() as u64, range.tile_count());
        assert_eq!(tiles.first(), Some(&TileCoord::new(5, 3, 10)));
        assert_eq!(tiles.get(1), Some(&TileCoord::new(5, 3, 11)));
        assert_eq!(tiles.last(), Some(&TileCoord::new(5, 5, 11)));
        assert_eq!(range.iter().len(), 6);
    }

    #[test]
    fn test_zoom_levels_swaps_reversed_bounds() {
        assert_eq!(zoom_levels(3, 5), vec![3, 4, 5]);
        assert_eq!(zoom_levels(5, 3), vec![3, 4, 5]);
        assert_eq!(zoom_levels(7, 7), vec![7]);
    }

    #[test]
    fn test_total_tiles_sums_levels() {
        let bounds = Bounds::new(-0.1, -0.1, 0.1, 0.1);
        // 2x2 at every level because the box straddles the same corner
        assert_eq!(total_tiles(&bounds, &[10, 11]), 8);
        assert_eq!(total_tiles(&bounds, &[]), 0);
    }

    #[test]
    fn test_tile_coord_display() {
        assert_eq!(TileCoord::new(3, 4, 2).to_string(), "3/4/2");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_x_monotonic_in_longitude(
                a in -180.0..180.0_f64,
                b in -180.0..180.0_f64,
                lat in -85.0..85.0_f64,
                zoom in 0u32..=MAX_ZOOM
            ) {
                let (west, east) = if a <= b { (a, b) } else { (b, a) };
                let (x_west, _) = lng_lat_to_tile(west, lat, zoom);
                let (x_east, _) = lng_lat_to_tile(east, lat, zoom);
                prop_assert!(x_west <= x_east, "x decreased: {} -> {}", x_west, x_east);
            }

            #[test]
            fn test_y_antitone_in_latitude(
                a in -85.0..85.0_f64,
                b in -85.0..85.0_f64,
                lng in -180.0..180.0_f64,
                zoom in 0u32..=MAX_ZOOM
            ) {
                let (south, north) = if a <= b { (a, b) } else { (b, a) };
                let (_, y_south) = lng_lat_to_tile(lng, south, zoom);
                let (_, y_north) = lng_lat_to_tile(lng, north, zoom);
                prop_assert!(y_north <= y_south, "y increased northward: {} -> {}", y_south, y_north);
            }

            #[test]
            fn test_indices_within_grid(
                lng in -180.0..180.0_f64,
                lat in -85.0..85.0_f64,
                zoom in 0u32..=MAX_ZOOM
            ) {
                let (x, y) = lng_lat_to_tile(lng, lat, zoom);
                let n = 1i64 << zoom;
                prop_assert!((0..n).contains(&x));
                prop_assert!((0..n).contains(&y));
            }

            #[test]
            fn test_any_input_stays_on_grid(
                lng in -1000.0..1000.0_f64,
                lat in -1000.0..1000.0_f64,
                zoom in 0u32..=MAX_ZOOM
            ) {
                let (x, y) = lng_lat_to_tile(lng, lat, zoom);
                let n = 1i64 << zoom;
                prop_assert!((0..n).contains(&x));
                prop_assert!((0..n).contains(&y));
            }

            #[test]
            fn test_normalized_range_never_empty(
                a in -179.0..179.0_f64,
                b in -179.0..179.0_f64,
                c in -84.0..84.0_f64,
                d in -84.0..84.0_f64,
                zoom in 0u32..=16
            ) {
                let bounds = Bounds::new(a, c, b, d).normalized();
                let range = TileRange::covering(&bounds, zoom);
                prop_assert!(range.tile_count() >= 1);
                prop_assert_eq!(range.iter().count() as u64, range.tile_count());
            }
        }
    }
}
