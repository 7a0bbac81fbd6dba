//! Vector tile cache with bulk cache warming.
//!
//! Tiles are served through a read-through cache ([`cache`]) in front of a
//! generator ([`tile`]): an upstream tile server or PostGIS queries built
//! from SQL templates ([`sql`]). Bulk runs ([`bulk`]) enumerate every tile
//! of a bounding box across a zoom range ([`coord`]), request each one
//! through the same cache path, and publish throttled progress to
//! subscribers over WebSocket ([`http`]).

pub mod app;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod coord;
pub mod http;
pub mod logging;
pub mod sql;
pub mod tile;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
