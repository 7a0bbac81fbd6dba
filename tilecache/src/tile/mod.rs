//! Tile requests, responses and generators.
//!
//! A [`TileGenerator`] produces the encoded bytes for one tile request. The
//! cache middleware sits in front of a generator; the HTTP layer and the bulk
//! orchestrator both go through that pair.

mod generator;
mod postgis;
mod request;
mod types;
mod upstream;

pub use generator::TileGenerator;
pub use postgis::{MapDefinition, PostgisTileGenerator, DEFAULT_GEOMETRY_FIELD};
pub use request::TileRequest;
pub use types::{CacheStatus, TileBody, TileError, TileResponse, MVT_CONTENT_TYPE};
pub use upstream::{UpstreamTileGenerator, DEFAULT_UPSTREAM_TIMEOUT};
