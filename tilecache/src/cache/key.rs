//! Tile cache keys.
//!
//! A [`TileKey`] addresses one cached tile payload. Requests that carry a
//! query string (for example `task_id=...`) get a fingerprint of the raw
//! query appended to the map-name segment, so task-scoped tiles never share
//! an entry with the plain tile or with each other.
//!
//! The query is hashed byte-for-byte. `a=1&b=2` and `b=2&a=1` are different
//! keys.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of digest bytes kept in a query fingerprint (128 bits).
const FINGERPRINT_BYTES: usize = 16;

/// Errors raised while parsing a tile path into a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Path does not have the `map/z/x/y` shape.
    #[error("invalid tile path '{0}': expected /{{map}}/{{z}}/{{x}}/{{y}}")]
    InvalidPath(String),

    /// One of the numeric components failed to parse.
    #[error("invalid {component} '{value}' in tile path")]
    InvalidComponent {
        component: &'static str,
        value: String,
    },
}

/// Cache address of a single tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub map_name: String,
    pub zoom: u32,
    pub x: i64,
    pub y: i64,
    /// Hex digest of the request's raw query string, if it had one.
    pub query_fingerprint: Option<String>,
}

impl TileKey {
    pub fn new(map_name: impl Into<String>, zoom: u32, x: i64, y: i64) -> Self {
        Self {
            map_name: map_name.into(),
            zoom,
            x,
            y,
            query_fingerprint: None,
        }
    }

    /// Parse a key from a tile path such as `/osm/3/4/2.pbf`.
    ///
    /// A leading slash and a file extension on the last segment are optional.
    pub fn parse_path(path: &str) -> Result<Self, KeyError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let [map_name, zoom, x, y] = segments.as_slice() else {
            return Err(KeyError::InvalidPath(path.to_string()));
        };
        if map_name.is_empty() {
            return Err(KeyError::InvalidPath(path.to_string()));
        }

        let y = y.split_once('.').map_or(*y, |(stem, _ext)| stem);

        Ok(Self::new(
            *map_name,
            parse_component("zoom", zoom)?,
            parse_component("x", x)?,
            parse_component("y", y)?,
        ))
    }

    /// Attach the fingerprint of a raw query string.
    ///
    /// An empty query leaves the key unscoped.
    pub fn with_query(mut self, raw_query: &str) -> Self {
        self.query_fingerprint = if raw_query.is_empty() {
            None
        } else {
            Some(fingerprint(raw_query))
        };
        self
    }

    /// Map-name segment as stored, including the fingerprint suffix.
    pub fn scoped_map_name(&self) -> String {
        match &self.query_fingerprint {
            Some(fp) => format!("{}_{}", self.map_name, fp),
            None => self.map_name.clone(),
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query_fingerprint {
            Some(fp) => write!(
                f,
                "{}_{}/{}/{}/{}",
                self.map_name, fp, self.zoom, self.x, self.y
            ),
            None => write!(f, "{}/{}/{}/{}", self.map_name, self.zoom, self.x, self.y),
        }
    }
}

/// Deterministic 128-bit hex digest of a raw query string.
pub fn fingerprint(raw_query: &str) -> String {
    let digest = Sha256::digest(raw_query.as_bytes());
    digest[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn parse_component<T: std::str::FromStr>(
    component: &'static str,
    value: &str,
) -> Result<T, KeyError> {
    value.parse().map_err(|_| KeyError::InvalidComponent {
        component,
        value: value.to_string(),
    })
}
