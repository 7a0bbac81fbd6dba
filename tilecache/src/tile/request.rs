//! Tile request types.
//!
//! A `TileRequest` mirrors an inbound tile fetch: the path below the maps
//! mount (`/{map}/{z}/{x}/{y}.{ext}`) plus the raw query string. Keeping the
//! raw query matters because cache fingerprints are computed over its exact
//! bytes.
//!
//! # Example
//!
//! ```
//! use tilecache::tile::TileRequest;
//!
//! let request = TileRequest::for_tile("osm", 3, 4, 2, "pbf").with_query("task_id=abc");
//! assert_eq!(request.path(), "/osm/3/4/2.pbf");
//! assert_eq!(request.query_value("task_id").as_deref(), Some("abc"));
//! ```

use crate::cache::{KeyError, TileKey};

/// Request for one encoded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Path below the maps mount, always with a leading slash.
    path: String,
    /// Raw query string without the leading `?`; `None` when empty.
    query: Option<String>,
}

impl TileRequest {
    /// Create a request from a raw tile path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self { path, query: None }
    }

    /// Create a request for a tile address.
    pub fn for_tile(map_name: &str, zoom: u32, x: i64, y: i64, extension: &str) -> Self {
        Self::new(format!("/{}/{}/{}/{}.{}", map_name, zoom, x, y, extension))
    }

    /// Attach a raw query string. An empty string clears the query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        let query = query.strip_prefix('?').unwrap_or(&query).to_string();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, if the request carried a non-empty one.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query pairs in request order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First decoded value for a query parameter.
    pub fn query_value(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Parse the unscoped cache key for this request's path.
    pub fn tile_key(&self) -> Result<TileKey, KeyError> {
        TileKey::parse_path(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_adds_leading_slash() {
        assert_eq!(TileRequest::new("osm/1/0/0.pbf").path(), "/osm/1/0/0.pbf");
        assert_eq!(TileRequest::new("/osm/1/0/0.pbf").path(), "/osm/1/0/0.pbf");
    }

    #[test]
    fn test_empty_query_is_none() {
        let request = TileRequest::new("/osm/1/0/0").with_query("");
        assert!(request.query().is_none());
        assert!(request.query_pairs().is_empty());

        let request = TileRequest::new("/osm/1/0/0").with_query("?");
        assert!(request.query().is_none());
    }

    #[test]
    fn test_query_pairs_are_decoded() {
        let request = TileRequest::new("/osm/1/0/0").with_query("task_id=a%20b&isSlice=true");
        assert_eq!(
            request.query_pairs(),
            vec![
                ("task_id".to_string(), "a b".to_string()),
                ("isSlice".to_string(), "true".to_string())
            ]
        );
        assert_eq!(request.query_value("isSlice").as_deref(), Some("true"));
        assert!(request.query_value("missing").is_none());
    }

    #[test]
    fn test_raw_query_kept_verbatim() {
        let request = TileRequest::new("/osm/1/0/0").with_query("?task_id=a%20b");
        assert_eq!(request.query(), Some("task_id=a%20b"));
    }

    #[test]
    fn test_tile_key_parsing() {
        let request = TileRequest::for_tile("osm", 3, 4, 2, "pbf");
        assert_eq!(request.tile_key().unwrap(), TileKey::new("osm", 3, 4, 2));

        assert!(TileRequest::new("/favicon.ico").tile_key().is_err());
    }
}
