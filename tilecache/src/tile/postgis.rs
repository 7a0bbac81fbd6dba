//! PostGIS tile generator.
//!
//! Each configured map owns a SQL template that must return the encoded tile
//! as a single `bytea` value (typically `ST_AsMVT(...)`). Per request the
//! template is rewritten with the templating engine: the tile address is bound
//! to `!ZOOM!`, `!X!` and `!Y!`, the request's `task_id` to `!TASKID!`, and
//! the map's declared parameters to their tokens.
//!
//! ```text
//! [map.parcels]
//! sql = SELECT ST_AsMVT(t, 'parcels') FROM (
//!         SELECT !COLUMNS!, ST_AsMVTGeom(geom, ST_TileEnvelope(!ZOOM!, !X!, !Y!)) AS geom
//!         FROM !TASKID! WHERE !CLASS!) t
//! ```

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::debug;

use crate::cache::BoxFuture;
use crate::sql::{
    PostgresColumnIntrospector, QueryParameter, QueryParams, SqlValue, X_TOKEN, Y_TOKEN,
    ZOOM_TOKEN,
};
use crate::tile::{TileError, TileGenerator, TileRequest, TileResponse, MVT_CONTENT_TYPE};

/// Default name of the geometry column excluded from `!COLUMNS!`.
pub const DEFAULT_GEOMETRY_FIELD: &str = "geom";

/// A map served from PostGIS.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDefinition {
    pub name: String,
    /// Tile query template.
    pub sql: String,
    /// Request parameters the template understands.
    pub parameters: Vec<QueryParameter>,
}

/// Generator that renders tiles with a per-map SQL template.
pub struct PostgisTileGenerator {
    pool: PgPool,
    introspector: PostgresColumnIntrospector,
    maps: HashMap<String, MapDefinition>,
    geometry_field: String,
}

impl PostgisTileGenerator {
    pub fn new(pool: PgPool, maps: Vec<MapDefinition>) -> Self {
        Self {
            introspector: PostgresColumnIntrospector::new(pool.clone()),
            pool,
            maps: maps.into_iter().map(|m| (m.name.clone(), m)).collect(),
            geometry_field: DEFAULT_GEOMETRY_FIELD.to_string(),
        }
    }

    pub fn with_geometry_field(mut self, field: impl Into<String>) -> Self {
        self.geometry_field = field.into();
        self
    }

    /// Names of the configured maps.
    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    /// Bind every parameter for `request` against `map`.
    fn bind_params(
        &self,
        map: &MapDefinition,
        request: &TileRequest,
        zoom: u32,
        x: i64,
        y: i64,
    ) -> Result<QueryParams, TileError> {
        let task_id = request.query_value("task_id");
        let mut params =
            QueryParams::from_request(&map.parameters, &request.query_pairs(), task_id.as_deref())?;
        params.set_int(ZOOM_TOKEN, i64::from(zoom));
        params.set_int(X_TOKEN, x);
        params.set_int(Y_TOKEN, y);
        Ok(params)
    }
}

impl TileGenerator for PostgisTileGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a TileRequest,
    ) -> BoxFuture<'a, Result<TileResponse, TileError>> {
        Box::pin(async move {
            let key = request.tile_key()?;
            let map = self
                .maps
                .get(&key.map_name)
                .ok_or_else(|| TileError::UnknownMap(key.map_name.clone()))?;

            let params = self.bind_params(map, request, key.zoom, key.x, key.y)?;

            let mut args = Vec::new();
            let sql = params
                .replace_params_with_columns(&map.sql, &self.introspector, &self.geometry_field, &mut args)
                .await?;

            debug!(map = %map.name, tile = %key, args = args.len(), "Running tile query");

            let mut query = sqlx::query_scalar::<sqlx::Postgres, Option<Vec<u8>>>(&sql);
            for arg in args {
                query = match arg {
                    SqlValue::Null => query.bind(None::<String>),
                    SqlValue::Bool(v) => query.bind(v),
                    SqlValue::Int(v) => query.bind(v),
                    SqlValue::Float(v) => query.bind(v),
                    SqlValue::Text(v) => query.bind(v),
                };
            }

            let tile = query
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TileError::Database(e.to_string()))?
                .flatten()
                .unwrap_or_default();

            Ok(TileResponse::ok(tile, MVT_CONTENT_TYPE))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{ParamKind, TASK_ID_TOKEN};
    use sqlx::postgres::PgPoolOptions;

    fn generator() -> PostgisTileGenerator {
        // Lazy pool: nothing connects unless a query actually runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://tilecache@127.0.0.1:1/tiles")
            .unwrap();
        let map = MapDefinition {
            name: "parcels".to_string(),
            sql: "SELECT ST_AsMVT(t) FROM !TASKID! t WHERE !CLASS!".to_string(),
            parameters: vec![
                QueryParameter::new("class", "!CLASS!", "class = ?", ParamKind::String).unwrap(),
            ],
        };
        PostgisTileGenerator::new(pool, vec![map])
    }

    #[tokio::test]
    async fn test_unknown_map() {
        let generator = generator();
        let request = TileRequest::for_tile("roads", 3, 4, 2, "pbf");

        let result = generator.generate(&request).await;
        assert!(matches!(result, Err(TileError::UnknownMap(name)) if name == "roads"));
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let generator = generator();
        let result = generator.generate(&TileRequest::new("/parcels/3")).await;
        assert!(matches!(result, Err(TileError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_bind_params_includes_tile_address_and_task() {
        let generator = generator();
        let map = generator.maps.get("parcels").unwrap();
        let request =
            TileRequest::for_tile("parcels", 3, 4, 2, "pbf").with_query("task_id=t_1&class=road");

        let params = generator.bind_params(map, &request, 3, 4, 2).unwrap();

        assert_eq!(params.get(ZOOM_TOKEN).unwrap().value, SqlValue::Int(3));
        assert_eq!(params.get(X_TOKEN).unwrap().value, SqlValue::Int(4));
        assert_eq!(params.get(Y_TOKEN).unwrap().value, SqlValue::Int(2));
        assert_eq!(params.get(TASK_ID_TOKEN).unwrap().raw_value, "t_1");
        assert_eq!(
            params.get("!CLASS!").unwrap().value,
            SqlValue::Text("road".to_string())
        );
    }

    #[tokio::test]
    async fn test_map_names() {
        let generator = generator();
        assert_eq!(generator.map_names().collect::<Vec<_>>(), vec!["parcels"]);
    }
}
