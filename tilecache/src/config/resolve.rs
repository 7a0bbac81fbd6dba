//! `ConfigFile` → runtime configuration types.
//!
//! The file-level structs stay plain data; these conversions are the only
//! place they meet the types the cache, generators and bulk runner take.

use std::collections::HashMap;
use std::time::Duration;

use super::file::ConfigFileError;
use super::parser::invalid;
use super::settings::{CacheBackendKind, ConfigFile, ParamSettings};
use crate::bulk::{BroadcastThrottle, BulkConfig};
use crate::cache::{CacheBackendConfig, MemoryCacheConfig, RedisCacheConfig};
use crate::sql::QueryParameter;
use crate::tile::MapDefinition;

impl ConfigFile {
    /// The cache backend selected by `[cache]`.
    pub fn cache_backend(&self) -> CacheBackendConfig {
        let cache = &self.cache;
        match cache.backend {
            CacheBackendKind::None => CacheBackendConfig::None,
            CacheBackendKind::Memory => CacheBackendConfig::Memory(
                MemoryCacheConfig::default()
                    .with_max_size_bytes(cache.memory_size)
                    .with_max_zoom(cache.max_zoom)
                    .with_ttl_secs(cache.ttl),
            ),
            CacheBackendKind::Redis => {
                let mut redis = RedisCacheConfig::default()
                    .with_network(cache.redis_network)
                    .with_address(cache.redis_address.clone())
                    .with_db(cache.redis_db)
                    .with_ssl(cache.redis_ssl)
                    .with_max_zoom(cache.max_zoom)
                    .with_ttl_secs(cache.ttl)
                    .with_dial_timeout(Duration::from_millis(cache.redis_dial_timeout_ms));
                if let Some(password) = &cache.redis_password {
                    redis = redis.with_password(password.clone());
                }
                if let Some(uri) = &cache.redis_uri {
                    redis = redis.with_uri(uri.clone());
                }
                CacheBackendConfig::Redis(redis)
            }
        }
    }

    /// Bulk runner settings from `[bulk]`.
    pub fn bulk_config(&self) -> BulkConfig {
        let bulk = &self.bulk;
        BulkConfig::default()
            .with_max_concurrent(bulk.max_concurrent)
            .with_tile_timeout(Duration::from_secs(bulk.tile_timeout))
            .with_throttle(BroadcastThrottle {
                tile_step: bulk.broadcast_tile_step,
                percent_step: bulk.broadcast_percent_step,
            })
            .with_queue_capacity(bulk.queue_capacity)
            .with_initial_broadcast_delay(Duration::from_millis(bulk.initial_broadcast_delay_ms))
            .with_map_name(bulk.map.clone())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.server.upstream_timeout)
    }

    /// PostGIS maps with their parameters resolved.
    ///
    /// # Errors
    ///
    /// `InvalidValue` when a map names an undefined parameter or a
    /// parameter definition is malformed.
    pub fn map_definitions(&self) -> Result<Vec<MapDefinition>, ConfigFileError> {
        let mut params: HashMap<&str, QueryParameter> = HashMap::new();
        for param in &self.params {
            params.insert(param.name.as_str(), query_parameter(param)?);
        }

        self.maps
            .iter()
            .map(|map| {
                let section = format!("map.{}", map.name);
                let parameters = map
                    .params
                    .iter()
                    .map(|name| {
                        params.get(name.as_str()).cloned().ok_or_else(|| {
                            invalid(&section, "params", name, "no [param] section with this name")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(MapDefinition {
                    name: map.name.clone(),
                    sql: map.sql.clone(),
                    parameters,
                })
            })
            .collect()
    }
}

fn query_parameter(param: &ParamSettings) -> Result<QueryParameter, ConfigFileError> {
    let section = format!("param.{}", param.name);
    let parameter = QueryParameter::new(
        param.name.clone(),
        param.token.clone(),
        param.sql.clone(),
        param.kind,
    )
    .map_err(|e| invalid(&section, "token", &param.token, &e.to_string()))?;

    match &param.default {
        Some(default) => {
            param
                .kind
                .parse(default)
                .map_err(|reason| invalid(&section, "default", default, &reason))?;
            Ok(parameter.with_default(default.clone()))
        }
        None => Ok(parameter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RedisNetwork;
    use crate::config::settings::{MapSettings, ParamSettings};
    use crate::sql::ParamKind;

    fn param(name: &str, token: &str, sql: &str) -> ParamSettings {
        ParamSettings {
            name: name.to_string(),
            token: token.to_string(),
            sql: sql.to_string(),
            kind: ParamKind::Int,
            default: None,
        }
    }

    #[test]
    fn test_memory_backend() {
        let mut config = ConfigFile::default();
        config.cache.memory_size = 1024;
        config.cache.max_zoom = 14;
        config.cache.ttl = 60;

        match config.cache_backend() {
            CacheBackendConfig::Memory(memory) => {
                assert_eq!(memory.max_size_bytes, 1024);
                assert_eq!(memory.max_zoom, 14);
                assert_eq!(memory.ttl_secs, 60);
            }
            other => panic!("expected memory backend, got {:?}", other),
        }
    }

    #[test]
    fn test_redis_backend() {
        let mut config = ConfigFile::default();
        config.cache.backend = CacheBackendKind::Redis;
        config.cache.redis_network = RedisNetwork::Unix;
        config.cache.redis_address = "/tmp/redis.sock".to_string();
        config.cache.redis_password = Some("pw".to_string());
        config.cache.redis_dial_timeout_ms = 250;

        match config.cache_backend() {
            CacheBackendConfig::Redis(redis) => {
                assert_eq!(redis.network, RedisNetwork::Unix);
                assert_eq!(redis.address, "/tmp/redis.sock");
                assert_eq!(redis.password.as_deref(), Some("pw"));
                assert_eq!(redis.dial_timeout, Duration::from_millis(250));
                assert!(redis.uri.is_none());
            }
            other => panic!("expected redis backend, got {:?}", other),
        }
    }

    #[test]
    fn test_no_backend() {
        let mut config = ConfigFile::default();
        config.cache.backend = CacheBackendKind::None;
        assert_eq!(config.cache_backend(), CacheBackendConfig::None);
    }

    #[test]
    fn test_bulk_config() {
        let mut config = ConfigFile::default();
        config.bulk.max_concurrent = 3;
        config.bulk.tile_timeout = 7;
        config.bulk.broadcast_tile_step = 50;
        config.bulk.initial_broadcast_delay_ms = 0;
        config.bulk.map = "parcels".to_string();

        let bulk = config.bulk_config();
        assert_eq!(bulk.max_concurrent, 3);
        assert_eq!(bulk.tile_timeout, Duration::from_secs(7));
        assert_eq!(bulk.throttle.tile_step, 50);
        assert_eq!(bulk.initial_broadcast_delay, Duration::ZERO);
        assert_eq!(bulk.map_name, "parcels");
    }

    #[test]
    fn test_map_definitions() {
        let mut config = ConfigFile::default();
        let mut minz = param("minz", "!MINZ!", "min_zoom >= ?");
        minz.default = Some("4".to_string());
        config.params.push(minz);
        config.maps.push(MapSettings {
            name: "parcels".to_string(),
            sql: "SELECT 1 WHERE !MINZ!".to_string(),
            params: vec!["minz".to_string()],
        });

        let maps = config.map_definitions().unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].name, "parcels");
        assert_eq!(maps[0].parameters.len(), 1);
        assert_eq!(maps[0].parameters[0].token, "!MINZ!");
        assert_eq!(maps[0].parameters[0].default.as_deref(), Some("4"));
    }

    #[test]
    fn test_map_with_undefined_param() {
        let mut config = ConfigFile::default();
        config.maps.push(MapSettings {
            name: "parcels".to_string(),
            sql: "SELECT 1".to_string(),
            params: vec!["nope".to_string()],
        });

        match config.map_definitions() {
            Err(ConfigFileError::InvalidValue { section, value, .. }) => {
                assert_eq!(section, "map.parcels");
                assert_eq!(value, "nope");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_param_definition() {
        let mut config = ConfigFile::default();
        config.params.push(param("bad", "BAD", "x = ?"));
        assert!(config.map_definitions().is_err());

        let mut config = ConfigFile::default();
        config.params.push(param("reserved", "!TASKID!", "x = ?"));
        assert!(config.map_definitions().is_err());

        let mut config = ConfigFile::default();
        let mut typed = param("n", "!N!", "n = ?");
        typed.default = Some("four".to_string());
        config.params.push(typed);
        assert!(config.map_definitions().is_err());
    }
}
