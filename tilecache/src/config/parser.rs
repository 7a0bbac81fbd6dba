//! INI → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields. Starts
//! from `ConfigFile::default()` and overlays what the file sets; unknown
//! keys are ignored.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, MapSettings, ParamSettings};
use super::size::parse_size;
use crate::coord::MAX_ZOOM;
use crate::sql::ParamKind;

const MAP_SECTION_PREFIX: &str = "map.";
const PARAM_SECTION_PREFIX: &str = "param.";

/// Parse an `Ini` object into a `ConfigFile`.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server]
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = non_empty(section.get("bind")) {
            config.server.bind = v;
        }
        if let Some(v) = section.get("generator") {
            config.server.generator = parse_with("server", "generator", v)?;
        }
        if let Some(v) = section.get("upstream_url") {
            config.server.upstream_url = non_empty(Some(v));
        }
        if let Some(v) = section.get("upstream_timeout") {
            config.server.upstream_timeout =
                parse_positive("server", "upstream_timeout", v, "must be a positive integer (seconds)")?;
        }
    }

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("backend") {
            config.cache.backend = parse_with("cache", "backend", v)?;
        }
        if let Some(v) = section.get("max_zoom") {
            let zoom: u32 =
                parse_number("cache", "max_zoom", v, "must be a zoom level between 0 and 22")?;
            if zoom > MAX_ZOOM {
                return Err(invalid("cache", "max_zoom", v, "must be a zoom level between 0 and 22"));
            }
            config.cache.max_zoom = zoom;
        }
        if let Some(v) = section.get("ttl") {
            config.cache.ttl =
                parse_number("cache", "ttl", v, "must be a non-negative integer (seconds)")?;
        }
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size = parse_size(v)
                .map_err(|e| invalid("cache", "memory_size", v, &e.to_string()))?;
        }
        if let Some(v) = section.get("redis_network") {
            config.cache.redis_network = v
                .parse()
                .map_err(|e: crate::cache::CacheError| {
                    invalid("cache", "redis_network", v, &e.to_string())
                })?;
        }
        if let Some(v) = non_empty(section.get("redis_address")) {
            config.cache.redis_address = v;
        }
        if let Some(v) = section.get("redis_password") {
            config.cache.redis_password = non_empty(Some(v));
        }
        if let Some(v) = section.get("redis_db") {
            config.cache.redis_db =
                parse_number("cache", "redis_db", v, "must be a non-negative integer")?;
            if config.cache.redis_db < 0 {
                return Err(invalid("cache", "redis_db", v, "must be a non-negative integer"));
            }
        }
        if let Some(v) = section.get("redis_ssl") {
            config.cache.redis_ssl = parse_bool(v);
        }
        if let Some(v) = section.get("redis_uri") {
            config.cache.redis_uri = non_empty(Some(v));
        }
        if let Some(v) = section.get("redis_dial_timeout_ms") {
            config.cache.redis_dial_timeout_ms = parse_positive(
                "cache",
                "redis_dial_timeout_ms",
                v,
                "must be a positive integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("cacheable_params") {
            config.cache.cacheable_params = split_list(v);
        }
    }

    // [bulk]
    if let Some(section) = ini.section(Some("bulk")) {
        if let Some(v) = section.get("max_concurrent") {
            config.bulk.max_concurrent =
                parse_positive("bulk", "max_concurrent", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("tile_timeout") {
            config.bulk.tile_timeout =
                parse_positive("bulk", "tile_timeout", v, "must be a positive integer (seconds)")?;
        }
        if let Some(v) = section.get("broadcast_tile_step") {
            config.bulk.broadcast_tile_step =
                parse_positive("bulk", "broadcast_tile_step", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("broadcast_percent_step") {
            let step: f64 =
                parse_number("bulk", "broadcast_percent_step", v, "must be a number above 0")?;
            if !(step > 0.0 && step <= 100.0) {
                return Err(invalid(
                    "bulk",
                    "broadcast_percent_step",
                    v,
                    "must be above 0 and at most 100",
                ));
            }
            config.bulk.broadcast_percent_step = step;
        }
        if let Some(v) = section.get("queue_capacity") {
            config.bulk.queue_capacity =
                parse_positive("bulk", "queue_capacity", v, "must be a positive integer")?;
        }
        if let Some(v) = section.get("initial_broadcast_delay_ms") {
            config.bulk.initial_broadcast_delay_ms = parse_number(
                "bulk",
                "initial_broadcast_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = non_empty(section.get("map")) {
            config.bulk.map = v;
        }
        if let Some(v) = section.get("fetch_mode") {
            config.bulk.fetch_mode = parse_with("bulk", "fetch_mode", v)?;
        }
        if let Some(v) = non_empty(section.get("base_url")) {
            url::Url::parse(&v)
                .map_err(|e| invalid("bulk", "base_url", &v, &format!("not a valid URL: {}", e)))?;
            config.bulk.base_url = v;
        }
    }

    // [postgis]
    if let Some(section) = ini.section(Some("postgis")) {
        if let Some(v) = section.get("url") {
            config.postgis.url = non_empty(Some(v));
        }
        if let Some(v) = section.get("max_connections") {
            config.postgis.max_connections =
                parse_positive("postgis", "max_connections", v, "must be a positive integer")?;
        }
        if let Some(v) = non_empty(section.get("geometry_field")) {
            config.postgis.geometry_field = v;
        }
    }

    // [logging]
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section.get("level")) {
            config.logging.level = v;
        }
        if let Some(v) = section.get("file") {
            config.logging.file = non_empty(Some(v)).map(|p| expand_tilde(&p));
        }
    }

    // [map.<name>] and [param.<name>]
    for (name, section) in ini.iter() {
        let Some(name) = name else { continue };

        if let Some(map_name) = name.strip_prefix(MAP_SECTION_PREFIX) {
            config.maps.push(parse_map(name, map_name, section)?);
        } else if let Some(param_name) = name.strip_prefix(PARAM_SECTION_PREFIX) {
            config.params.push(parse_param(name, param_name, section)?);
        }
    }

    Ok(config)
}

fn parse_map(section_name: &str, name: &str, section: &Properties) -> Result<MapSettings, ConfigFileError> {
    if name.trim().is_empty() {
        return Err(invalid(section_name, "", "", "map section needs a name"));
    }

    let sql = non_empty(section.get("sql"))
        .ok_or_else(|| invalid(section_name, "sql", "", "every map needs a tile query"))?;

    Ok(MapSettings {
        name: name.trim().to_string(),
        sql,
        params: section.get("params").map(split_list).unwrap_or_default(),
    })
}

fn parse_param(
    section_name: &str,
    name: &str,
    section: &Properties,
) -> Result<ParamSettings, ConfigFileError> {
    if name.trim().is_empty() {
        return Err(invalid(section_name, "", "", "param section needs a name"));
    }

    let token = non_empty(section.get("token"))
        .ok_or_else(|| invalid(section_name, "token", "", "every parameter needs a token"))?;
    let sql = non_empty(section.get("sql"))
        .ok_or_else(|| invalid(section_name, "sql", "", "every parameter needs a SQL fragment"))?;
    let kind = match section.get("type") {
        Some(v) => v
            .parse::<ParamKind>()
            .map_err(|reason| invalid(section_name, "type", v, &reason))?,
        None => ParamKind::String,
    };

    Ok(ParamSettings {
        name: name.trim().to_string(),
        token,
        sql,
        kind,
        default: section.get("default").map(|v| v.to_string()),
    })
}

pub(super) fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_with<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|reason: String| invalid(section, key, value, &reason))
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T>(section: &str, key: &str, value: &str, reason: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + Default + PartialOrd,
{
    let parsed: T = parse_number(section, key, value, reason)?;
    if parsed <= T::default() {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

/// Accepts true/false, yes/no, 1/0, on/off (case-insensitive).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RedisNetwork;
    use crate::config::settings::{CacheBackendKind, FetchMode, GeneratorKind};
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        ConfigFile::load_from(&path)
    }

    fn assert_invalid(result: Result<ConfigFile, ConfigFileError>, expected_key: &str) {
        match result {
            Err(ConfigFileError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected InvalidValue for {}, got {:?}", expected_key, other),
        }
    }

    #[test]
    fn test_full_file() {
        let config = load(
            r#"
[server]
bind = 127.0.0.1:8080
generator = postgis

[cache]
backend = redis
max_zoom = 16
ttl = 3600
redis_network = unix
redis_address = /run/redis.sock
redis_password = hunter2
redis_db = 2
redis_ssl = yes
cacheable_params = task_id, style

[bulk]
max_concurrent = 4
tile_timeout = 5
broadcast_tile_step = 20
broadcast_percent_step = 2.5
fetch_mode = http
base_url = http://tiles.internal:19089

[postgis]
url = postgres://tiles@db/tiles
max_connections = 4
geometry_field = the_geom

[logging]
level = debug
file = /var/log/tilecache.log
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.generator, GeneratorKind::Postgis);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.max_zoom, 16);
        assert_eq!(config.cache.ttl, 3600);
        assert_eq!(config.cache.redis_network, RedisNetwork::Unix);
        assert_eq!(config.cache.redis_address, "/run/redis.sock");
        assert_eq!(config.cache.redis_password.as_deref(), Some("hunter2"));
        assert_eq!(config.cache.redis_db, 2);
        assert!(config.cache.redis_ssl);
        assert_eq!(config.cache.cacheable_params, vec!["task_id", "style"]);
        assert_eq!(config.bulk.max_concurrent, 4);
        assert_eq!(config.bulk.tile_timeout, 5);
        assert_eq!(config.bulk.broadcast_tile_step, 20);
        assert_eq!(config.bulk.broadcast_percent_step, 2.5);
        assert_eq!(config.bulk.fetch_mode, FetchMode::Http);
        assert_eq!(config.bulk.base_url, "http://tiles.internal:19089");
        assert_eq!(config.postgis.url.as_deref(), Some("postgres://tiles@db/tiles"));
        assert_eq!(config.postgis.max_connections, 4);
        assert_eq!(config.postgis.geometry_field, "the_geom");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/tilecache.log"))
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = load("[cache]\nttl = 60\n").unwrap();
        let defaults = ConfigFile::default();

        assert_eq!(config.cache.ttl, 60);
        assert_eq!(config.cache.backend, defaults.cache.backend);
        assert_eq!(config.bulk, defaults.bulk);
        assert_eq!(config.server, defaults.server);
    }

    #[test]
    fn test_memory_size_suffix() {
        let config = load("[cache]\nmemory_size = 64MB\n").unwrap();
        assert_eq!(config.cache.memory_size, 64 * 1024 * 1024);
    }

    #[test]
    fn test_maps_and_params() {
        let config = load(
            r#"
[map.parcels]
sql = SELECT ST_AsMVT(t) FROM (SELECT !COLUMNS! FROM !TASKID! WHERE !CLASS!) t
params = class

[param.class]
token = !CLASS!
sql = class = ?
type = string
default = road
"#,
        )
        .unwrap();

        assert_eq!(config.maps.len(), 1);
        assert_eq!(config.maps[0].name, "parcels");
        assert_eq!(config.maps[0].params, vec!["class"]);
        assert_eq!(config.params.len(), 1);
        assert_eq!(config.params[0].token, "!CLASS!");
        assert_eq!(config.params[0].kind, ParamKind::String);
        assert_eq!(config.params[0].default.as_deref(), Some("road"));
    }

    #[test]
    fn test_invalid_values() {
        assert_invalid(load("[server]\ngenerator = mapnik\n"), "generator");
        assert_invalid(load("[cache]\nbackend = disk\n"), "backend");
        assert_invalid(load("[cache]\nmax_zoom = 23\n"), "max_zoom");
        assert_invalid(load("[cache]\nmemory_size = lots\n"), "memory_size");
        assert_invalid(load("[cache]\nredis_network = udp\n"), "redis_network");
        assert_invalid(load("[cache]\nredis_db = -1\n"), "redis_db");
        assert_invalid(load("[bulk]\nmax_concurrent = 0\n"), "max_concurrent");
        assert_invalid(load("[bulk]\nbroadcast_percent_step = 0\n"), "broadcast_percent_step");
        assert_invalid(load("[bulk]\nbase_url = not a url\n"), "base_url");
        assert_invalid(load("[map.empty]\nparams = a\n"), "sql");
        assert_invalid(load("[param.x]\nsql = x = ?\n"), "token");
        assert_invalid(load("[param.x]\ntoken = !X!\nsql = x = ?\ntype = date\n"), "type");
    }

    #[test]
    fn test_parse_bool() {
        for v in ["true", "TRUE", "1", "yes", "on"] {
            assert!(parse_bool(v), "{}", v);
        }
        for v in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(v), "{}", v);
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
