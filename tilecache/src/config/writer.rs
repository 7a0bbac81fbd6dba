//! `ConfigFile` → commented INI text.

use std::fmt::Write as _;

use super::settings::ConfigFile;
use super::size::format_size;
use crate::sql::ParamKind;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let upstream_url = config.server.upstream_url.as_deref().unwrap_or("");
    let redis_password = config.cache.redis_password.as_deref().unwrap_or("");
    let redis_uri = config.cache.redis_uri.as_deref().unwrap_or("");
    let postgis_url = config.postgis.url.as_deref().unwrap_or("");
    let log_file = config
        .logging
        .file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut out = format!(
        r#"[server]
; Listen address
bind = {}
; Tile source behind the cache:
;   upstream - proxy another tile server (set upstream_url)
;   postgis  - render [map.*] templates from PostGIS (set [postgis] url)
generator = {}
upstream_url = {}
; Upstream request timeout in seconds
upstream_timeout = {}

[cache]
; Backend: none, memory or redis
backend = {}
; Tiles above this zoom level are never cached
max_zoom = {}
; Entry lifetime in seconds (0 = never expire)
ttl = {}
; Memory backend budget (e.g. 256MB, 2GB)
memory_size = {}
; Redis transport: tcp or unix
redis_network = {}
redis_address = {}
redis_password = {}
redis_db = {}
redis_ssl = {}
; Full connection URI, overrides the redis_* fields above when set
redis_uri = {}
redis_dial_timeout_ms = {}
; Query parameters that keep a request cacheable (comma-separated)
cacheable_params = {}

[bulk]
; Tiles fetched at once per run
max_concurrent = {}
; Per-tile deadline in seconds
tile_timeout = {}
; Publish progress every N tiles or every P percent
broadcast_tile_step = {}
broadcast_percent_step = {}
queue_capacity = {}
initial_broadcast_delay_ms = {}
; Map warmed by bulk runs
map = {}
; local = through this server's cache in-process, http = against base_url
fetch_mode = {}
base_url = {}

[postgis]
url = {}
max_connections = {}
; Column left out of !COLUMNS!
geometry_field = {}

[logging]
; Filter directive, overridden by RUST_LOG
level = {}
; Optional log file in addition to stdout
file = {}
"#,
        config.server.bind,
        config.server.generator,
        upstream_url,
        config.server.upstream_timeout,
        config.cache.backend,
        config.cache.max_zoom,
        config.cache.ttl,
        format_size(config.cache.memory_size),
        config.cache.redis_network,
        config.cache.redis_address,
        redis_password,
        config.cache.redis_db,
        config.cache.redis_ssl,
        redis_uri,
        config.cache.redis_dial_timeout_ms,
        config.cache.cacheable_params.join(", "),
        config.bulk.max_concurrent,
        config.bulk.tile_timeout,
        config.bulk.broadcast_tile_step,
        config.bulk.broadcast_percent_step,
        config.bulk.queue_capacity,
        config.bulk.initial_broadcast_delay_ms,
        config.bulk.map,
        config.bulk.fetch_mode,
        config.bulk.base_url,
        postgis_url,
        config.postgis.max_connections,
        config.postgis.geometry_field,
        config.logging.level,
        log_file,
    );

    for map in &config.maps {
        let _ = write!(
            out,
            "\n[map.{}]\nsql = {}\nparams = {}\n",
            map.name,
            map.sql,
            map.params.join(", ")
        );
    }

    for param in &config.params {
        let _ = write!(
            out,
            "\n[param.{}]\ntoken = {}\nsql = {}\ntype = {}\n",
            param.name,
            param.token,
            param.sql,
            kind_name(param.kind)
        );
        if let Some(default) = &param.default {
            let _ = writeln!(out, "default = {}", default);
        }
    }

    out
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Int => "int",
        ParamKind::Float => "float",
        ParamKind::Bool => "bool",
        ParamKind::String => "string",
    }
}
