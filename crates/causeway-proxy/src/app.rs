//! Process-wide `AppState` (SPEC_FULL.md §9 "Process-wide singletons"):
//! builds the routing table, cache engine, metrics registry, and composed
//! middleware pipeline once at startup and hands the result to every
//! connection task by `Arc` clone.

use std::sync::Arc;

use crate::backends::BackendDeps;
use crate::cache::CacheEngine;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::metrics::Metrics;
use crate::middleware::{
    bot_filter::BotFilterMiddleware, compression::CompressionMiddleware,
    content_length::ContentLengthMiddleware, file_cache::FileCacheMiddleware,
    ip_filter::IpFilterMiddleware, memory_cache::MemoryCacheMiddleware,
    resource_filter::ResourceFilterMiddleware, response_transform::ResponseTransformMiddleware,
    PassThrough,
};
use crate::pipeline::{build_pipeline, BoxHandler, Middleware};
use crate::routing::{RoutingTable, SharedRoutingTable};

pub struct AppState {
    pub config: Arc<Config>,
    pub routing: SharedRoutingTable,
    pub pipeline: BoxHandler,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Compiles the routing table, resolves the two-tier cache (if
    /// configured), and folds the ordered middleware list from SPEC_FULL.md
    /// §4.D around the routing/dispatch terminal handler.
    pub fn build(config: Config) -> Result<Self, anyhow::Error> {
        let config = Arc::new(config);
        let routing = Arc::new(RoutingTable::compile(&config)?);
        let backend_deps = Arc::new(BackendDeps::new(env!("CARGO_PKG_VERSION")));
        let metrics = Arc::new(Metrics::new());

        let performance = config.middlewares.as_ref().and_then(|m| m.performance.as_ref());
        let security = config.middlewares.as_ref().and_then(|m| m.security.as_ref());

        let compression = performance.and_then(|p| p.compression.as_ref());
        let compression_mw = CompressionMiddleware::new(
            compression.map(|c| c.enabled).unwrap_or(false),
            compression.map(|c| c.types.clone()).unwrap_or_default(),
            compression.map(|c| c.compress_level).unwrap_or(6),
            compression.map(|c| c.min_size).unwrap_or(0),
        );

        let response_transform_mw = ResponseTransformMiddleware::new(routing.clone());

        let resource_filter = performance.and_then(|p| p.resource_filter.as_ref());
        let resource_filter_mw = ResourceFilterMiddleware::new(
            resource_filter.map(|r| r.enabled).unwrap_or(false),
            resource_filter.map(|r| r.skip_paths.as_slice()).unwrap_or(&[]),
        )?;

        let ip_filter = security.and_then(|s| s.ip_filter.as_ref());
        let ip_filter_mw = IpFilterMiddleware::new(
            ip_filter.map(|f| f.enabled).unwrap_or(false),
            ip_filter.map(|f| f.blacklist.as_slice()).unwrap_or(&[]),
        )?;

        let bot_filter = security.and_then(|s| s.bot_filter.as_ref());
        let bot_filter_mw = BotFilterMiddleware::new(
            bot_filter.map(|f| f.enabled).unwrap_or(false),
            bot_filter.map(|f| f.whitelist.as_slice()).unwrap_or(&[]),
            bot_filter.map(|f| f.blacklist.as_slice()).unwrap_or(&[]),
        )?;

        let file_cache_cfg =
            performance.and_then(|p| p.cache.as_ref()).and_then(|c| c.file.as_ref());
        let file_cache_mw: Arc<dyn Middleware> = match file_cache_cfg {
            Some(cfg) if cfg.enabled => {
                let engine = Arc::new(CacheEngine::new(cfg)?);
                engine.spawn_periodic_cleanup(parse_duration_secs(&cfg.cleanup_interval));
                Arc::new(FileCacheMiddleware::new(engine))
            }
            _ => Arc::new(PassThrough),
        };

        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(compression_mw),
            Arc::new(response_transform_mw),
            Arc::new(resource_filter_mw),
            Arc::new(ip_filter_mw),
            Arc::new(bot_filter_mw),
            file_cache_mw,
            Arc::new(MemoryCacheMiddleware),
            Arc::new(ContentLengthMiddleware),
        ];

        let terminal: BoxHandler = Arc::new(Dispatcher::new(routing.clone(), backend_deps));
        let pipeline = build_pipeline(middlewares, terminal);

        Ok(Self { config, routing, pipeline, metrics })
    }
}

/// Parses the `cleanup_interval` config string (`"30s"`, `"5m"`, `"1h"`,
/// `"1d"`; a bare number is seconds). Unrecognized input falls back to one
/// hour rather than failing startup over a cosmetic field.
fn parse_duration_secs(raw: &str) -> u64 {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };
    let value: u64 = digits.parse().unwrap_or(3600);
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => 3600,
    };
    value * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration_secs("45"), 45);
        assert_eq!(parse_duration_secs("45s"), 45);
    }

    #[test]
    fn parses_minutes_hours_days() {
        assert_eq!(parse_duration_secs("5m"), 300);
        assert_eq!(parse_duration_secs("1h"), 3600);
        assert_eq!(parse_duration_secs("2d"), 172_800);
    }

    #[test]
    fn unrecognized_unit_falls_back_to_one_hour() {
        assert_eq!(parse_duration_secs("1x"), 3600);
    }
}
