//! Causeway: a configurable HTTP reverse proxy and API gateway.
//!
//! The binary (`src/main.rs`) is a thin CLI/bootstrap shell around this
//! library; `tests/` integration tests drive the same `AppState`/pipeline
//! this library exposes.

pub mod app;
pub mod auth;
pub mod backends;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod routing;
pub mod server;
