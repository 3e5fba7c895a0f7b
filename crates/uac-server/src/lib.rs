//! Server binary support for the unified auth center: configuration
//! loading, tracing setup and service wiring around `uac-auth`.

pub mod config;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ConfigLoadError, RedisConfig, ServerConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ServerBuilder, UacServer, build_app, build_state, create_store};
