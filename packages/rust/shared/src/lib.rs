//! Shared types, error model, and configuration for dailydigest.
//!
//! This crate is the foundation depended on by all other dailydigest crates.
//! It provides:
//! - [`DigestError`] — the unified error type
//! - Domain types ([`Story`], [`Stories`], [`CacheSnapshot`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, CacheConfig, FetchConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, snapshot_path,
};
pub use error::{DigestError, Result};
pub use types::{CacheSnapshot, MAX_CACHE_SIZE, Stories, Story, parse_date_key, resolve_latest};
