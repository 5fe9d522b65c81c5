//! Shared types, error model, and configuration for Content Viewer.
//!
//! This crate is the foundation depended on by all other Content Viewer crates.
//! It provides:
//! - [`ContentViewerError`]: the unified error type
//! - [`HostValue`]: the generic key-value view of host data
//! - Domain types ([`ConfigModule`], [`CollectionsMap`], [`RawEntry`], [`Entry`])
//! - The host capability traits ([`ModuleLoader`], [`EntryAccessor`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod host;
pub mod types;
pub mod value;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BridgeConfig, ProjectConfig, ServerConfig, TransportKind, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{ContentViewerError, Result};
pub use host::{EntryAccessor, ModuleLoader};
pub use types::{CollectionsMap, ConfigModule, Entry, OrderedMap, RawEntry};
pub use value::HostValue;
