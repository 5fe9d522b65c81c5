//! Application configuration for Content Viewer.
//!
//! User config lives at `~/.content-viewer/content-viewer.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentViewerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "content-viewer.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".content-viewer";

// ---------------------------------------------------------------------------
// Config structs (matching content-viewer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host project settings.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Host bridge subprocess.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Message channel server.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root; candidate paths are resolved against it.
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> String {
    ".".into()
}

/// `[bridge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Runtime used to run the bridge script.
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Extra arguments placed before the script path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Bridge script, relative to the project root.
    #[serde(default = "default_bridge_script")]
    pub script: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
            script: default_bridge_script(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_bridge_command() -> String {
    "node".into()
}
/// Script the project installs to expose its content layer.
///
/// Nothing here ships it. The script speaks JSON lines on stdio: it prints
/// `{"type":"ready"}` once, then answers each `load_module` (`id`, `path`)
/// with `module` (`id`, `exports`) and each `get_entries` (`id`,
/// `collection`) with `entries` (`id`, `entries`). Failures come back as
/// `error` (`id`, `error`). A `shutdown` line asks it to exit.
fn default_bridge_script() -> String {
    "node_modules/astro-content-viewer/bridge.mjs".into()
}
fn default_request_timeout() -> u64 {
    15_000
}

/// Transport used to expose the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON envelopes on stdin/stdout.
    #[default]
    Stdio,
    /// JSON envelopes in WebSocket text frames.
    Websocket,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Which transport `serve` starts.
    #[serde(default)]
    pub transport: TransportKind,

    /// Bind address for the WebSocket transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the WebSocket transport.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4322
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.content-viewer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentViewerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.content-viewer/content-viewer.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentViewerError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContentViewerError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentViewerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentViewerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentViewerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations the bridge or server could never start with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.bridge.command.trim().is_empty() {
        return Err(ContentViewerError::config("bridge.command must not be empty"));
    }
    if config.bridge.request_timeout_ms == 0 {
        return Err(ContentViewerError::config(
            "bridge.request_timeout_ms must be greater than zero",
        ));
    }
    if config.server.transport == TransportKind::Websocket && config.server.port == 0 {
        return Err(ContentViewerError::config(
            "server.port must be set for the websocket transport",
        ));
    }
    Ok(())
}
