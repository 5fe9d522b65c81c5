//! Error types for Content Viewer.
//!
//! Library crates use [`ContentViewerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Three variants are *recoverable*: [`ConfigNotFound`], [`NoCollections`] and
//! whatever the entry accessor returns. The session controller never surfaces
//! them as faults; their `Display` text becomes the `error` field of a response.
//!
//! [`ConfigNotFound`]: ContentViewerError::ConfigNotFound
//! [`NoCollections`]: ContentViewerError::NoCollections

use std::path::PathBuf;

/// Top-level error type for all Content Viewer operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentViewerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A candidate module could not be loaded by the host.
    #[error("failed to load module {path}: {message}")]
    ModuleLoad { path: String, message: String },

    /// The host bridge subprocess failed or misbehaved.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// The host reported a failure of its own (message passed through verbatim).
    #[error("{0}")]
    Host(String),

    /// A host value or message could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Transport-level failure while serving the message channel.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The host has no collection with the requested name.
    #[error("collection \"{name}\" does not exist")]
    UnknownCollection { name: String },

    /// No candidate path produced a module that looks like a collections definition.
    #[error("Content config not found (checked config.ts/js/mjs variants)")]
    ConfigNotFound,

    /// A config module loaded, but no export holds a collections mapping.
    #[error("No collections object found in the configuration file")]
    NoCollections,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentViewerError>;

impl ContentViewerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a module load error for a candidate path.
    pub fn module_load(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ModuleLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
