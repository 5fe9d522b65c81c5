//! Capability interfaces the engine needs from a host project.
//!
//! The engine never talks to a runtime directly. It is handed one
//! [`ModuleLoader`] and one [`EntryAccessor`]; the CLI wires real
//! implementations (a bridge subprocess or a JSON snapshot) and tests wire stubs.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConfigModule, RawEntry};

/// Loads a candidate config module from the host project.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the module at `path` (e.g. `/src/content/config.ts`).
    ///
    /// Any failure (missing file, syntax error, evaluation error) is an `Err`;
    /// callers treat all of them alike.
    async fn load_module(&self, path: &str) -> Result<ConfigModule>;
}

/// Retrieves the entries of one named collection from the host project.
#[async_trait]
pub trait EntryAccessor: Send + Sync {
    async fn get_entries(&self, collection: &str) -> Result<Vec<RawEntry>>;
}
