//! Concrete hosts behind the [`ModuleLoader`] and [`EntryAccessor`] capabilities.
//!
//! - [`BridgeHost`] drives a bridge script running inside the live project.
//! - [`SnapshotHost`] answers from a JSON snapshot file.
//!
//! [`ModuleLoader`]: content_viewer_shared::ModuleLoader
//! [`EntryAccessor`]: content_viewer_shared::EntryAccessor

mod bridge;
mod snapshot;

pub use bridge::BridgeHost;
pub use snapshot::SnapshotHost;
