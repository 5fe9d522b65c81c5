//! Session controller, message protocol and transports for Content Viewer.
//!
//! This crate ties discovery and inference together behind the panel
//! protocol and serves it over stdio or WebSocket.

pub mod panel;
pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{APP_ID, CollectionEntries, CollectionsData, GetCollectionEntries, Message};
pub use session::{Session, normalize_entry};
