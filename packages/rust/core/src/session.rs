//! Session controller: turns requests into responses.
//!
//! The controller holds no state between requests. Recoverable failures
//! (no config, no collections export, accessor errors) become the `error`
//! field of the response; nothing here returns `Err`.

use std::sync::Arc;

use content_viewer_discovery::discover_collections;
use content_viewer_inference::{InferredSchema, infer_schema};
use content_viewer_shared::{
    Entry, EntryAccessor, HostValue, ModuleLoader, OrderedMap, RawEntry,
};
use tracing::{info, instrument, warn};

use crate::protocol::{CollectionEntries, CollectionsData, Message};

/// Id given to entries that carry neither an id nor a slug.
pub const UNKNOWN_ENTRY_ID: &str = "unknown";

/// Request handler over the two host capabilities.
#[derive(Clone)]
pub struct Session {
    loader: Arc<dyn ModuleLoader>,
    accessor: Arc<dyn EntryAccessor>,
}

impl Session {
    pub fn new(loader: Arc<dyn ModuleLoader>, accessor: Arc<dyn EntryAccessor>) -> Self {
        Self { loader, accessor }
    }

    /// Build a session from one host providing both capabilities.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: ModuleLoader + EntryAccessor + 'static,
    {
        Self {
            loader: host.clone(),
            accessor: host,
        }
    }

    /// Discover the collections of the project.
    #[instrument(skip_all)]
    pub async fn get_collections(&self) -> CollectionsData {
        match discover_collections(self.loader.as_ref()).await {
            Ok((_, collections)) => CollectionsData {
                collections: collections.keys().cloned().collect(),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "collection discovery failed");
                CollectionsData {
                    collections: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Fetch, normalize and profile the entries of `collection`.
    #[instrument(skip(self))]
    pub async fn get_collection_entries(&self, collection: &str) -> CollectionEntries {
        match self.accessor.get_entries(collection).await {
            Ok(raw) => {
                let entries: Vec<Entry> = raw.into_iter().map(normalize_entry).collect();
                let schema = infer_schema(&entries);
                info!(entries = entries.len(), fields = schema.len(), "entries loaded");
                CollectionEntries {
                    collection: collection.to_string(),
                    entries,
                    schema,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "entry retrieval failed");
                CollectionEntries {
                    collection: collection.to_string(),
                    entries: Vec::new(),
                    schema: InferredSchema::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Answer a request. Response kinds get no reply.
    pub async fn handle(&self, message: Message) -> Option<Message> {
        match message {
            Message::GetCollections {} => Some(Message::CollectionsData(self.get_collections().await)),
            Message::GetCollectionEntries(request) => Some(Message::CollectionEntries(
                self.get_collection_entries(&request.collection).await,
            )),
            other => {
                warn!(event = other.event(), "ignoring response message sent to the server");
                None
            }
        }
    }
}

/// Convert a host entry into `{id, data}`.
///
/// The id is the first truthy of `id` and `slug`, stringified, else [`UNKNOWN_ENTRY_ID`].
/// Data that is missing or not an object becomes an empty object.
pub fn normalize_entry(raw: RawEntry) -> Entry {
    let id = entry_key(raw.id.as_ref())
        .or_else(|| entry_key(raw.slug.as_ref()))
        .unwrap_or_else(|| UNKNOWN_ENTRY_ID.to_string());

    let data = match raw.data {
        Some(HostValue::Object(data)) => data,
        _ => OrderedMap::new(),
    };

    Entry { id, data }
}

fn entry_key(value: Option<&HostValue>) -> Option<String> {
    value.filter(|v| v.is_truthy()).map(HostValue::to_js_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubHost;
    use content_viewer_host::SnapshotHost;
    use content_viewer_inference::TypeTag;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEntry {
        serde_json::from_value(value).expect("raw entry")
    }

    fn fixture_session() -> Session {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/snapshots/blog.json");
        Session::from_host(Arc::new(SnapshotHost::load(&path).expect("fixture")))
    }

    #[test]
    fn id_falls_back_to_slug_then_unknown() {
        assert_eq!(normalize_entry(raw(json!({"id": "a", "slug": "b"}))).id, "a");
        assert_eq!(normalize_entry(raw(json!({"id": "", "slug": "b"}))).id, "b");
        assert_eq!(normalize_entry(raw(json!({"slug": "b"}))).id, "b");
        assert_eq!(normalize_entry(raw(json!({"id": "", "slug": ""}))).id, "unknown");
        assert_eq!(normalize_entry(raw(json!({}))).id, "unknown");
        assert_eq!(normalize_entry(raw(json!({"id": null, "slug": 7}))).id, "7");
        assert_eq!(normalize_entry(raw(json!({"id": 0}))).id, "unknown");
    }

    #[test]
    fn non_string_ids_are_stringified() {
        assert_eq!(normalize_entry(raw(json!({"id": 1.0, "slug": "b"}))).id, "1");
        assert_eq!(normalize_entry(raw(json!({"id": 2.5}))).id, "2.5");
        assert_eq!(normalize_entry(raw(json!({"id": true, "slug": "b"}))).id, "true");
        assert_eq!(normalize_entry(raw(json!({"id": false, "slug": "b"}))).id, "b");
    }

    #[test]
    fn non_object_data_becomes_empty() {
        assert!(normalize_entry(raw(json!({"id": "a", "data": "text"}))).data.is_empty());
        assert!(normalize_entry(raw(json!({"id": "a", "data": null}))).data.is_empty());
        assert!(normalize_entry(raw(json!({"id": "a", "data": [1]}))).data.is_empty());

        let entry = normalize_entry(raw(json!({"id": "a", "data": {"title": "x"}})));
        assert_eq!(entry.data.get("title"), Some(&HostValue::from("x")));
    }

    #[tokio::test]
    async fn collections_in_export_order() {
        let data = fixture_session().get_collections().await;
        assert_eq!(data.collections, vec!["blog", "authors"]);
        assert!(data.error.is_none());
    }

    #[tokio::test]
    async fn missing_config_is_reported_not_thrown() {
        let session = Session::from_host(Arc::new(StubHost::default()));
        let data = session.get_collections().await;
        assert!(data.collections.is_empty());
        assert_eq!(
            data.error.as_deref(),
            Some("Content config not found (checked config.ts/js/mjs variants)")
        );
    }

    #[tokio::test]
    async fn entries_are_normalized_and_profiled() {
        let entries = fixture_session().get_collection_entries("blog").await;
        assert!(entries.error.is_none());

        let ids: Vec<_> = entries.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first-post", "second-post", "unknown"]);

        let schema = &entries.schema;
        assert_eq!(schema.get("title").unwrap().type_tag, TypeTag::String);
        assert_eq!(schema.get("pubDate").unwrap().type_tag, TypeTag::Date);
        assert_eq!(schema.get("heroImage").unwrap().type_tag, TypeTag::Url);
        assert_eq!(schema.get("tags").unwrap().type_tag, TypeTag::Array);
        assert_eq!(schema.get("updatedDate").unwrap().type_tag, TypeTag::Undefined);
        assert!(schema.get("updatedDate").unwrap().examples.is_empty());
        // "" is skipped; the two non-empty descriptions are kept.
        assert_eq!(schema.get("description").unwrap().examples.len(), 2);
    }

    #[tokio::test]
    async fn unknown_collection_yields_empty_result_with_error() {
        let entries = fixture_session().get_collection_entries("posts").await;
        assert_eq!(entries.collection, "posts");
        assert!(entries.entries.is_empty());
        assert!(entries.schema.is_empty());
        assert_eq!(entries.error.as_deref(), Some(r#"collection "posts" does not exist"#));
    }

    #[tokio::test]
    async fn handle_answers_requests_and_ignores_responses() {
        let session = fixture_session();

        let reply = session.handle(Message::get_collections()).await;
        assert!(matches!(reply, Some(Message::CollectionsData(_))));

        let reply = session.handle(Message::get_collection_entries("authors")).await;
        match reply {
            Some(Message::CollectionEntries(data)) => assert_eq!(data.entries.len(), 2),
            other => panic!("unexpected reply: {other:?}"),
        }

        let ignored = session
            .handle(Message::CollectionsData(CollectionsData::default()))
            .await;
        assert!(ignored.is_none());
    }

    #[tokio::test]
    async fn serialized_response_matches_wire_format() {
        let reply = fixture_session()
            .handle(Message::get_collection_entries("authors"))
            .await
            .unwrap();
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            wire,
            json!({
                "event": "content-viewer:collection-entries",
                "payload": {
                    "collection": "authors",
                    "entries": [
                        {"id": "ada", "data": {"name": "Ada", "site": "https://ada.dev"}},
                        {"id": "linus", "data": {"name": "Linus", "site": null}}
                    ],
                    "schema": {
                        "name": {"type": "string", "examples": ["Ada", "Linus"]},
                        "site": {"type": "url", "examples": ["https://ada.dev", null]}
                    }
                }
            })
        );
    }
}
