//! Panel message protocol.
//!
//! Every message is an envelope `{"event": "<name>", "payload": {...}}`.
//! Event names are namespaced with [`APP_ID`]. There are no correlation ids:
//! a response is matched to its request by kind (and by collection name for
//! entries).

use content_viewer_inference::InferredSchema;
use content_viewer_shared::{ContentViewerError, Entry, Result};
use serde::{Deserialize, Serialize};

/// Namespace prefix of every event name.
pub const APP_ID: &str = "content-viewer";

/// One protocol message, request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Message {
    /// Request: list collection names.
    #[serde(rename = "content-viewer:get-collections")]
    GetCollections {},

    /// Response to [`Message::GetCollections`].
    #[serde(rename = "content-viewer:collections-data")]
    CollectionsData(CollectionsData),

    /// Request: entries and inferred schema of one collection.
    #[serde(rename = "content-viewer:get-collection-entries")]
    GetCollectionEntries(GetCollectionEntries),

    /// Response to [`Message::GetCollectionEntries`].
    #[serde(rename = "content-viewer:collection-entries")]
    CollectionEntries(CollectionEntries),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionsData {
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCollectionEntries {
    pub collection: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntries {
    pub collection: String,
    pub entries: Vec<Entry>,
    pub schema: InferredSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn get_collections() -> Self {
        Self::GetCollections {}
    }

    pub fn get_collection_entries(collection: impl Into<String>) -> Self {
        Self::GetCollectionEntries(GetCollectionEntries {
            collection: collection.into(),
        })
    }

    /// Full event name as it appears on the wire.
    pub fn event(&self) -> &'static str {
        match self {
            Self::GetCollections {} => "content-viewer:get-collections",
            Self::CollectionsData(_) => "content-viewer:collections-data",
            Self::GetCollectionEntries(_) => "content-viewer:get-collection-entries",
            Self::CollectionEntries(_) => "content-viewer:collection-entries",
        }
    }

    /// Whether this message is sent by the panel (as opposed to answered by the server).
    pub fn is_request(&self) -> bool {
        matches!(self, Self::GetCollections {} | Self::GetCollectionEntries(_))
    }

    /// Decode one envelope.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ContentViewerError::decode(format!("malformed message: {e}")))
    }

    /// Encode as a single line of JSON.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ContentViewerError::Protocol(format!("failed to encode {}: {e}", self.event())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_are_namespaced() {
        for msg in [
            Message::get_collections(),
            Message::CollectionsData(CollectionsData::default()),
            Message::get_collection_entries("blog"),
            Message::CollectionEntries(CollectionEntries::default()),
        ] {
            assert!(msg.event().starts_with(&format!("{APP_ID}:")));
            let wire = serde_json::to_value(&msg).unwrap();
            assert_eq!(wire["event"], msg.event());
        }
    }

    #[test]
    fn get_collections_has_empty_payload() {
        assert_eq!(
            Message::get_collections().encode().unwrap(),
            r#"{"event":"content-viewer:get-collections","payload":{}}"#
        );
        let decoded =
            Message::decode(r#"{"event":"content-viewer:get-collections","payload":{}}"#).unwrap();
        assert_eq!(decoded, Message::get_collections());
    }

    #[test]
    fn decodes_entries_request() {
        let msg = Message::decode(
            r#"{"event":"content-viewer:get-collection-entries","payload":{"collection":"blog"}}"#,
        )
        .unwrap();
        assert_eq!(msg, Message::get_collection_entries("blog"));
        assert!(msg.is_request());
    }

    #[test]
    fn error_field_is_omitted_when_absent() {
        let msg = Message::CollectionsData(CollectionsData {
            collections: vec!["blog".into(), "authors".into()],
            error: None,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "content-viewer:collections-data",
                "payload": {"collections": ["blog", "authors"]}
            })
        );

        let msg = Message::CollectionEntries(CollectionEntries {
            collection: "posts".into(),
            error: Some("boom".into()),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "event": "content-viewer:collection-entries",
                "payload": {"collection": "posts", "entries": [], "schema": {}, "error": "boom"}
            })
        );
    }

    #[test]
    fn malformed_envelopes_are_decode_errors() {
        for text in [
            "not json",
            r#"{"event":"content-viewer:unknown","payload":{}}"#,
            r#"{"event":"content-viewer:get-collection-entries","payload":{}}"#,
            r#"{"payload":{}}"#,
        ] {
            let err = Message::decode(text).unwrap_err();
            assert!(matches!(err, ContentViewerError::Decode { .. }), "{text}");
        }
    }
}
