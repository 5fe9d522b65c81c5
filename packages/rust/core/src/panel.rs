//! Client-side panel state.
//!
//! [`PanelState`] tracks what the inspection panel is showing. It changes only
//! in response to received messages ([`PanelState::apply`]) and user intents;
//! intents that need the server return the request to send. Rendering is left
//! to the embedding UI.

use content_viewer_inference::{FieldSchema, InferredSchema};
use content_viewer_shared::{Entry, HostValue};
use tracing::debug;

use crate::protocol::{CollectionEntries, CollectionsData, Message};

/// Examples shown per field on the schema tab.
pub const PREVIEW_EXAMPLES: usize = 2;

/// Characters kept of a string example before it is cut off.
pub const PREVIEW_STRING_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    /// Entry list of a collection.
    Entries,
    /// Inferred schema of a collection.
    Schema,
    /// Entry data as a tree.
    Data,
    /// Entry as pretty-printed JSON.
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Loading,
    Collections(Vec<String>),
    Error(String),
    CollectionLoading(String),
    Entries {
        collection: String,
        entries: Vec<Entry>,
        schema: InferredSchema,
        tab: Tab,
    },
    EntryDetail {
        collection: String,
        entries: Vec<Entry>,
        schema: InferredSchema,
        index: usize,
        tab: Tab,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    view: View,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            view: View::Loading,
        }
    }
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Panel opened: show the spinner and ask for collections.
    pub fn start(&mut self) -> Message {
        self.view = View::Loading;
        Message::get_collections()
    }

    /// Apply a message received from the server.
    pub fn apply(&mut self, message: Message) {
        match message {
            Message::CollectionsData(data) => self.apply_collections(data),
            Message::CollectionEntries(data) => self.apply_entries(data),
            other => debug!(event = other.event(), "panel ignores request messages"),
        }
    }

    fn apply_collections(&mut self, data: CollectionsData) {
        self.view = match data.error {
            Some(error) => View::Error(error),
            None => View::Collections(data.collections),
        };
    }

    fn apply_entries(&mut self, data: CollectionEntries) {
        let awaited = matches!(&self.view, View::CollectionLoading(name) if *name == data.collection);
        if !awaited {
            debug!(collection = %data.collection, "stale collection entries ignored");
            return;
        }

        self.view = match data.error {
            Some(error) => View::Error(error),
            None => View::Entries {
                collection: data.collection,
                entries: data.entries,
                schema: data.schema,
                tab: Tab::Entries,
            },
        };
    }

    /// User picked a collection.
    pub fn select_collection(&mut self, name: &str) -> Message {
        self.view = View::CollectionLoading(name.to_string());
        Message::get_collection_entries(name)
    }

    /// Switch tabs. Tabs that do not belong to the current view are ignored.
    pub fn select_tab(&mut self, new_tab: Tab) {
        match &mut self.view {
            View::Entries { tab, .. } if matches!(new_tab, Tab::Entries | Tab::Schema) => {
                *tab = new_tab;
            }
            View::EntryDetail { tab, .. } if matches!(new_tab, Tab::Data | Tab::Raw) => {
                *tab = new_tab;
            }
            _ => {}
        }
    }

    /// Open the entry at `index` of the current entry list.
    pub fn open_entry(&mut self, index: usize) {
        let View::Entries {
            collection,
            entries,
            schema,
            ..
        } = &mut self.view
        else {
            return;
        };
        if index >= entries.len() {
            return;
        }

        self.view = View::EntryDetail {
            collection: std::mem::take(collection),
            entries: std::mem::take(entries),
            schema: std::mem::take(schema),
            index,
            tab: Tab::Data,
        };
    }

    /// Go back one level. Returns a request when going back means reloading.
    pub fn back(&mut self) -> Option<Message> {
        match std::mem::replace(&mut self.view, View::Loading) {
            View::EntryDetail {
                collection,
                entries,
                schema,
                ..
            } => {
                self.view = View::Entries {
                    collection,
                    entries,
                    schema,
                    tab: Tab::Entries,
                };
                None
            }
            View::Collections(names) => {
                self.view = View::Collections(names);
                None
            }
            View::Loading
            | View::Error(_)
            | View::CollectionLoading(_)
            | View::Entries { .. } => Some(Message::get_collections()),
        }
    }

    /// The entry open in the detail view.
    pub fn current_entry(&self) -> Option<&Entry> {
        match &self.view {
            View::EntryDetail { entries, index, .. } => entries.get(*index),
            _ => None,
        }
    }

    /// Pretty JSON of the open entry, as the raw tab shows it.
    pub fn raw_json(&self) -> Option<String> {
        self.current_entry()
            .and_then(|entry| serde_json::to_string_pretty(entry).ok())
    }
}

/// One line of the entry list: the id, and the title when the entry has one.
pub fn entry_label(entry: &Entry) -> String {
    match entry.data.get("title").filter(|title| title.is_truthy()) {
        Some(HostValue::String(title)) => format!("{} - {title}", entry.id),
        Some(title) => format!("{} - {}", entry.id, preview_value(title)),
        None => entry.id.clone(),
    }
}

/// Short text of a field's first examples, as shown on the schema tab.
///
/// At most [`PREVIEW_EXAMPLES`] examples; strings are quoted and cut to
/// [`PREVIEW_STRING_CHARS`] characters plus `...`.
pub fn example_preview(field: &FieldSchema) -> String {
    field
        .examples
        .iter()
        .take(PREVIEW_EXAMPLES)
        .map(|example| match example {
            HostValue::String(s) => {
                let cut: String = s.chars().take(PREVIEW_STRING_CHARS).collect();
                let ellipsis = if s.chars().count() > PREVIEW_STRING_CHARS { "..." } else { "" };
                format!("\"{cut}{ellipsis}\"")
            }
            other => preview_value(other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview_value(value: &HostValue) -> String {
    match value {
        HostValue::Bool(_) | HostValue::Number(_) | HostValue::String(_) => value.to_js_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
