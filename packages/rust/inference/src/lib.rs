//! Empirical schema inference over collection entries.
//!
//! The schema is derived from the data actually present, not from any declared
//! type: each field gets a [`TypeTag`] from the first value seen for it, plus up
//! to [`MAX_EXAMPLES`] sample values. The result is advisory.
//!
//! A field's type is fixed by its first sample and never revised, even when a
//! later entry holds a value of a different shape.

use std::sync::LazyLock;

use content_viewer_shared::{Entry, HostValue, OrderedMap};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

/// Maximum number of example values kept per field.
pub const MAX_EXAMPLES: usize = 3;

/// Field name → inferred field schema, in first-seen order.
pub type InferredSchema = OrderedMap<FieldSchema>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Inferred kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Date,
    Url,
    Array,
    Object,
    Null,
    Undefined,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Url => "url",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
            Self::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one field: its type tag and a few sample values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub examples: Vec<HostValue>,
}

impl FieldSchema {
    fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            examples: Vec::with_capacity(MAX_EXAMPLES),
        }
    }

    /// Keep `value` as an example if there is room and it carries information.
    fn observe(&mut self, value: &HostValue) {
        if self.examples.len() < MAX_EXAMPLES && is_example_worthy(value) {
            self.examples.push(value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A string starting with `YYYY-MM-DD`.
static DATE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date prefix regex"));

/// A string starting with an http(s) scheme.
static URL_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("url prefix regex"));

/// Classify a single value.
///
/// Strings are refined by prefix: a leading ISO date makes a `date`, a leading
/// `http://` or `https://` makes a `url`. Opaque host values (functions, class
/// instances) classify as `object`.
pub fn classify(value: &HostValue) -> TypeTag {
    match value {
        HostValue::Null => TypeTag::Null,
        HostValue::Undefined => TypeTag::Undefined,
        HostValue::Array(_) => TypeTag::Array,
        HostValue::Date(_) => TypeTag::Date,
        HostValue::String(s) if DATE_PREFIX_RE.is_match(s) => TypeTag::Date,
        HostValue::String(s) if URL_PREFIX_RE.is_match(s) => TypeTag::Url,
        HostValue::String(_) => TypeTag::String,
        HostValue::Number(_) => TypeTag::Number,
        HostValue::Bool(_) => TypeTag::Boolean,
        HostValue::Object(_) | HostValue::Opaque(_) => TypeTag::Object,
    }
}

/// Undefined and the empty string are never kept as examples.
fn is_example_worthy(value: &HostValue) -> bool {
    !value.is_undefined() && value.as_str() != Some("")
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Infer a schema from `entries`, visiting entries and their fields in order.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn infer_schema(entries: &[Entry]) -> InferredSchema {
    let mut schema = InferredSchema::new();

    for entry in entries {
        for (field, value) in entry.data.iter() {
            let field_schema = schema
                .entry(field.clone())
                .or_insert_with(|| FieldSchema::new(classify(value)));
            field_schema.observe(value);
        }
    }

    trace!(fields = schema.len(), "schema inferred");
    schema
}
