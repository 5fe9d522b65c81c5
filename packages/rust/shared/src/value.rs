//! Generic key-value view of host data.
//!
//! Hosts hand us JSON, but JSON cannot express everything the engine has to
//! tell apart (date instances, `undefined`, functions). Those travel as
//! reserved single-key objects:
//!
//! | Wire form                     | Variant                |
//! |-------------------------------|------------------------|
//! | `{"$date": "<RFC 3339>"}`     | [`HostValue::Date`]    |
//! | `{"$undefined": true}`        | [`HostValue::Undefined`] |
//! | `{"$opaque": "<kind>"}`       | [`HostValue::Opaque`]  |
//!
//! Serialization goes the other way, toward a panel, and follows
//! `JSON.stringify`: dates become ISO strings, undefined and opaque values
//! are dropped from objects and written as `null` inside arrays.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ContentViewerError, Result};
use crate::types::OrderedMap;

const DATE_TAG: &str = "$date";
const UNDEFINED_TAG: &str = "$undefined";
const OPAQUE_TAG: &str = "$opaque";

/// A value produced by the host project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum HostValue {
    Null,
    Undefined,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<HostValue>),
    Object(OrderedMap<HostValue>),
    /// Something the host could not express as data (a function, a class instance).
    /// The string names its kind, e.g. `"function"`.
    Opaque(String),
}

impl HostValue {
    /// Plain objects only; arrays, dates and opaque values are not objects here.
    pub fn as_object(&self) -> Option<&OrderedMap<HostValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Values `JSON.stringify` would drop from an object.
    fn is_unserializable(&self) -> bool {
        matches!(self, Self::Undefined | Self::Opaque(_))
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null | Self::Undefined => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::Date(_) | Self::Array(_) | Self::Object(_) | Self::Opaque(_) => true,
        }
    }

    /// Text the engine's `String(value)` would give.
    ///
    /// Integral numbers print without a fraction (`1.0` is `"1"`). Dates use
    /// the same ISO form as serialization. Arrays join their items with `,`
    /// and objects print as `[object Object]`.
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Undefined => "undefined".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => js_number(n),
            Self::String(s) => s.clone(),
            Self::Date(d) => iso_date(d),
            Self::Array(items) => items
                .iter()
                .map(|item| match item {
                    Self::Null | Self::Undefined => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
            Self::Opaque(kind) => format!("[{kind}]"),
        }
    }
}

impl TryFrom<Value> for HostValue {
    type Error = ContentViewerError;

    fn try_from(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                if let Some(tagged) = decode_tagged(&map)? {
                    return Ok(tagged);
                }
                let mut out = OrderedMap::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key, Self::try_from(value)?);
                }
                Self::Object(out)
            }
        })
    }
}

fn js_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}

fn iso_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Recognize the reserved single-key encodings.
fn decode_tagged(map: &serde_json::Map<String, Value>) -> Result<Option<HostValue>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((tag, value)) = map.iter().next() else {
        return Ok(None);
    };

    match (tag.as_str(), value) {
        (DATE_TAG, Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|d| Some(HostValue::Date(d.with_timezone(&Utc))))
            .map_err(|e| ContentViewerError::decode(format!("invalid {DATE_TAG} value {raw:?}: {e}"))),
        (DATE_TAG, other) => Err(ContentViewerError::decode(format!(
            "{DATE_TAG} must be a string, got {other}"
        ))),
        (UNDEFINED_TAG, _) => Ok(Some(HostValue::Undefined)),
        (OPAQUE_TAG, Value::String(kind)) => Ok(Some(HostValue::Opaque(kind.clone()))),
        _ => Ok(None),
    }
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null | Self::Undefined | Self::Opaque(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&iso_date(d)),
            Self::Array(items) => serializer.collect_seq(items),
            Self::Object(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (key, value) in map.iter().filter(|(_, v)| !v.is_unserializable()) {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> HostValue {
        HostValue::try_from(value).expect("decode host value")
    }

    #[test]
    fn plain_json_maps_directly() {
        assert_eq!(decode(json!(null)), HostValue::Null);
        assert_eq!(decode(json!("x")), HostValue::from("x"));
        assert_eq!(decode(json!(3)), HostValue::from(3_i64));
        assert_eq!(
            decode(json!([true, false])),
            HostValue::Array(vec![true.into(), false.into()])
        );
    }

    #[test]
    fn object_key_order_is_preserved() {
        let value = decode(json!({"title": "a", "draft": false, "author": "b"}));
        let keys: Vec<_> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["title", "draft", "author"]);
    }

    #[test]
    fn reserved_encodings() {
        let date = decode(json!({"$date": "2024-03-01T10:00:00+02:00"}));
        match date {
            HostValue::Date(d) => assert_eq!(d.to_rfc3339(), "2024-03-01T08:00:00+00:00"),
            other => panic!("expected date, got {other:?}"),
        }
        assert_eq!(decode(json!({"$undefined": true})), HostValue::Undefined);
        assert_eq!(
            decode(json!({"$opaque": "function"})),
            HostValue::Opaque("function".into())
        );
    }

    #[test]
    fn tag_with_siblings_is_a_plain_object() {
        let value = decode(json!({"$date": "2024-01-01", "other": 1}));
        assert!(value.as_object().is_some());
    }

    #[test]
    fn malformed_date_is_rejected() {
        let err = HostValue::try_from(json!({"$date": "yesterday"})).unwrap_err();
        assert!(err.to_string().contains("$date"));
    }

    #[test]
    fn serializes_like_json_stringify() {
        let value = decode(json!({
            "published": {"$date": "2024-01-01T00:00:00Z"},
            "missing": {"$undefined": true},
            "render": {"$opaque": "function"},
            "list": [1, {"$undefined": true}],
        }));
        let out = serde_json::to_value(&value).unwrap();
        assert_eq!(
            out,
            json!({"published": "2024-01-01T00:00:00.000Z", "list": [1, null]})
        );
    }

    #[test]
    fn truthiness() {
        assert!(!HostValue::from("").is_truthy());
        assert!(!HostValue::from(0_i64).is_truthy());
        assert!(!HostValue::Null.is_truthy());
        assert!(HostValue::from("a").is_truthy());
        assert!(HostValue::Object(OrderedMap::new()).is_truthy());
    }

    #[test]
    fn js_string_drops_integral_fraction() {
        assert_eq!(decode(json!(1.0)).to_js_string(), "1");
        assert_eq!(decode(json!(-0.0)).to_js_string(), "0");
        assert_eq!(decode(json!(2.5)).to_js_string(), "2.5");
        assert_eq!(decode(json!(42)).to_js_string(), "42");
    }

    #[test]
    fn js_string_of_non_scalars() {
        assert_eq!(HostValue::Bool(true).to_js_string(), "true");
        assert_eq!(decode(json!([1, null, "a"])).to_js_string(), "1,,a");
        assert_eq!(decode(json!({"a": 1})).to_js_string(), "[object Object]");
        assert_eq!(
            decode(json!({"$date": "2024-01-01T00:00:00Z"})).to_js_string(),
            "2024-01-01T00:00:00.000Z"
        );
    }
}
