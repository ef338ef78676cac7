//! Per-request parameter bag.
//!
//! # Data Flow
//! ```text
//! Cookie header ─┐
//! query string ──┼─▶ assemble() ─▶ ParameterBag ─▶ module handler
//! body fields ───┤
//! uploaded files ┘
//! ```
//!
//! # Design Decisions
//! - No shared schema: each handler reads the keys it understands
//! - Later sources override earlier ones: cookie < query < body < files
//! - Overriding a key keeps its original position in the bag

use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::http::cookie::{self, CookieMap};

/// Key under which cookies are stored in the bag and in query/body sources.
pub const COOKIE_KEY: &str = "cookie";

/// A file received through `multipart/form-data`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub name: String,
    /// Declared content type (`application/octet-stream` when absent).
    pub mimetype: String,
    /// Raw file contents.
    pub data: Bytes,
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
    Cookies(CookieMap),
    File(UploadedFile),
    /// Structured JSON body values that are not plain strings.
    Json(Value),
}

impl ParamValue {
    /// Borrow the value as text, if it is a single string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON rendition used when forwarding a parameter upstream.
    /// Files are reduced to their metadata.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(text) => Value::String(text.clone()),
            ParamValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            ParamValue::Cookies(cookies) => Value::Object(
                cookies
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            ParamValue::File(file) => json!({
                "name": file.name,
                "mimetype": file.mimetype,
                "size": file.data.len(),
            }),
            ParamValue::Json(value) => value.clone(),
        }
    }
}

/// Fields from one request source, in arrival order.
pub type Fields = IndexMap<String, ParamValue>;

/// The merged input handed to a module handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag {
    entries: Fields,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ParamValue::as_text)
    }

    /// The cookie map assembled for this request.
    pub fn cookies(&self) -> Option<&CookieMap> {
        match self.entries.get(COOKIE_KEY) {
            Some(ParamValue::Cookies(cookies)) => Some(cookies),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }

    fn extend(&mut self, fields: Fields) {
        for (key, value) in fields {
            self.entries.insert(key, value);
        }
    }
}

/// Merge every request source into one bag.
///
/// A string or object `cookie` field inside `query` or `body` is first
/// replaced by its cookie map, so the bag's `cookie` entry is always a map.
pub fn assemble(
    cookies: CookieMap,
    mut query: Fields,
    mut body: Fields,
    files: Fields,
) -> ParameterBag {
    normalize_embedded_cookie(&mut query);
    normalize_embedded_cookie(&mut body);

    let mut bag = ParameterBag::new();
    bag.insert(COOKIE_KEY, ParamValue::Cookies(cookies));
    bag.extend(query);
    bag.extend(body);
    bag.extend(files);
    bag
}

fn normalize_embedded_cookie(fields: &mut Fields) {
    let Some(value) = fields.get_mut(COOKIE_KEY) else {
        return;
    };
    let cookies = match value {
        ParamValue::Text(raw) => cookie::serialize(raw),
        // A JSON object is already a cookie map; non-string values are stringified.
        ParamValue::Json(Value::Object(object)) => object
            .iter()
            .map(|(name, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), text)
            })
            .collect(),
        _ => return,
    };
    *value = ParamValue::Cookies(cookies);
}

/// Collect `key=value` pairs; repeated keys become a list.
pub fn fields_from_pairs<I>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut fields = Fields::new();
    for (key, value) in pairs {
        push_text(&mut fields, key, value);
    }
    fields
}

/// Flatten a JSON object body into fields. Non-object bodies yield nothing.
pub fn fields_from_json(value: Value) -> Fields {
    let Value::Object(object) = value else {
        return Fields::new();
    };
    object
        .into_iter()
        .map(|(key, value)| {
            let param = match value {
                Value::String(text) => ParamValue::Text(text),
                Value::Array(items) if items.iter().all(Value::is_string) => ParamValue::List(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                ),
                other => ParamValue::Json(other),
            };
            (key, param)
        })
        .collect()
}

/// Insert a text value, turning repeats into a list.
pub fn push_text(fields: &mut Fields, key: String, value: String) {
    let Some(slot) = fields.get_mut(&key) else {
        fields.insert(key, ParamValue::Text(value));
        return;
    };
    if let ParamValue::List(items) = slot {
        items.push(value);
        return;
    }
    let previous = std::mem::replace(slot, ParamValue::Text(String::new()));
    *slot = match previous {
        ParamValue::Text(first) => ParamValue::List(vec![first, value]),
        _ => ParamValue::Text(value),
    };
}
