//! Typed CMS entry decoded from a webhook body.
//!
//! Webhook payloads carry the entry metadata under `sys` and the content under
//! `fields`, each field being a map from locale code to a raw JSON value:
//!
//! ```json
//! {
//!   "sys": { "id": "5KsDBWseXY6QegucYAoacS", "contentType": { "sys": { "id": "page" } } },
//!   "fields": { "title": { "en-US": "Home" }, "content": { "en-US": "<p>Hi</p>" } }
//! }
//! ```
//!
//! Decoding hoists `sys` under `fields` and deserializes the result in one pass.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// Locale code to raw value. Values may be `null`.
pub type LocaleMap = IndexMap<String, JsonValue>;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("request body is empty")]
    Empty,

    #[error("invalid entry payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry payload must be a JSON object")]
    NotAnObject,

    #[error("entry payload has no sys object")]
    MissingSys,

    #[error("entry fields must be a JSON object")]
    InvalidFields,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SystemMetadata {
    pub id: String,
    /// Empty when the payload does not carry a content type
    pub content_type_id: String,
    /// `Entry`, `DeletedEntry`, ...
    pub entry_type: Option<String>,
    pub revision: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub sys: SystemMetadata,
    /// Field name to locale map, in payload order
    pub fields: IndexMap<String, LocaleMap>,
}

impl Entry {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn content_type_id(&self) -> &str {
        &self.sys.content_type_id
    }
}

#[derive(Deserialize)]
struct LinkSys {
    id: String,
}

#[derive(Deserialize)]
struct Link {
    sys: LinkSys,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSys {
    id: String,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    revision: Option<u64>,
    content_type: Option<Link>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    created_by: Option<Link>,
    updated_by: Option<Link>,
}

#[derive(Deserialize)]
struct NormalizedEntry {
    sys: RawSys,
    #[serde(flatten)]
    fields: IndexMap<String, LocaleMap>,
}

pub fn decode_entry(body: &[u8]) -> Result<Entry, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let payload: JsonValue = serde_json::from_slice(body)?;
    let JsonValue::Object(mut root) = payload else {
        return Err(DecodeError::NotAnObject);
    };

    let sys = root.remove("sys").ok_or(DecodeError::MissingSys)?;
    let mut fields = match root.remove("fields") {
        None | Some(JsonValue::Null) => Map::new(),
        Some(JsonValue::Object(fields)) => fields,
        Some(_) => return Err(DecodeError::InvalidFields),
    };
    fields.insert("sys".to_string(), sys);

    let normalized: NormalizedEntry = serde_json::from_value(JsonValue::Object(fields))?;
    let raw = normalized.sys;

    Ok(Entry {
        sys: SystemMetadata {
            id: raw.id,
            content_type_id: raw.content_type.map(|l| l.sys.id).unwrap_or_default(),
            entry_type: raw.entry_type,
            revision: raw.revision,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            created_by: raw.created_by.map(|l| l.sys.id),
            updated_by: raw.updated_by.map(|l| l.sys.id),
        },
        fields: normalized.fields,
    })
}

/// Text form of a raw value: strings yield their contents, anything else its
/// compact JSON text.
pub fn string_form(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
