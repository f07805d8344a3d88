use crate::coordinates::Coordinates;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;

/// A definition document as stored in the database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawRecord")]
pub struct Record {
    pub id: String,
    pub coordinates: Coordinates,
    /// `_meta.updated`, an ISO-8601 timestamp string.
    pub updated: Option<String>,
    /// `licensed.declared`; `None` when the field is absent or null.
    pub declared: Option<Value>,
    /// Whether `licensed.declared` exists at all, null included. This is
    /// what the missing-declared filter tests.
    pub declared_present: bool,
    /// The whole `_meta` object.
    pub meta: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id: id.into(),
            coordinates,
            updated: None,
            declared: None,
            declared_present: false,
            meta: Value::Null,
        }
    }

    pub fn with_updated(mut self, updated: impl Into<String>) -> Self {
        let updated = updated.into();
        self.meta = serde_json::json!({ "updated": updated });
        self.updated = Some(updated);
        self
    }

    pub fn with_declared(mut self, declared: impl Into<String>) -> Self {
        self.declared = Some(Value::String(declared.into()));
        self.declared_present = true;
        self
    }

    pub fn from_json(value: Value) -> crate::Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| crate::DefsyncErr::MalformedRecord(err.to_string()))
    }
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "_id")]
    id: String,
    coordinates: Coordinates,
    #[serde(rename = "_meta", default)]
    meta: Value,
    #[serde(default)]
    licensed: Option<RawLicensed>,
}

#[derive(Deserialize)]
struct RawLicensed {
    #[serde(default, deserialize_with = "present_value")]
    declared: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` so presence survives.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        let updated = raw
            .meta
            .get("updated")
            .and_then(Value::as_str)
            .map(str::to_string);
        let declared = raw.licensed.and_then(|licensed| licensed.declared);
        Self {
            id: raw.id,
            coordinates: raw.coordinates,
            updated,
            declared_present: declared.is_some(),
            declared: declared.filter(|value| !value.is_null()),
            meta: raw.meta,
        }
    }
}

/// The blob-store copy of a definition. An unreachable or missing blob is
/// represented by [`CanonicalBlob::empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalBlob {
    pub declared: Option<Value>,
    pub meta: Value,
}

impl CanonicalBlob {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(value: &Value) -> Self {
        let declared = value
            .get("licensed")
            .and_then(|licensed| licensed.get("declared"))
            .filter(|declared| !declared.is_null())
            .cloned();
        let meta = value.get("_meta").cloned().unwrap_or(Value::Null);
        Self { declared, meta }
    }
}
