use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Arbitrary document fields, keyed by field name
pub type Fields = Map<String, Value>;

/// Database holding the server's user documents
pub const USERS_DATABASE: &str = "_users";

/// Id prefix the server requires for user documents
pub const USER_ID_PREFIX: &str = "org.couchdb.user:";

/// DocumentBody is the stored JSON of one document revision.
///
/// `_id` and `_rev` are lifted out into `id` and `revision`; every other key
/// stays in `fields`. Serializing puts them back under their wire names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentBody {
    pub id: Option<String>,
    pub revision: Option<String>,
    pub fields: Fields,
}

impl DocumentBody {
    pub fn new(fields: Fields) -> Self {
        let mut body = Self::default();
        for (key, value) in fields {
            body.insert(key, value);
        }
        body
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field. String values for `_id`/`_rev` update `id`/`revision`
    /// instead of landing in `fields`.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        let field = field.into();
        match value {
            Value::String(id) if field == "_id" => self.id.replace(id).map(Value::String),
            Value::String(rev) if field == "_rev" => self.revision.replace(rev).map(Value::String),
            value => self.fields.insert(field, value),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Body for a PUT of this revision: all fields plus `_rev` when known.
    /// The id travels in the request path, not the body.
    pub fn write_body(&self) -> Fields {
        let mut body = self.fields.clone();
        body.remove("_id");
        match &self.revision {
            Some(rev) => {
                body.insert("_rev".to_string(), Value::String(rev.clone()));
            }
            None => {
                body.remove("_rev");
            }
        }
        body
    }
}

impl Serialize for DocumentBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len =
            self.fields.len() + usize::from(self.id.is_some()) + usize::from(self.revision.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(id) = &self.id {
            map.serialize_entry("_id", id)?;
        }
        if let Some(rev) = &self.revision {
            map.serialize_entry("_rev", rev)?;
        }
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DocumentBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Fields::deserialize(deserializer)?;
        let id = take_string(&mut fields, "_id").map_err(de::Error::custom)?;
        let revision = take_string(&mut fields, "_rev").map_err(de::Error::custom)?;
        Ok(Self {
            id,
            revision,
            fields,
        })
    }
}

fn take_string(fields: &mut Fields, key: &str) -> Result<Option<String>, String> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(format!("`{}` must be a string, got {}", key, other)),
    }
}

/// Response to `GET /`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Response to a successful document or user write
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// Response to `_all_docs` and view queries
#[derive(Debug, Clone, Deserialize)]
pub struct RowsResponse {
    #[serde(default)]
    pub total_rows: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    pub rows: Vec<Row>,
}

/// Row is one entry of an `_all_docs` or view result.
///
/// `_all_docs` rows carry `id`, `key` and `value: {rev}`; reduced view rows
/// have only `key` and `value`. `doc` is present when documents were
/// included and the row's document still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
}

impl Row {
    /// Revision reported in `value.rev`, as `_all_docs` does
    pub fn revision(&self) -> Option<&str> {
        self.value.get("rev").and_then(Value::as_str)
    }
}

/// Response to `GET /<db>`
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(default)]
    pub doc_del_count: u64,
    #[serde(default)]
    pub update_seq: Value,
    #[serde(flatten)]
    pub extra: Fields,
}

/// UserDocument is the body written to the users database
#[derive(Debug, Clone, Serialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub password: String,
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl UserDocument {
    pub fn new(username: &str, password: &str, roles: Vec<String>) -> Self {
        Self {
            id: user_document_id(username),
            name: username.to_string(),
            password: password.to_string(),
            roles,
            kind: "user".to_string(),
        }
    }
}

pub fn user_document_id(username: &str) -> String {
    format!("{}{}", USER_ID_PREFIX, username)
}

/// ErrorBody is the server's `{error, reason}` failure payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.error, self.reason)
        }
    }
}
