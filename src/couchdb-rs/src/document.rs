use crate::{Database, Result};
use couchdb_core::{DocumentBody, Fields};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Document is one revision of a stored document.
///
/// It remembers the database it came from so it can write itself back.
/// A successful [`Document::update`] returns a new `Document`; the old one
/// keeps the previous revision and any further write with it conflicts.
#[derive(Clone)]
pub struct Document {
    body: DocumentBody,
    database: Database,
}

impl Document {
    pub(crate) fn new(database: Database, body: DocumentBody) -> Self {
        Self { body, database }
    }

    /// Set once the document has been stored or fetched
    pub fn id(&self) -> Option<&str> {
        self.body.id.as_deref()
    }

    pub fn revision(&self) -> Option<&str> {
        self.body.revision.as_deref()
    }

    pub fn fields(&self) -> &Fields {
        &self.body.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Deserialize one field into `T`; `Ok(None)` when it is absent
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> serde_json::Result<Option<T>> {
        self.body
            .get(field)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.body.insert(field, value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.body.remove(field)
    }

    pub fn body(&self) -> &DocumentBody {
        &self.body
    }

    pub fn into_body(self) -> DocumentBody {
        self.body
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Write the current fields as a new revision.
    ///
    /// Fails with [`crate::Error::DocumentConflict`] when this revision is no
    /// longer current; re-fetch, reapply and retry.
    #[tracing::instrument(skip(self), fields(db = %self.database.name(), id = ?self.id()))]
    pub async fn update(&self) -> Result<Document> {
        self.database.update_document(&self.body).await
    }

    /// Delete this revision. Deleting a document that is already gone
    /// succeeds.
    #[tracing::instrument(skip(self), fields(db = %self.database.name(), id = ?self.id()))]
    pub async fn delete(&self) -> Result<bool> {
        self.database.delete_document(&self.body).await
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.body.id)
            .field("revision", &self.body.revision)
            .field("fields", &self.body.fields)
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}
