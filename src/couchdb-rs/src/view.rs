use crate::{Document, Error, Result, Row};
use serde_json::Value;
use std::collections::BTreeMap;

/// ViewOptions addresses a view and carries its query parameters.
///
/// Parameters given through [`ViewOptions::param`] are sent verbatim:
/// strings as-is, every other JSON value in its JSON text form. Use
/// [`ViewOptions::key`] and friends for parameters the server expects
/// JSON-encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    ddoc: Option<String>,
    view: Option<String>,
    include_docs: bool,
    params: BTreeMap<String, String>,
}

impl ViewOptions {
    pub fn new(ddoc: impl Into<String>, view: impl Into<String>) -> Self {
        Self::default().ddoc(ddoc).view(view)
    }

    /// Design document name, without the `_design/` prefix
    pub fn ddoc(mut self, ddoc: impl Into<String>) -> Self {
        self.ddoc = Some(ddoc.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Wrap each row's embedded document into a [`Document`]
    pub fn include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = match value.into() {
            Value::String(s) => s,
            other => other.to_string(),
        };
        if name == "include_docs" {
            self.include_docs = value == "true";
        } else {
            self.params.insert(name, value);
        }
        self
    }

    pub fn key(self, key: impl Into<Value>) -> Self {
        self.json_param("key", key.into())
    }

    pub fn start_key(self, key: impl Into<Value>) -> Self {
        self.json_param("startkey", key.into())
    }

    pub fn end_key(self, key: impl Into<Value>) -> Self {
        self.json_param("endkey", key.into())
    }

    pub fn limit(self, limit: u64) -> Self {
        self.param("limit", limit)
    }

    fn json_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn includes_docs(&self) -> bool {
        self.include_docs
    }

    pub(crate) fn target(&self) -> Result<(&str, &str)> {
        let ddoc = self
            .ddoc
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Configuration("a design document (ddoc) is required".to_string()))?;
        let view = self
            .view
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Configuration("a view name is required".to_string()))?;
        Ok((ddoc, view))
    }

    pub(crate) fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.params.len() + 1);
        if self.include_docs {
            pairs.push(("include_docs".to_string(), "true".to_string()));
        }
        pairs.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

/// Rows of an `_all_docs` or view query.
///
/// `Documents` when the query included documents, `Rows` otherwise.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Documents(Vec<Document>),
    Rows(Vec<Row>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Documents(docs) => docs.len(),
            QueryResult::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn documents(&self) -> Option<&[Document]> {
        match self {
            QueryResult::Documents(docs) => Some(docs),
            QueryResult::Rows(_) => None,
        }
    }

    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Documents(_) => None,
        }
    }

    pub fn into_documents(self) -> Option<Vec<Document>> {
        match self {
            QueryResult::Documents(docs) => Some(docs),
            QueryResult::Rows(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Documents(_) => None,
        }
    }
}
