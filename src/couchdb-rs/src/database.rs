use crate::transport::{Request, Response, Transport};
use crate::{Cause, Document, Error, QueryResult, Result, ViewOptions};
use couchdb_core::{DatabaseInfo, DocumentBody, Fields, RowsResponse, WriteResponse};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Database scopes document and view operations to one named database.
///
/// Obtained from [`crate::Server::use_database`]. Cloning is cheap: clones
/// share the transport and name.
#[derive(Clone)]
pub struct Database {
    transport: Arc<dyn Transport>,
    name: Arc<str>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Statuses the server answers a document write with
fn is_written(status: u16) -> bool {
    matches!(status, 201 | 202)
}

impl Database {
    pub(crate) fn new(transport: Arc<dyn Transport>, name: &str) -> Self {
        Self {
            transport,
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn send(&self, request: Request) -> Result<Response> {
        self.transport
            .send(request)
            .await
            .map_err(Error::server_transport)
    }

    /// Database metadata: document counts, update sequence, sizes
    #[tracing::instrument(skip(self), fields(db = %self.name))]
    pub async fn info(&self) -> Result<DatabaseInfo> {
        let response = self.send(Request::get(&[self.name()])).await?;
        if response.status != 200 {
            return Err(Error::unexpected_response("database info", &response));
        }

        response.json().map_err(Error::invalid_json)
    }

    /// Fetch every document in the database, in key order.
    ///
    /// With `include_docs` the result holds [`Document`]s; without it, the
    /// raw rows (`id`, `key`, `value.rev`).
    #[tracing::instrument(skip(self), fields(db = %self.name))]
    pub async fn all_documents(&self, include_docs: bool) -> Result<QueryResult> {
        let request = Request::get(&[self.name(), "_all_docs"])
            .query("include_docs", include_docs.to_string());
        let rows = self.fetch_rows(request, "all documents").await?;
        self.collect(rows, include_docs)
    }

    /// Fetch one document. A missing document is an [`Error::Server`] with
    /// status 404; see [`Error::is_not_found`].
    #[tracing::instrument(skip(self), fields(db = %self.name))]
    pub async fn document_by_id(&self, id: &str) -> Result<Document> {
        if id.is_empty() {
            return Err(Error::Configuration("a document id is required".to_string()));
        }

        let response = self.send(Request::get(&[self.name(), id])).await?;
        if response.status != 200 {
            return Err(Error::unexpected_response("get document", &response));
        }

        let body: DocumentBody = response.json().map_err(Error::invalid_json)?;
        Ok(Document::new(self.clone(), body))
    }

    /// Store a new document.
    ///
    /// An `id` entry in `fields` becomes the document id (PUT); otherwise the
    /// server assigns one (POST). The returned document holds the submitted
    /// fields plus the id and revision from the server.
    #[tracing::instrument(skip(self, fields), fields(db = %self.name))]
    pub async fn create(&self, mut fields: Fields) -> Result<Document> {
        let explicit_id = match fields.remove("id") {
            None => None,
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "document id must be a non-empty string, got {}",
                    other
                )))
            }
        };

        let request = match &explicit_id {
            Some(id) => Request::put(&[self.name(), id.as_str()]),
            None => Request::post(&[self.name()]),
        }
        .json(Value::Object(fields.clone()));

        let response = self.send(request).await?;
        if !is_written(response.status) {
            return Err(Error::unexpected_response("create document", &response));
        }

        let written: WriteResponse = response.json().map_err(Error::invalid_json)?;
        tracing::debug!(id = %written.id, rev = %written.rev, "Document created");

        let mut body = DocumentBody::new(fields);
        body.id = Some(written.id);
        body.revision = Some(written.rev);
        Ok(Document::new(self.clone(), body))
    }

    /// Query a view. Rows come back in the view's collation order.
    #[tracing::instrument(skip(self, options), fields(db = %self.name))]
    pub async fn view(&self, options: &ViewOptions) -> Result<QueryResult> {
        let (ddoc, view) = options.target()?;

        let mut request = Request::get(&[self.name(), "_design", ddoc, "_view", view]);
        for (name, value) in options.query_pairs() {
            request = request.query(name, value);
        }

        let rows = self.fetch_rows(request, "view").await?;
        self.collect(rows, options.includes_docs())
    }

    async fn fetch_rows(&self, request: Request, operation: &str) -> Result<Vec<couchdb_core::Row>> {
        let response = self.send(request).await?;
        if response.status != 200 {
            return Err(Error::unexpected_response(operation, &response));
        }

        let rows: RowsResponse = response.json().map_err(Error::invalid_json)?;
        Ok(rows.rows)
    }

    fn collect(&self, rows: Vec<couchdb_core::Row>, include_docs: bool) -> Result<QueryResult> {
        if !include_docs {
            return Ok(QueryResult::Rows(rows));
        }

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            match row.doc {
                Some(doc) => {
                    let body = DocumentBody::from_value(doc).map_err(Error::invalid_json)?;
                    documents.push(Document::new(self.clone(), body));
                }
                // view rows whose emitted id no longer exists
                None => tracing::debug!(id = ?row.id, "Row has no document, skipping"),
            }
        }
        Ok(QueryResult::Documents(documents))
    }

    /// PUT a new revision of `body`
    pub(crate) async fn update_document(&self, body: &DocumentBody) -> Result<Document> {
        let id = document_id(body, "update")?;
        let request = Request::put(&[self.name(), id]).json(Value::Object(body.write_body()));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(Error::database_transport)?;

        match response.status {
            status if is_written(status) => {
                let written: WriteResponse = response.json().map_err(|e| Error::Database {
                    message: "update response not understood".to_string(),
                    status: Some(status),
                    source: Some(Cause::Json(e)),
                })?;
                tracing::debug!(id = %written.id, rev = %written.rev, "Document updated");

                let mut updated = body.clone();
                updated.id = Some(written.id);
                updated.revision = Some(written.rev);
                Ok(Document::new(self.clone(), updated))
            }
            409 => Err(Error::DocumentConflict(
                "outdated or missing revision".to_string(),
            )),
            _ => Err(Error::database_response("update document", &response)),
        }
    }

    /// DELETE the revision held by `body`; a document that is already gone
    /// counts as deleted
    pub(crate) async fn delete_document(&self, body: &DocumentBody) -> Result<bool> {
        let id = document_id(body, "delete")?;
        let mut request = Request::delete(&[self.name(), id]);
        if let Some(rev) = &body.revision {
            request = request.query("rev", rev.as_str());
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(Error::database_transport)?;

        match response.status {
            200..=299 => Ok(true),
            404 => {
                tracing::debug!(id, "Document already deleted");
                Ok(true)
            }
            409 => Err(Error::DocumentConflict(
                "only the current revision can be deleted".to_string(),
            )),
            _ => Err(Error::database_response("delete document", &response)),
        }
    }
}

fn document_id<'a>(body: &'a DocumentBody, operation: &str) -> Result<&'a str> {
    body.id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
        Error::Configuration(format!(
            "cannot {} a document without an id; create it first",
            operation
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, CREATED, EGDB_INFO, NOT_FOUND};
    use crate::transport::Method;
    use serde_json::json;

    fn database(mock: &Arc<MockTransport>) -> Database {
        Database::new(mock.clone(), "egdb")
    }

    const ALL_DOCS: &str = r#"{"total_rows":2,"offset":0,"rows":[
        {"id":"95613816b3a7490727388ebb47001f4b","key":"95613816b3a7490727388ebb47001f4b","value":{"rev":"1-71e39cb1ac06a5974a16c72b26969009"},"doc":{"_id":"95613816b3a7490727388ebb47001f4b","_rev":"1-71e39cb1ac06a5974a16c72b26969009","sound":"squeak"}},
        {"id":"95613816b3a7490727388ebb470025ad","key":"95613816b3a7490727388ebb470025ad","value":{"rev":"1-1ed93c4b346f531c5e7d4d80aa4b6b6a"},"doc":{"_id":"95613816b3a7490727388ebb470025ad","_rev":"1-1ed93c4b346f531c5e7d4d80aa4b6b6a","sound":"meow"}}
    ]}"#;

    #[tokio::test]
    async fn test_info() {
        let mock = MockTransport::new(vec![(200, EGDB_INFO)]);
        let info = database(&mock).info().await.unwrap();
        assert_eq!(info.db_name, "egdb");
        assert_eq!(info.doc_count, 0);
        assert_eq!(info.extra.get("disk_size"), Some(&json!(8488)));
    }

    #[tokio::test]
    async fn test_all_documents() {
        let mock = MockTransport::new(vec![(200, ALL_DOCS)]);
        let result = database(&mock).all_documents(true).await.unwrap();

        let docs = result.documents().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id(), Some("95613816b3a7490727388ebb47001f4b"));
        assert_eq!(docs[0].get("sound"), Some(&json!("squeak")));
        assert_eq!(docs[1].get("sound"), Some(&json!("meow")));
        assert_eq!(
            docs[1].revision(),
            Some("1-1ed93c4b346f531c5e7d4d80aa4b6b6a")
        );

        let request = mock.last_request();
        assert_eq!(request.path(), "/egdb/_all_docs");
        assert_eq!(
            request.query,
            vec![("include_docs".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn test_all_documents_empty() {
        let mock = MockTransport::new(vec![(200, r#"{"total_rows":0,"offset":0,"rows":[]}"#)]);
        let result = database(&mock).all_documents(true).await.unwrap();
        assert!(result.is_empty());
        assert!(result.documents().is_some());
    }

    #[tokio::test]
    async fn test_all_documents_without_docs() {
        let mock = MockTransport::new(vec![(
            200,
            r#"{"total_rows":1,"offset":0,"rows":[{"id":"a","key":"a","value":{"rev":"1-aaa"}}]}"#,
        )]);
        let result = database(&mock).all_documents(false).await.unwrap();

        let rows = result.into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("a"));
        assert_eq!(rows[0].revision(), Some("1-aaa"));
        assert_eq!(
            mock.last_request().query,
            vec![("include_docs".to_string(), "false".to_string())]
        );
    }

    #[tokio::test]
    async fn test_all_documents_errors() {
        let mock = MockTransport::new(vec![(200, "not json"), (500, "{}")]);
        let db = database(&mock);
        assert!(matches!(
            db.all_documents(true).await,
            Err(Error::Server { status: None, .. })
        ));
        assert_eq!(db.all_documents(true).await.unwrap_err().status(), Some(500));
    }

    #[tokio::test]
    async fn test_document_by_id() {
        let mock = MockTransport::new(vec![(
            200,
            r#"{"_id":"abcde12345","_rev":"1-928ec193918889e122e7ad45cfd88e47","noise":"howl"}"#,
        )]);
        let doc = database(&mock).document_by_id("abcde12345").await.unwrap();
        assert_eq!(doc.id(), Some("abcde12345"));
        assert_eq!(doc.get("noise"), Some(&json!("howl")));
        assert_eq!(mock.last_request().path(), "/egdb/abcde12345");
    }

    #[tokio::test]
    async fn test_document_by_id_missing() {
        let mock = MockTransport::new(vec![(404, NOT_FOUND)]);
        let err = database(&mock).document_by_id("nope").await.unwrap_err();
        assert!(matches!(err, Error::Server { status: Some(404), .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_with_id() {
        let mock = MockTransport::new(vec![(201, CREATED)]);
        let mut fields = Fields::new();
        fields.insert("id".to_string(), json!("abcde12345"));
        fields.insert("noise".to_string(), json!("howl"));

        let doc = database(&mock).create(fields).await.unwrap();
        assert_eq!(doc.id(), Some("abcde12345"));
        assert_eq!(doc.revision(), Some("1-928ec193918889e122e7ad45cfd88e47"));
        assert_eq!(doc.get("noise"), Some(&json!("howl")));
        assert!(doc.get("id").is_none());

        let request = mock.last_request();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path(), "/egdb/abcde12345");
        assert_eq!(request.body, Some(json!({"noise": "howl"})));
    }

    #[tokio::test]
    async fn test_create_without_id() {
        let mock = MockTransport::new(vec![(201, CREATED)]);
        let mut fields = Fields::new();
        fields.insert("noise".to_string(), json!("howl"));

        let doc = database(&mock).create(fields).await.unwrap();
        assert_eq!(doc.id(), Some("abcde12345"));

        let request = mock.last_request();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path(), "/egdb");
    }

    #[tokio::test]
    async fn test_create_unexpected_status() {
        let mock = MockTransport::new(vec![(400, r#"{"error":"bad_request","reason":"invalid UTF-8 JSON"}"#)]);
        let err = database(&mock).create(Fields::new()).await.unwrap_err();
        assert!(matches!(err, Error::Server { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_id() {
        let mock = MockTransport::new(vec![]);
        let mut fields = Fields::new();
        fields.insert("id".to_string(), json!(42));
        assert!(matches!(
            database(&mock).create(fields).await,
            Err(Error::Configuration(_))
        ));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_view_grouped() {
        let mock = MockTransport::new(vec![(
            200,
            r#"{"rows":[{"key":2015,"value":4},{"key":2016,"value":7},{"key":2017,"value":2}]}"#,
        )]);
        let options = ViewOptions::new("myview", "year").param("group", true);
        let result = database(&mock).view(&options).await.unwrap();

        let rows = result.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].key, json!(2016));
        assert_eq!(rows[1].value, json!(7));

        let request = mock.last_request();
        assert_eq!(request.path(), "/egdb/_design/myview/_view/year");
        assert_eq!(
            request.query,
            vec![("group".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn test_view_with_docs() {
        let mock = MockTransport::new(vec![(
            200,
            r#"{"total_rows":3,"offset":0,"rows":[
                {"id":"a","key":2015,"value":null,"doc":{"_id":"a","_rev":"1-a","year":2015,"title":"First"}},
                {"id":"b","key":2016,"value":null,"doc":{"_id":"b","_rev":"1-b","year":2016,"title":"Second"}},
                {"id":"c","key":2017,"value":null,"doc":{"_id":"c","_rev":"1-c","year":2017,"title":"Third"}}
            ]}"#,
        )]);
        let options = ViewOptions::new("myview", "year").include_docs(true);
        let docs = database(&mock)
            .view(&options)
            .await
            .unwrap()
            .into_documents()
            .unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2].id(), Some("c"));
        assert_eq!(docs[2].get("title"), Some(&json!("Third")));
        assert!(mock
            .last_request()
            .query
            .contains(&("include_docs".to_string(), "true".to_string())));
    }

    #[tokio::test]
    async fn test_view_requires_names() {
        let mock = MockTransport::new(vec![]);
        let err = database(&mock)
            .view(&ViewOptions::default().view("year"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(mock.requests().is_empty());
    }
}
