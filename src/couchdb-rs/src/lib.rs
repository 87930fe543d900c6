//! couchdb-rs Client Library
//!
//! HTTP client for document databases speaking the CouchDB REST API.
//!
//! ```rust,no_run
//! use couchdb_rs::{Server, ViewOptions};
//!
//! #[tokio::main]
//! async fn main() -> couchdb_rs::Result<()> {
//!     let server = Server::from_url("http://localhost:5984")?;
//!     let db = server.use_database("animals", true).await?;
//!
//!     let mut fields = serde_json::Map::new();
//!     fields.insert("noise".into(), "howl".into());
//!     let mut doc = db.create(fields).await?;
//!
//!     doc.set("noise", "purr");
//!     let doc = doc.update().await?;
//!
//!     let by_year = db.view(&ViewOptions::new("stats", "year").param("group", true)).await?;
//!     println!("{} groups, latest rev {:?}", by_year.len(), doc.revision());
//!     Ok(())
//! }
//! ```

mod database;
mod document;
mod server;
#[cfg(test)]
mod testing;
mod transport;
mod view;

pub use couchdb_core::{Config, DatabaseInfo, DocumentBody, Fields, Row};
pub use database::Database;
pub use document::Document;
pub use server::{Server, ServerOptions};
pub use transport::{HttpTransport, Method, Request, Response, Transport, TransportError};
pub use view::{QueryResult, ViewOptions};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid arguments, detected before any request is sent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The server could not be reached at all
    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    /// Unexpected status or unreadable body from a server or database call
    #[error("Server error: {message}")]
    Server {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Cause>,
    },

    /// A document write was rejected because its revision is stale or missing
    #[error("Document conflict: {0}")]
    DocumentConflict(String),

    /// Any other failure while writing or deleting a document
    #[error("Database error: {message}")]
    Database {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Cause>,
    },
}

/// Underlying failure chained from `Error::Server` and `Error::Database`
#[derive(Debug, thiserror::Error)]
pub enum Cause {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status behind the error, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } | Error::Database { status, .. } => *status,
            Error::DocumentConflict(_) => Some(409),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::DocumentConflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub(crate) fn server(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Server {
            message: message.into(),
            status,
            source: None,
        }
    }

    pub(crate) fn unexpected_response(operation: &str, response: &Response) -> Self {
        tracing::warn!(operation, status = response.status, "Unexpected response");
        Error::server(
            format!(
                "{}: unexpected status {} ({})",
                operation,
                response.status,
                response.describe()
            ),
            Some(response.status),
        )
    }

    pub(crate) fn invalid_json(err: serde_json::Error) -> Self {
        Error::Server {
            message: "JSON response not received or not understood".to_string(),
            status: None,
            source: Some(Cause::Json(err)),
        }
    }

    /// Transport failure during a server or database call
    pub(crate) fn server_transport(err: TransportError) -> Self {
        match err {
            TransportError::Connect(_) => Error::Connection(err),
            err => Error::Server {
                message: "request failed".to_string(),
                status: None,
                source: Some(Cause::Transport(err)),
            },
        }
    }

    /// Transport failure during a document write or delete
    pub(crate) fn database_transport(err: TransportError) -> Self {
        match err {
            TransportError::Connect(_) => Error::Connection(err),
            err => Error::Database {
                message: "request failed".to_string(),
                status: None,
                source: Some(Cause::Transport(err)),
            },
        }
    }

    pub(crate) fn database_response(operation: &str, response: &Response) -> Self {
        tracing::warn!(operation, status = response.status, "Document write failed");
        Error::Database {
            message: format!(
                "{}: unexpected status {} ({})",
                operation,
                response.status,
                response.describe()
            ),
            status: Some(response.status),
            source: None,
        }
    }
}
