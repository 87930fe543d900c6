use crate::transport::{HttpTransport, Request, Response, Transport};
use crate::{Cause, Database, Error, Result};
use couchdb_core::{
    user_document_id, Config, DocumentBody, ServerInfo, UserDocument, WriteResponse,
    USERS_DATABASE,
};
use std::fmt;
use std::sync::Arc;

/// Connection options for [`Server::connect`].
///
/// Exactly one of `url` or `transport` must be set.
#[derive(Default)]
pub struct ServerOptions {
    url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

/// Server-level operations: version, database listing and selection, users
#[derive(Clone)]
pub struct Server {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// Build a server handle. No request is sent; an unreachable server
    /// surfaces as [`Error::Connection`] on the first call.
    pub fn connect(options: ServerOptions) -> Result<Self> {
        match (options.url, options.transport) {
            (Some(url), None) => Self::from_url(&url),
            (None, Some(transport)) => Ok(Self::with_transport(transport)),
            (Some(_), Some(_)) => Err(Error::Configuration(
                "options must contain either a url or a transport, not both".to_string(),
            )),
            (None, None) => Err(Error::Configuration(
                "options must contain either a url or a transport".to_string(),
            )),
        }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        Self::from_config(&Config::new(url))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        tracing::debug!(url = %transport.base_url(), "Server configured");
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The shared transport, for requests this library does not cover
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn send(&self, request: Request) -> Result<Response> {
        self.transport
            .send(request)
            .await
            .map_err(Error::server_transport)
    }

    /// Ask the server what version it is running, e.g. "3.3.3"
    #[tracing::instrument(skip(self))]
    pub async fn version(&self) -> Result<String> {
        let response = self.send(Request::get(&[])).await?;
        if response.status != 200 {
            return Err(Error::unexpected_response("version", &response));
        }

        let info: ServerInfo = response.json().map_err(Error::invalid_json)?;
        Ok(info
            .version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let response = self.send(Request::get(&["_all_dbs"])).await?;
        if response.status != 200 {
            return Err(Error::unexpected_response("list databases", &response));
        }

        response.json().map_err(Error::invalid_json)
    }

    /// Select a database, optionally creating it when it does not exist
    #[tracing::instrument(skip(self))]
    pub async fn use_database(&self, name: &str, create_if_missing: bool) -> Result<Database> {
        if name.is_empty() {
            return Err(Error::Configuration(
                "a database name is required".to_string(),
            ));
        }

        let response = self.send(Request::get(&[name])).await?;
        let exists = match response.status {
            200 => true,
            400..=499 if create_if_missing => self.create_database(name).await?,
            400..=499 => false,
            _ => return Err(Error::unexpected_response("use database", &response)),
        };

        if !exists {
            return Err(Error::server(
                format!(
                    "database {:?} doesn't exist, pass create_if_missing to create it",
                    name
                ),
                Some(response.status),
            ));
        }

        Ok(Database::new(self.transport.clone(), name))
    }

    async fn create_database(&self, name: &str) -> Result<bool> {
        tracing::info!(db = %name, "Creating database");
        let response = self.send(Request::put(&[name])).await?;
        match response.status {
            201 => Ok(true),
            412 => {
                tracing::debug!(db = %name, "Database was created concurrently");
                Ok(true)
            }
            _ => Err(Error::unexpected_response("create database", &response)),
        }
    }

    /// Create a user and return the new user document's revision
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(&self, username: &str, password: &str, roles: &[&str]) -> Result<String> {
        let request = self.user_request(username, password, roles)?;
        let response = self.send(request).await?;
        match response.status {
            201 | 202 => read_revision(&response),
            409 => Err(Error::server(
                format!("user {:?} already exists", username),
                Some(409),
            )),
            _ => Err(Error::unexpected_response("create user", &response)),
        }
    }

    /// Replace a user's password and roles. Without a revision, the current
    /// one is fetched first.
    #[tracing::instrument(skip(self, password))]
    pub async fn update_user(
        &self,
        username: &str,
        password: &str,
        revision: Option<&str>,
        roles: &[&str],
    ) -> Result<String> {
        let revision = match revision {
            Some(rev) => rev.to_string(),
            None => self.user_revision(username).await?,
        };

        let request = self
            .user_request(username, password, roles)?
            .header("If-Match", revision);
        let response = self.send(request).await?;
        match response.status {
            201 | 202 => read_revision(&response),
            409 => Err(Error::server(
                format!("revision mismatch updating user {:?}", username),
                Some(409),
            )),
            _ => Err(Error::unexpected_response("update user", &response)),
        }
    }

    fn user_request(&self, username: &str, password: &str, roles: &[&str]) -> Result<Request> {
        if username.is_empty() {
            return Err(Error::Configuration("a username is required".to_string()));
        }

        let user = UserDocument::new(
            username,
            password,
            roles.iter().map(|r| r.to_string()).collect(),
        );
        let body = serde_json::to_value(&user).map_err(|e| Error::Server {
            message: "failed to encode user document".to_string(),
            status: None,
            source: Some(Cause::Json(e)),
        })?;
        Ok(Request::put(&[USERS_DATABASE, user.id.as_str()]).json(body))
    }

    async fn user_revision(&self, username: &str) -> Result<String> {
        let id = user_document_id(username);
        let response = self.send(Request::get(&[USERS_DATABASE, id.as_str()])).await?;
        if response.status != 200 {
            return Err(Error::server(
                format!(
                    "user {:?} not found or inaccessible ({})",
                    username,
                    response.describe()
                ),
                Some(response.status),
            ));
        }

        let user: DocumentBody = response.json().map_err(Error::invalid_json)?;
        user.revision
            .ok_or_else(|| Error::server("user document has no revision", Some(response.status)))
    }
}

fn read_revision(response: &Response) -> Result<String> {
    let written: WriteResponse = response.json().map_err(Error::invalid_json)?;
    Ok(written.rev)
}
