use crate::{Error, Result};
use async_trait::async_trait;
use couchdb_core::{Config, ErrorBody};
use reqwest::{Client as HttpClient, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Transport sends one request and returns the server's answer.
///
/// Any HTTP status is a successful `Response`; `TransportError` is reserved
/// for requests that got no answer at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> std::result::Result<Response, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unable to reach server: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else {
            TransportError::Request(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request is addressed by unencoded path segments relative to the server
/// root; the transport is responsible for percent-encoding them.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::Get, segments)
    }

    pub fn post(segments: &[&str]) -> Self {
        Self::new(Method::Post, segments)
    }

    pub fn put(segments: &[&str]) -> Self {
        Self::new(Method::Put, segments)
    }

    pub fn delete(segments: &[&str]) -> Self {
        Self::new(Method::Delete, segments)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path for display and logging, e.g. `/egdb/_all_docs`
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Short description of a failure body for error messages
    pub fn describe(&self) -> String {
        match ErrorBody::parse(&self.body) {
            Some(err) if !err.error.is_empty() => err.to_string(),
            _ => {
                let body = self.body.trim();
                if body.len() > 200 {
                    let end = (0..=200).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                    format!("{}...", &body[..end])
                } else {
                    body.to_string()
                }
            }
        }
    }
}

/// Client identifier sent when the configuration does not override it
pub fn default_user_agent() -> String {
    format!(
        "{}/{} reqwest/0.12",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// HTTP transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self> {
        Self::from_config(&Config::new(url))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = parse_base_url(&config.url)?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(default_user_agent);
        let mut builder = HttpClient::builder().user_agent(user_agent);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if config.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Use a preconfigured reqwest client (proxies, default headers, ...)
    pub fn with_client(url: &str, client: HttpClient) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(url)?,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &Request) -> Url {
        let mut url = self.base_url.clone();
        if !request.segments.is_empty() {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(&request.segments);
            }
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(Error::Configuration("a server URL is required".to_string()));
    }
    let url = Url::parse(raw)
        .map_err(|e| Error::Configuration(format!("invalid server URL {:?}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::Configuration(format!(
            "server URL {:?} cannot be used as a base address",
            raw
        )));
    }
    Ok(url)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let url = self.url_for(&request);
        tracing::debug!(method = %request.method, path = %request.path(), "Sending request");

        let mut builder = self.client.request(request.method.into(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(method = %request.method, path = %request.path(), status, "Received response");

        Ok(Response { status, body })
    }
}
