//! The API root: configuration, the resource factory, and the last-response
//! log shared by every handle descended from it.
//!
//! # Design
//! `Api` owns nothing a `Resource` doesn't: it is a root handle plus the
//! construction rules (a base URL is mandatory; transport and serializer
//! default from the other options). The [`ResponseLog`] is the one piece of
//! shared mutable state in the crate. It is written after every completed
//! request through any descendant handle, so when several threads drive
//! handles from the same root, the recorded response is whichever request
//! finished last.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::resource::Resource;
use crate::serialize::Serializer;
use crate::transport::{Credentials, Transport, UreqTransport};

pub const DEFAULT_FORMAT: &str = "json";

/// Last-write-wins record of the most recent completed request.
///
/// The whole response is kept, body included, so a caller can inspect what
/// the server sent even when decoding fell back or the result was dropped.
#[derive(Debug, Default)]
pub struct ResponseLog {
    last: RwLock<Option<HttpResponse>>,
}

impl ResponseLog {
    pub fn record(&self, response: &HttpResponse) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(response.clone());
    }

    pub fn last_response(&self) -> Option<HttpResponse> {
        self.last.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.status)
    }

    pub fn headers(&self) -> Option<Vec<(String, String)>> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.headers.clone())
    }
}

/// Entry point for one logical API connection.
#[derive(Debug, Clone)]
pub struct Api {
    root: Resource,
    log: Arc<ResponseLog>,
}

impl Api {
    /// API with every option at its default.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> ApiBuilder {
        ApiBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        self.root.base_url()
    }

    pub fn format(&self) -> &str {
        self.root.format()
    }

    /// Handle for the base URL itself.
    pub fn root(&self) -> Resource {
        self.root.clone()
    }

    /// Produce a handle bound to `base_url` that shares this API's
    /// transport, serializer and response log.
    pub fn resource(&self, base_url: impl Into<String>) -> Resource {
        self.root.with_url(base_url)
    }

    pub fn segment(&self, name: impl std::fmt::Display) -> Resource {
        self.root.segment(name)
    }

    /// See [`Resource::attr`].
    pub fn attr(&self, name: &str) -> Result<Resource> {
        self.root.attr(name)
    }

    /// Status of the most recent completed request, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.log.status_code()
    }

    pub fn headers(&self) -> Option<Vec<(String, String)>> {
        self.log.headers()
    }

    /// The most recent completed response, undecoded.
    pub fn last_response(&self) -> Option<HttpResponse> {
        self.log.last_response()
    }

    pub fn response_log(&self) -> &Arc<ResponseLog> {
        &self.log
    }
}

#[derive(Debug, Default)]
pub struct ApiBuilder {
    base_url: Option<String>,
    auth: Option<Credentials>,
    format: Option<String>,
    append_slash: Option<bool>,
    transport: Option<Arc<dyn Transport>>,
    serializer: Option<Arc<Serializer>>,
}

impl ApiBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Credentials for the default transport. Ignored when a transport is
    /// supplied.
    pub fn auth(mut self, auth: Credentials) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn append_slash(mut self, append_slash: bool) -> Self {
        self.append_slash = Some(append_slash);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn serializer(mut self, serializer: Arc<Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn build(self) -> Result<Api> {
        let ApiBuilder {
            base_url,
            auth,
            format,
            append_slash,
            transport,
            serializer,
        } = self;

        let base_url = base_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::ImproperlyConfigured("base_url".to_string()))?;
        let format = format.unwrap_or_else(|| DEFAULT_FORMAT.to_string());
        let serializer = match serializer {
            Some(serializer) => serializer,
            None => Arc::new(Serializer::new(&format)?),
        };
        let transport = transport.unwrap_or_else(|| Arc::new(UreqTransport::new(auth)));
        let log = Arc::new(ResponseLog::default());

        let root = Resource::new(
            base_url,
            format,
            append_slash.unwrap_or(true),
            transport,
            serializer,
            log.clone(),
        );
        Ok(Api { root, log })
    }
}

/// Serializable construction options, for loading an API definition from
/// a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub format: String,
    pub append_slash: bool,
    pub auth: Option<Credentials>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            format: DEFAULT_FORMAT.to_string(),
            append_slash: true,
            auth: None,
        }
    }
}

impl ApiConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn into_builder(self) -> ApiBuilder {
        let mut builder = Api::builder().format(self.format).append_slash(self.append_slash);
        if let Some(base_url) = self.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(auth) = self.auth {
            builder = builder.auth(auth);
        }
        builder
    }
}
