//! Resource handles: URL-path state plus the request/response pipeline.
//!
//! # Design
//! A [`Resource`] is one addressable point in an API's URL space. Every
//! step that changes the address (`segment`, `id`, `attr`, rebinding
//! through [`Resource::invoke`]) returns a new handle that shares the
//! transport, serializer and response log with its parent by `Arc`; the
//! parent is never modified. Arming a verb produces a handle whose next
//! invocation performs exactly one request, and invoking it again sends the
//! request again.
//!
//! Outgoing bodies are encoded strictly with the registry's default codec.
//! Incoming bodies are decoded leniently: anything that cannot be decoded
//! comes back as [`Content::Raw`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ResponseLog;
use crate::charset;
use crate::error::{Error, HttpFailure, Result};
use crate::http::{FilePart, HttpRequest, HttpResponse, Method};
use crate::serialize::Serializer;
use crate::transport::Transport;

/// Named parameters for an invocation. `data` and `files` only apply to
/// body-carrying verbs; `query` always ends up in the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub data: Option<Value>,
    pub files: Vec<FilePart>,
    pub query: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn file(mut self, file: FilePart) -> Self {
        self.files.push(file);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }
}

/// Arguments to [`Resource::invoke`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    /// Appended as one more path segment.
    pub id: Option<String>,
    pub format: Option<String>,
    /// Replaces the base URL wholesale.
    pub url_override: Option<String>,
    pub params: Params,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn url_override(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of [`Resource::invoke`]: a rebound handle, or the decoded body
/// of the request an armed handle performed.
#[derive(Debug, Clone)]
pub enum Invocation {
    Resource(Resource),
    Content(Content),
}

impl Invocation {
    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Invocation::Resource(r) => Some(r),
            Invocation::Content(_) => None,
        }
    }

    pub fn into_content(self) -> Option<Content> {
        match self {
            Invocation::Content(c) => Some(c),
            Invocation::Resource(_) => None,
        }
    }
}

/// A successfully received response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// 204/205 and non-2xx informational or redirect statuses.
    Empty,
    Value(Value),
    /// Undecoded body: no content type, no matching codec, or a decode
    /// failure.
    Raw(Vec<u8>),
}

impl Content {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Content::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Content::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Content::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Empty => true,
            Content::Raw(raw) => raw.is_empty(),
            Content::Value(_) => false,
        }
    }
}

/// Join one path segment onto `base` with exactly one `/` between them.
/// A query string or fragment on `base` is kept after the joined path.
pub fn url_join(base: &str, segment: &str) -> String {
    let split = base.find(['?', '#']).unwrap_or(base.len());
    let (path, suffix) = base.split_at(split);
    format!(
        "{}/{}{}",
        path.trim_end_matches('/'),
        segment.trim_start_matches('/'),
        suffix
    )
}

#[derive(Clone)]
pub struct Resource {
    base_url: String,
    format: String,
    append_slash: bool,
    transport: Arc<dyn Transport>,
    serializer: Arc<Serializer>,
    log: Arc<ResponseLog>,
    pending: Option<Method>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("base_url", &self.base_url)
            .field("format", &self.format)
            .field("append_slash", &self.append_slash)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Resource {
    pub(crate) fn new(
        base_url: String,
        format: String,
        append_slash: bool,
        transport: Arc<dyn Transport>,
        serializer: Arc<Serializer>,
        log: Arc<ResponseLog>,
    ) -> Self {
        Self {
            base_url,
            format,
            append_slash,
            transport,
            serializer,
            log,
            pending: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Format name this handle was bound with. Content negotiation always
    /// uses the serializer's default codec, not this value.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn append_slash(&self) -> bool {
        self.append_slash
    }

    pub fn pending(&self) -> Option<Method> {
        self.pending
    }

    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }

    /// Absolute request URL.
    pub fn url(&self) -> String {
        let mut url = self.base_url.clone();
        if self.append_slash && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    fn rebind(&self, base_url: String) -> Resource {
        Resource {
            base_url,
            pending: None,
            ..self.clone()
        }
    }

    /// One path segment deeper.
    pub fn segment(&self, name: impl fmt::Display) -> Resource {
        self.rebind(url_join(&self.base_url, &name.to_string()))
    }

    /// Select a member of a collection, `users(42)` style.
    pub fn id(&self, id: impl fmt::Display) -> Resource {
        self.segment(id)
    }

    pub fn with_format(&self, format: impl Into<String>) -> Resource {
        Resource {
            format: format.into(),
            ..self.rebind(self.base_url.clone())
        }
    }

    /// Same transport and serializer, bound to a different absolute URL.
    pub fn with_url(&self, url: impl Into<String>) -> Resource {
        self.rebind(url.into())
    }

    /// A copy of this handle armed with `method`.
    pub fn method(&self, method: Method) -> Resource {
        Resource {
            pending: Some(method),
            ..self.clone()
        }
    }

    /// Resolve a member name: `_`-prefixed names are rejected, verb names
    /// arm the handle, anything else descends one segment.
    pub fn attr(&self, name: &str) -> Result<Resource> {
        if name.starts_with('_') {
            return Err(Error::UnknownAttribute(name.to_string()));
        }
        Ok(match Method::from_name(name) {
            Some(method) => self.method(method),
            None => self.segment(name),
        })
    }

    /// Call syntax. An armed handle performs its request. An unarmed one
    /// is rebound by `id`, `format` and `url_override`, or returned as is
    /// when none of them is set.
    pub fn invoke(&self, call: Call) -> Result<Invocation> {
        if let Some(method) = self.pending {
            return self.perform(method, call.params).map(Invocation::Content);
        }

        let Call {
            id,
            format,
            url_override,
            ..
        } = call;
        if id.is_none() && format.is_none() && url_override.is_none() {
            return Ok(Invocation::Resource(self.clone()));
        }

        let mut next = self.rebind(self.base_url.clone());
        if let Some(id) = id {
            next.base_url = url_join(&next.base_url, &id);
        }
        if let Some(format) = format {
            next.format = format;
        }
        if let Some(url) = url_override {
            next.base_url = url;
        }
        Ok(Invocation::Resource(next))
    }

    pub fn get(&self, params: Params) -> Result<Content> {
        self.perform(Method::Get, params)
    }

    pub fn head(&self, params: Params) -> Result<Content> {
        self.perform(Method::Head, params)
    }

    pub fn options(&self, params: Params) -> Result<Content> {
        self.perform(Method::Options, params)
    }

    pub fn post(&self, params: Params) -> Result<Content> {
        self.perform(Method::Post, params)
    }

    pub fn put(&self, params: Params) -> Result<Content> {
        self.perform(Method::Put, params)
    }

    pub fn patch(&self, params: Params) -> Result<Content> {
        self.perform(Method::Patch, params)
    }

    pub fn delete(&self, params: Params) -> Result<Content> {
        self.perform(Method::Delete, params)
    }

    /// Send the request, classify the status and decode the body.
    pub fn perform(&self, method: Method, params: Params) -> Result<Content> {
        let response = self.request(method, params)?;
        Ok(self.process_response(&response))
    }

    /// Send the request and classify the status, returning the raw response.
    /// 4xx and 5xx statuses become errors carrying the undecoded response.
    pub fn request(&self, method: Method, params: Params) -> Result<HttpResponse> {
        let request = self.build_request(method, params)?;
        let url = request.url.clone();

        debug!(method = %method, url = %url, "sending request");
        let response = self.transport.request(request)?;
        debug!(method = %method, url = %url, status = response.status, "received response");

        classify(url, response)
    }

    fn build_request(&self, method: Method, params: Params) -> Result<HttpRequest> {
        let Params { data, files, query } = params;
        let (data, files) = if method.has_data() {
            (data, files)
        } else {
            if data.is_some() || !files.is_empty() {
                warn!(method = %method, "ignoring body and files on a verb without a body");
            }
            (None, Vec::new())
        };

        let content_type = self.serializer.content_type().to_string();
        let mut headers = vec![("accept".to_string(), content_type.clone())];
        let mut body = None;
        let mut fields = Vec::new();

        if files.is_empty() {
            headers.push(("content-type".to_string(), content_type));
            if let Some(data) = &data {
                body = Some(self.serializer.encode(data)?);
            }
        } else if let Some(data) = data {
            fields = form_fields(data)?;
        }

        Ok(HttpRequest {
            method,
            url: self.url(),
            query,
            headers,
            body,
            fields,
            files,
        })
    }

    /// Record the response on the shared log, then decode it. Only
    /// 2xx bodies are decoded.
    pub fn process_response(&self, response: &HttpResponse) -> Content {
        self.log.record(response);
        if (200..=299).contains(&response.status) {
            self.decode_response(response)
        } else {
            Content::Empty
        }
    }

    /// Best-effort body decoding. Never fails: anything that cannot be
    /// decoded is returned as [`Content::Raw`].
    pub fn decode_response(&self, response: &HttpResponse) -> Content {
        if matches!(response.status, 204 | 205) {
            return Content::Empty;
        }

        let content_type = match response.header("content-type") {
            Some(ct) if !response.body.is_empty() => ct,
            _ => return Content::Raw(response.body.clone()),
        };
        let content_type = content_type.split(';').next().unwrap_or_default().trim();

        let Ok(codec) = self.serializer.by_content_type(content_type) else {
            return Content::Raw(response.body.clone());
        };

        let Some(text) = charset::decode_text(&response.body) else {
            debug!(content_type, "response body is not valid text, returning raw body");
            return Content::Raw(response.body.clone());
        };
        match codec.decode(&text) {
            Ok(value) => Content::Value(value),
            Err(e) => {
                debug!(content_type, error = %e, "could not decode response body, returning raw body");
                Content::Raw(response.body.clone())
            }
        }
    }

    /// GET the URL in `response`'s `location` header, forwarding `query`.
    /// Used after a create that answers with a location instead of a body.
    pub fn follow_location(&self, response: &HttpResponse, query: Vec<(String, String)>) -> Result<Content> {
        let location = response.header("location").ok_or(Error::MissingLocation)?;
        self.with_url(location).get(Params {
            query,
            ..Params::default()
        })
    }
}

fn classify(url: String, response: HttpResponse) -> Result<HttpResponse> {
    let status = response.status;
    let failure = |response| HttpFailure { status, url, response };
    match status {
        404 => Err(Error::NotFound(failure(response))),
        400..=499 => Err(Error::Client(failure(response))),
        500..=599 => Err(Error::Server(failure(response))),
        _ => Ok(response),
    }
}

/// Flatten an object into multipart text fields. Strings are sent bare,
/// nulls are skipped, everything else as JSON text.
fn form_fields(data: Value) -> Result<Vec<(String, String)>> {
    let Value::Object(map) = data else {
        return Err(Error::Encode("data sent with files must be an object".to_string()));
    };
    Ok(map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}
