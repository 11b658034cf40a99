//! The transport seam and the default blocking transport built on `ureq`.
//!
//! # Design
//! Resources never touch the network themselves: they hand a fully built
//! [`HttpRequest`] to a [`Transport`] and classify whatever comes back.
//! `UreqTransport` is the production implementation; tests substitute a
//! stub. Status codes are data here, never errors, so that the resource
//! layer alone decides what counts as a failure.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::{FilePart, HttpRequest, HttpResponse};

/// Blocking HTTP round-trip. Shared by every resource descended from one
/// API root, so implementations must be thread-safe.
pub trait Transport: Send + Sync + fmt::Debug {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Credential attached to every request sent by a [`UreqTransport`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer { token: token.into() }
    }

    /// Value for the `authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credentials::Basic { username, password } => {
                let raw = format!("{username}:{password}");
                format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
            }
            Credentials::Bearer { token } => format!("Bearer {token}"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
        }
    }
}

/// Default transport. Uses one `ureq::Agent` (and therefore one connection
/// pool) for its whole lifetime.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    auth: Option<Credentials>,
}

impl UreqTransport {
    pub fn new(auth: Option<Credentials>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent, auth }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").field("auth", &self.auth).finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = url_with_query(&request.url, &request.query)?;

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.auth {
            builder = builder.header("authorization", auth.header_value());
        }

        let body = if request.files.is_empty() {
            request.body
        } else {
            let boundary = format!("drowse-{}", Uuid::new_v4().simple());
            builder = builder.header("content-type", format!("multipart/form-data; boundary={boundary}"));
            Some(multipart_body(&boundary, &request.fields, &request.files))
        };

        let sent = match body {
            Some(body) => builder.body(body).map(|req| self.agent.run(req)),
            None => builder.body(()).map(|req| self.agent.run(req)),
        };
        let mut response = sent
            .map_err(|e| Error::Transport(e.to_string()))?
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn url_with_query(url: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = Url::parse(url).map_err(|e| Error::Transport(format!("invalid url {url}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Encode plain fields followed by files as `multipart/form-data`.
fn multipart_body(boundary: &str, fields: &[(String, String)], files: &[FilePart]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", escape_quoted(name)).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for file in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(&file.field),
                escape_quoted(&file.filename)
            )
            .as_bytes(),
        );
        let content_type = file.content_type.as_deref().unwrap_or("application/octet-stream");
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", escape_line_breaks(content_type)).as_bytes());
        body.extend_from_slice(&file.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Percent-escape `"`, CR and LF inside a quoted `Content-Disposition`
/// parameter, as browsers do for form field names and filenames.
fn escape_quoted(value: &str) -> String {
    escape_line_breaks(value).replace('"', "%22")
}

fn escape_line_breaks(value: &str) -> String {
    value.replace('\r', "%0D").replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_are_base64() {
        let creds = Credentials::basic("ada", "lovelace");
        assert_eq!(creds.header_value(), "Basic YWRhOmxvdmVsYWNl");
    }

    #[test]
    fn bearer_credentials() {
        assert_eq!(Credentials::bearer("t0k").header_value(), "Bearer t0k");
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", Credentials::basic("ada", "hunter2"));
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn credentials_deserialize_from_tagged_json() {
        let creds: Credentials =
            serde_json::from_str(r#"{"type":"basic","username":"u","password":"p"}"#).unwrap();
        assert_eq!(creds, Credentials::basic("u", "p"));
    }

    #[test]
    fn query_pairs_are_appended_and_escaped() {
        let query = vec![
            ("q".to_string(), "a b".to_string()),
            ("page".to_string(), "2".to_string()),
        ];
        let url = url_with_query("http://example/api/v1/users/", &query).unwrap();
        assert_eq!(url.as_str(), "http://example/api/v1/users/?q=a+b&page=2");
    }

    #[test]
    fn no_query_leaves_url_untouched() {
        let url = url_with_query("http://example/api/v1/users/", &[]).unwrap();
        assert_eq!(url.as_str(), "http://example/api/v1/users/");
    }

    #[test]
    fn invalid_url_is_transport_error() {
        assert!(matches!(url_with_query("not a url", &[]), Err(Error::Transport(_))));
    }

    #[test]
    fn multipart_layout() {
        let fields = vec![("title".to_string(), "report".to_string())];
        let files = vec![FilePart::new("upload", "a.txt", b"hello".to_vec()).with_content_type("text/plain")];
        let body = String::from_utf8(multipart_body("XYZ", &fields, &files)).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn multipart_names_are_escaped() {
        let fields = vec![("a\r\nX-Injected: 1".to_string(), "v".to_string())];
        let files = vec![FilePart::new("upload", "evil\"; name=\"admin", b"x".to_vec())
            .with_content_type("text/plain\r\nX-Other: 2")];
        let body = String::from_utf8(multipart_body("XYZ", &fields, &files)).unwrap();

        assert!(!body.contains("name=\"admin\""));
        assert!(!body.contains("\r\nX-Injected"));
        assert!(!body.contains("\r\nX-Other"));
        assert!(body.contains("name=\"a%0D%0AX-Injected: 1\""));
        assert!(body.contains("name=\"upload\"; filename=\"evil%22; name=%22admin\""));
        assert!(body.contains("Content-Type: text/plain%0D%0AX-Other: 2\r\n"));
    }
}
