//! Codecs and the serializer registry used for content negotiation.
//!
//! # Design
//! A [`Codec`] pairs encode/decode with the content types it understands.
//! [`Serializer`] holds the registered codecs plus a default; the default
//! drives every outgoing `accept`/`content-type` header, while incoming
//! bodies are matched by their declared content type. Values are
//! `serde_json::Value` regardless of wire format so every codec decodes into
//! the same shape.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};

pub trait Codec: Send + Sync + fmt::Debug {
    /// Short name used to select the codec (`"json"`, `"yaml"`).
    fn name(&self) -> &str;

    /// Every content type this codec decodes. The first is the one it
    /// advertises.
    fn content_types(&self) -> &[&'static str];

    fn content_type(&self) -> &str {
        self.content_types().first().copied().unwrap_or("application/octet-stream")
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    fn decode(&self, text: &str) -> Result<Value>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn content_types(&self) -> &[&'static str] {
        &[
            "application/json",
            "application/x-javascript",
            "text/javascript",
            "text/x-javascript",
            "text/x-json",
        ]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(feature = "yaml")]
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

#[cfg(feature = "yaml")]
impl Codec for YamlCodec {
    fn name(&self) -> &str {
        "yaml"
    }

    fn content_types(&self) -> &[&'static str] {
        &["text/yaml"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_saphyr::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| Error::Encode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Value> {
        serde_saphyr::from_str(text).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Built-in codecs, in registration order.
pub fn default_codecs() -> Vec<Arc<dyn Codec>> {
    #[allow(unused_mut)]
    let mut codecs: Vec<Arc<dyn Codec>> = vec![Arc::new(JsonCodec)];
    #[cfg(feature = "yaml")]
    codecs.push(Arc::new(YamlCodec));
    codecs
}

/// Registry of codecs with a configured default. Immutable once built.
#[derive(Debug, Clone)]
pub struct Serializer {
    codecs: Vec<Arc<dyn Codec>>,
    default: Arc<dyn Codec>,
}

impl Serializer {
    /// Registry over the built-in codecs, defaulting to `default` by name.
    pub fn new(default: &str) -> Result<Self> {
        Self::with_codecs(default, default_codecs())
    }

    /// Registry over a custom codec set. Fails if `default` names none of
    /// them.
    pub fn with_codecs(default: &str, codecs: Vec<Arc<dyn Codec>>) -> Result<Self> {
        let default = codecs
            .iter()
            .find(|c| c.name() == default)
            .cloned()
            .ok_or_else(|| Error::SerializerNotAvailable(default.to_string()))?;
        Ok(Self { codecs, default })
    }

    pub fn default_codec(&self) -> &Arc<dyn Codec> {
        &self.default
    }

    pub fn by_name(&self, name: &str) -> Result<&Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::SerializerNotAvailable(name.to_string()))
    }

    /// Exact match against each codec's content types. Callers strip
    /// parameters such as `; charset=utf-8` first.
    pub fn by_content_type(&self, content_type: &str) -> Result<&Arc<dyn Codec>> {
        self.codecs
            .iter()
            .find(|c| c.content_types().contains(&content_type))
            .ok_or_else(|| Error::SerializerNotAvailable(content_type.to_string()))
    }

    /// Content type advertised for outgoing requests.
    pub fn content_type(&self) -> &str {
        self.default.content_type()
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.default.encode(value)
    }

    pub fn decode(&self, text: &str) -> Result<Value> {
        self.default.decode(text)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        let json: Arc<dyn Codec> = Arc::new(JsonCodec);
        Self {
            codecs: default_codecs(),
            default: json,
        }
    }
}
