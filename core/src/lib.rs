//! Blocking REST client that addresses an API as a chain of resources.
//!
//! # Overview
//! An [`Api`] is bound to a base URL. Every [`Resource`] reached from it is
//! one URL deeper (`api.segment("users").id(1).segment("comments")`), and
//! a verb turns the handle into a request:
//!
//! ```no_run
//! use drowse::{Api, Params};
//!
//! # fn main() -> drowse::Result<()> {
//! let api = Api::new("http://example/api/v1")?;
//! let comments = api.segment("users").id(1).segment("comments").get(Params::new())?;
//! println!("{:?} -> {:?}", api.status_code(), comments.as_value());
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Handles are values. Descending or rebinding never mutates the parent;
//!   the transport, serializer and response log are shared by `Arc`.
//! - Outgoing bodies use the serializer's default codec and fail loudly.
//!   Incoming bodies are decoded by their declared content type and fall
//!   back to the raw bytes when that is impossible.
//! - 4xx/5xx responses become typed errors; 404 has its own variant.
//! - The network sits behind the [`Transport`] trait. [`UreqTransport`] is
//!   the default.

mod charset;

pub mod api;
pub mod error;
pub mod http;
pub mod resource;
pub mod serialize;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{Api, ApiBuilder, ApiConfig, ResponseLog};
pub use error::{Error, HttpFailure, Result};
pub use http::{FilePart, HttpRequest, HttpResponse, Method};
pub use resource::{url_join, Call, Content, Invocation, Params, Resource};
pub use serialize::{Codec, JsonCodec, Serializer};
#[cfg(feature = "yaml")]
pub use serialize::YamlCodec;
pub use transport::{Credentials, Transport, UreqTransport};
