//! In-memory REST server used to exercise the client over real HTTP.
//!
//! Any path is a document address. `POST` to a path creates a child document
//! with a fresh id and answers `201 Created` with a `Location` header and no
//! body. `GET` on a document returns it; `GET` on a collection returns its
//! direct children. Two fixed routes support diagnostics:
//!
//! - `/echo` reflects the method, query, negotiated headers and raw body.
//! - `/status/{code}` answers with the requested status and a JSON error body.
//!
//! Trailing slashes are ignored so clients that append them resolve to the
//! same documents.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Documents keyed by slash-separated path, plus the set of paths that have
/// received a `POST` and therefore list as (possibly empty) collections.
#[derive(Debug, Default)]
pub struct Store {
    pub documents: BTreeMap<String, Value>,
    pub collections: BTreeSet<String>,
}

impl Store {
    /// Direct children of `key`, in key order.
    pub fn children(&self, key: &str) -> Vec<Value> {
        let prefix = format!("{key}/");
        self.documents
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(_, v)| v.clone())
            .collect()
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Db::default();
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/", any(echo))
        .route("/status/{code}", any(status))
        .route("/status/{code}/", any(status))
        .fallback(documents)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn document_key(uri: &Uri) -> String {
    uri.path().trim_matches('/').to_string()
}

fn parse_body(body: &Bytes) -> Result<Value, StatusCode> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn documents(
    State(db): State<Db>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = document_key(&uri);
    let result = match method {
        Method::GET => read(&db, &key).await.map(IntoResponse::into_response),
        Method::HEAD => read(&db, &key).await.map(|_| StatusCode::OK.into_response()),
        Method::OPTIONS => Ok(Json(json!({
            "methods": ["GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE"],
        }))
        .into_response()),
        Method::POST => create(&db, &key, &headers, &body).await,
        Method::PUT => replace(&db, &key, &body).await.map(IntoResponse::into_response),
        Method::PATCH => merge(&db, &key, &body).await.map(IntoResponse::into_response),
        Method::DELETE => remove(&db, &key).await.map(IntoResponse::into_response),
        _ => Err(StatusCode::METHOD_NOT_ALLOWED),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

async fn read(db: &Db, key: &str) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    if let Some(doc) = store.documents.get(key) {
        return Ok(Json(doc.clone()));
    }
    if store.collections.contains(key) {
        return Ok(Json(Value::Array(store.children(key))));
    }
    Err(StatusCode::NOT_FOUND)
}

async fn create(db: &Db, key: &str, headers: &HeaderMap, body: &Bytes) -> Result<Response, StatusCode> {
    let mut doc = parse_body(body)?;
    let fields = doc.as_object_mut().ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let id = Uuid::new_v4();
    fields.insert("id".to_string(), Value::String(id.to_string()));

    let child = if key.is_empty() { id.to_string() } else { format!("{key}/{id}") };
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let location = format!("http://{host}/{child}");

    let mut store = db.write().await;
    store.collections.insert(key.to_string());
    store.documents.insert(child, doc);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

async fn replace(db: &Db, key: &str, body: &Bytes) -> Result<Json<Value>, StatusCode> {
    let doc = parse_body(body)?;
    db.write().await.documents.insert(key.to_string(), doc.clone());
    Ok(Json(doc))
}

async fn merge(db: &Db, key: &str, body: &Bytes) -> Result<Json<Value>, StatusCode> {
    let patch = parse_body(body)?;
    let patch = patch.as_object().ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let mut store = db.write().await;
    let doc = store.documents.get_mut(key).ok_or(StatusCode::NOT_FOUND)?;
    let fields = doc.as_object_mut().ok_or(StatusCode::CONFLICT)?;
    for (name, value) in patch {
        fields.insert(name.clone(), value.clone());
    }
    Ok(Json(doc.clone()))
}

async fn remove(db: &Db, key: &str) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .documents
        .remove(key)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn echo(
    method: Method,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "accept": header_value(header::ACCEPT),
        "content_type": header_value(header::CONTENT_TYPE),
        "authorization": header_value(header::AUTHORIZATION),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        json!({ "error": status.canonical_reason().unwrap_or("unknown") }).to_string(),
    )
        .into_response()
}
