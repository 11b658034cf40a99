use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::HOST, "api.test")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- documents ---

#[tokio::test]
async fn unknown_document_is_404() {
    let resp = app().oneshot(empty_request("GET", "/users/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_returns_201_with_location_and_no_body() {
    let resp = app()
        .oneshot(json_request("POST", "/users/", r#"{"name":"ada"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[http::header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("http://api.test/users/"), "{location}");
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn post_malformed_json_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/users", "{nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_missing_document_returns_404() {
    let resp = app()
        .oneshot(json_request("PATCH", "/users/ghost", r#"{"name":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn options_lists_methods() {
    let resp = app().oneshot(empty_request("OPTIONS", "/anything")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["methods"].as_array().unwrap().contains(&Value::from("PATCH")));
}

// --- diagnostics ---

#[tokio::test]
async fn echo_reflects_query_and_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo/?limit=5&sort=name")
                .header(http::header::ACCEPT, "application/json")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"a":1}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["query"]["limit"], "5");
    assert_eq!(body["query"]["sort"], "name");
    assert_eq!(body["accept"], "application/json");
    assert_eq!(body["body"], r#"{"a":1}"#);
}

#[tokio::test]
async fn status_route_answers_requested_code() {
    let resp = app().oneshot(empty_request("GET", "/status/418")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "I'm a teapot");

    let resp = app().oneshot(empty_request("DELETE", "/status/503/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// --- full lifecycle ---

#[tokio::test]
async fn document_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/notes", r#"{"title":"Walk dog"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[http::header::LOCATION].to_str().unwrap().to_string();
    let path = location.trim_start_matches("http://api.test").to_string();

    // list, one child
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/notes/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let notes = body_json(resp).await;
    assert_eq!(notes.as_array().unwrap().len(), 1);
    assert_eq!(notes[0]["title"], "Walk dog");

    // patch
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PATCH", &path, r#"{"done":true}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let patched = body_json(resp).await;
    assert_eq!(patched["title"], "Walk dog");
    assert_eq!(patched["done"], true);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &path))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &path))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // list after delete, empty but still a collection
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/notes"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await.as_array().unwrap().is_empty());
}
