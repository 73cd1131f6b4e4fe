use std::{sync::Arc, time::Duration};

use axum::{
    async_trait,
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{
    book::{Attributes, Book},
    config::{BookPolicy, CorsConfig, CreatePolicy, ServerConfig},
    error::ErrorVerbosity,
    middleware::cors::CorsHeaders,
    server::app,
    state::ApiState,
    store::{BookStream, MemoryStore, PutMode, RecordStore, StoreError},
};

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn state_with(
    store: Arc<dyn RecordStore>,
    policy: BookPolicy,
    verbosity: ErrorVerbosity,
) -> ApiState {
    let cors = CorsHeaders::from_config(&CorsConfig::default()).unwrap();

    ApiState::new(verbosity, store, policy, cors)
}

fn router_with(policy: BookPolicy) -> Router {
    let state = state_with(
        Arc::new(MemoryStore::new()),
        policy,
        ErrorVerbosity::Full,
    );

    app(state, Duration::from_secs(5), false)
}

fn router() -> Router {
    router_with(BookPolicy::default())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
    let mut request = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = match bytes.is_empty() {
        true => Value::Null,
        false => serde_json::from_slice(&bytes).unwrap(),
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

fn assert_any_origin(response: &TestResponse) {
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*",
        "Missing allow origin header for {}",
        response.status
    );
}

#[tokio::test]
async fn example_config_is_valid() {
    ServerConfig::from_config_file("config.example.yaml")
        .await
        .expect("Example config is not parsable");
}

#[tokio::test]
async fn book_lifecycle() {
    let app = router();

    let created = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"A"}"#)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body, json!({"isbn": "111", "title": "A"}));
    assert_eq!(created.headers[header::LOCATION], "/books/111");

    let fetched = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, json!({"isbn": "111", "title": "A"}));

    let updated = send(&app, Method::PATCH, "/books/111", Some(r#"{"title":"B"}"#)).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body, json!({"isbn": "111", "title": "B"}));

    let deleted = send(&app, Method::DELETE, "/books/111", None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(deleted.body, Value::Null);

    let missing = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "Book not found");
}

#[tokio::test]
async fn location_percent_encodes_isbn() {
    let app = router();

    let created = send(&app, Method::POST, "/books", Some(r#"{"isbn":"a/b ü"}"#)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.headers[header::LOCATION], "/books/a%2Fb%20%C3%BC");

    let fetched = send(&app, Method::GET, "/books/a%2Fb%20%C3%BC", None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, json!({"isbn": "a/b ü"}));
}

async fn assert_large_integer_round_trips(app: &Router) {
    let created = send(
        app,
        Method::POST,
        "/books",
        Some(r#"{"isbn":"111","copies":12345678901234567891}"#),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(
        created.body,
        json!({"isbn": "111", "copies": 12345678901234567891u64})
    );

    let fetched = send(app, Method::GET, "/books/111", None).await;
    assert_eq!(
        fetched.body,
        json!({"isbn": "111", "copies": 12345678901234567891u64})
    );
}

#[tokio::test]
async fn integers_above_i64_keep_their_value() {
    assert_large_integer_round_trips(&router()).await;
}

#[tokio::test]
async fn null_attribute_is_rejected() {
    let app = router();

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":null}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_method_on_book_answers_json_error() {
    let app = router();

    let response = send(&app, Method::POST, "/books/111", Some(r#"{"title":"A"}"#)).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body["message"], "Method not allowed");
    assert_any_origin(&response);
}

#[tokio::test]
async fn create_without_isbn_is_rejected() {
    let app = router();

    let response = send(&app, Method::POST, "/books", Some("{}")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error_type"], "Body");

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":""}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error_type"], "Validation");

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":111}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_rejected_before_store_access() {
    let app = router();

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]["body_expected_schema"].is_string());

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","tags":["a"]}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let listed = send(&app, Method::GET, "/books", None).await;
    assert_eq!(listed.body, json!([]));
}

#[tokio::test]
async fn duplicate_create_conflicts_and_keeps_existing_book() {
    let app = router();

    send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"A"}"#)).await;

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"B"}"#)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["message"], "Book already exists");

    let fetched = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(fetched.body, json!({"isbn": "111", "title": "A"}));
}

#[tokio::test]
async fn overwrite_policy_replaces_book() {
    let app = router_with(BookPolicy {
        create: CreatePolicy::Overwrite,
        ..BookPolicy::default()
    });

    send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"A","author":"X"}"#)).await;

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"B"}"#)).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let fetched = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(fetched.body, json!({"isbn": "111", "title": "B"}));
}

#[tokio::test]
async fn concurrent_creates_of_one_isbn_admit_exactly_one() {
    let app = router();

    let responses = futures::future::join_all((0..16).map(|i| {
        let app = app.clone();
        async move {
            let body = format!(r#"{{"isbn":"111","writer":{i}}}"#);
            send(&app, Method::POST, "/books", Some(body.as_str())).await.status
        }
    }))
    .await;

    let created = responses
        .iter()
        .filter(|status| **status == StatusCode::CREATED)
        .count();
    let conflicts = responses
        .iter()
        .filter(|status| **status == StatusCode::CONFLICT)
        .count();

    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test]
async fn update_keeps_unspecified_attributes() {
    let app = router();

    send(
        &app,
        Method::POST,
        "/books",
        Some(r#"{"isbn":"111","title":"A","author":"X","pages":100}"#),
    )
    .await;

    let response = send(&app, Method::PATCH, "/books/111", Some(r#"{"pages":120,"isbn":"111"}"#)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"isbn": "111", "title": "A", "author": "X", "pages": 120})
    );

    let response = send(&app, Method::PUT, "/books/111", Some(r#"{"title":"C"}"#)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "C");
    assert_eq!(response.body["author"], "X");
}

#[tokio::test]
async fn update_errors() {
    let app = router();

    let response = send(&app, Method::PATCH, "/books/404", Some(r#"{"title":"B"}"#)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"A"}"#)).await;

    let response = send(&app, Method::PATCH, "/books/111", Some(r#"{"isbn":"222"}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["book_error_type"], json!({"IsbnMismatch": {}}));

    let response = send(&app, Method::PATCH, "/books/111", Some("not json")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let fetched = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(fetched.body, json!({"isbn": "111", "title": "A"}));
}

#[tokio::test]
async fn delete_missing_book_is_not_found() {
    let app = router();

    let response = send(&app, Method::DELETE, "/books/111", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_returns_exactly_the_remaining_books() {
    let app = router();

    assert_eq!(send(&app, Method::GET, "/books", None).await.body, json!([]));

    for isbn in ["3", "1", "2"] {
        let body = format!(r#"{{"isbn":"{isbn}"}}"#);
        send(&app, Method::POST, "/books", Some(body.as_str())).await;
    }
    send(&app, Method::DELETE, "/books/2", None).await;

    let response = send(&app, Method::GET, "/books", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!([{"isbn": "1"}, {"isbn": "3"}]));
}

#[tokio::test]
async fn preflight_answers_with_cors_headers() {
    let app = router();

    for uri in ["/books", "/books/111"] {
        let response = send(&app, Method::OPTIONS, uri, None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_any_origin(&response);
        assert_eq!(
            response.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "OPTIONS,GET,PUT,POST,DELETE"
        );
        assert_eq!(
            response.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "false"
        );
        assert!(response
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }

    // A preflight never creates anything.
    assert_eq!(send(&app, Method::GET, "/books", None).await.body, json!([]));
}

#[tokio::test]
async fn every_response_allows_any_origin() {
    let app = router();

    let responses = [
        send(&app, Method::POST, "/books", Some(r#"{"isbn":"111"}"#)).await,
        send(&app, Method::POST, "/books", Some(r#"{"isbn":"111"}"#)).await,
        send(&app, Method::POST, "/books", Some("{")).await,
        send(&app, Method::GET, "/books", None).await,
        send(&app, Method::GET, "/books/111", None).await,
        send(&app, Method::GET, "/books/999", None).await,
        send(&app, Method::DELETE, "/books/111", None).await,
        send(&app, Method::POST, "/books/111", Some("{}")).await,
        send(&app, Method::GET, "/nowhere", None).await,
    ];

    for response in &responses {
        assert_any_origin(response);
    }

    assert_eq!(responses[7].status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(responses[8].status, StatusCode::NOT_FOUND);
    assert_eq!(
        responses[8].body["message"],
        "The requested resource was not found"
    );
}

#[tokio::test]
async fn strict_isbn_policy() {
    let app = router_with(BookPolicy {
        strict_isbn: true,
        ..BookPolicy::default()
    });

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111"}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error_type"], "Validation");

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"9780316769488"}"#)).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = send(&app, Method::GET, "/books/978-0316769488", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(&app, Method::GET, "/books/9780316769488", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn release_date_policy() {
    let app = router_with(BookPolicy {
        validate_release_date: true,
        ..BookPolicy::default()
    });

    let response = send(
        &app,
        Method::POST,
        "/books",
        Some(r#"{"isbn":"111","release_date":"16.07.1951"}"#),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::POST,
        "/books",
        Some(r#"{"isbn":"111","release_date":"1951-07-16"}"#),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = send(&app, Method::PATCH, "/books/111", Some(r#"{"release_date":1951}"#)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_store() {
    let app = router();

    let response = send(&app, Method::GET, "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"status": "ok", "store": "memory"}));
}

struct UnavailableStore;

#[async_trait]
impl RecordStore for UnavailableStore {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn put(&self, _book: Book, _mode: PutMode) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused by 10.0.0.7".into()))
    }

    async fn get(&self, _isbn: &str) -> Result<Book, StoreError> {
        Err(StoreError::Unavailable("connection refused by 10.0.0.7".into()))
    }

    async fn scan(&self) -> Result<BookStream, StoreError> {
        Err(StoreError::Backend("table missing".into()))
    }

    async fn update(&self, _isbn: &str, _attributes: Attributes) -> Result<Book, StoreError> {
        Err(StoreError::Unavailable("connection refused by 10.0.0.7".into()))
    }

    async fn delete(&self, _isbn: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused by 10.0.0.7".into()))
    }
}

#[tokio::test]
async fn store_failures_do_not_leak_details() {
    let state = state_with(
        Arc::new(UnavailableStore),
        BookPolicy::default(),
        ErrorVerbosity::Message,
    );
    let app = app(state, Duration::from_secs(5), false);

    let response = send(&app, Method::GET, "/books/111", None).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.body,
        json!({"message": "The service is temporarily unavailable"})
    );
    assert_any_origin(&response);

    let response = send(&app, Method::GET, "/books", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"message": "An internal server error has occurred"})
    );
}

#[tokio::test]
async fn sqlite_backed_router() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books.db").to_string_lossy().to_string();
    let store = crate::store::SqliteStore::open(&path, 2).await.unwrap();

    let state = state_with(Arc::new(store), BookPolicy::default(), ErrorVerbosity::Full);
    let app = app(state, Duration::from_secs(5), true);

    let response = send(&app, Method::POST, "/books", Some(r#"{"isbn":"111","title":"A"}"#)).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = send(&app, Method::PATCH, "/books/111", Some(r#"{"author":"X"}"#)).await;
    assert_eq!(response.body, json!({"isbn": "111", "title": "A", "author": "X"}));

    let response = send(&app, Method::GET, "/books", None).await;
    assert_eq!(response.body, json!([{"isbn": "111", "title": "A", "author": "X"}]));
}

#[tokio::test]
async fn sqlite_backed_router_keeps_large_integers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books.db").to_string_lossy().to_string();
    let store = crate::store::SqliteStore::open(&path, 2).await.unwrap();

    let state = state_with(Arc::new(store), BookPolicy::default(), ErrorVerbosity::Full);
    let app = app(state, Duration::from_secs(5), false);

    assert_large_integer_round_trips(&app).await;
}
