//! Shared test setup and request helpers

use axum::body::{Body, to_bytes};
use axum::response::Response;
use http::{Request, header};
use serde_json::Value;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

use socialauth::SESSION_COOKIE_NAME;

/// Load `.env_test` and initialize the socialauth stores once per process.
pub(crate) async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    static STORES: OnceCell<()> = OnceCell::const_new();

    ENV_INIT.call_once(|| {
        if let Err(e) = dotenvy::from_filename(".env_test") {
            eprintln!("ERROR: .env_test file not found: {e}");
            panic!("Missing .env_test file required for testing");
        }
    });

    STORES
        .get_or_init(|| async {
            if let Err(e) = socialauth::init().await {
                eprintln!("Warning: Failed to initialize socialauth: {e}");
            }
        })
        .await;
}

/// Unique address for users sharing one in-memory database.
pub(crate) fn unique_email(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}{n}{}@example.com", &random[..8])
}

/// JSON request with extra headers.
pub(crate) fn json_request(
    method: &str,
    uri: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Form post carrying the session cookie.
pub(crate) fn form_request(uri: &str, form: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub(crate) fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `name=value` of the session cookie set by `response`, if any.
pub(crate) fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|c| c.starts_with(&format!("{}=", SESSION_COOKIE_NAME.as_str())))
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}

pub(crate) async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
