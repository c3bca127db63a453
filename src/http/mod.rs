mod pages;
mod routes;
mod types;

use crate::http::routes::*;
use crate::http::types::HttpError;
use crate::relay::MessagingAdapter;
use crate::session::SessionState;
use crate::TracingReloadHandle;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::log::error;

#[derive(Clone)]
pub struct HttpState {
    pub session: Arc<SessionState>,
    pub adapter: MessagingAdapter,
    pub tracing_reload: TracingReloadHandle,
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!("HTTP handler panicked: {detail}");

    HttpError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Internal server error".to_string(),
    }
    .into_response()
}

fn with_layers<S>(router: axum::Router<S>) -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        ))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

pub fn create_app(
    session: Arc<SessionState>,
    adapter: MessagingAdapter,
    tracing_reload: TracingReloadHandle,
) -> axum::Router {
    let router = axum::Router::new()
        .route("/", get(status))
        .route("/ping", get(ping))
        .route("/setup", get(setup_form).post(setup_submit))
        .route("/sys/version", get(sys_version))
        .route("/sys/set-log-level", post(sys_set_log_level))
        .fallback(not_found);

    let state = HttpState {
        session,
        adapter,
        tracing_reload,
    };
    with_layers(router).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{StubCompletion, StubEngine};
    use crate::session::Credential;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tracing_subscriber::{reload, EnvFilter};

    struct TestApp {
        router: axum::Router,
        session: Arc<SessionState>,
        engine: Arc<StubEngine>,
    }
    impl TestApp {
        fn new(engine: StubEngine, key: Option<&str>) -> Self {
            let session = Arc::new(SessionState::new(
                key.map(|k| Credential::parse(k).unwrap()),
            ));
            let engine = Arc::new(engine);
            let adapter = MessagingAdapter::new(
                Arc::clone(&session),
                Arc::clone(&engine) as Arc<dyn crate::relay::engine::ProtocolEngine>,
                Arc::new(StubCompletion::new("olá!")),
            );
            let (_layer, tracing_reload): (_, TracingReloadHandle) =
                reload::Layer::new(EnvFilter::new("info"));

            Self {
                router: create_app(Arc::clone(&session), adapter, tracing_reload),
                session,
                engine,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, String::from_utf8(body.to_vec()).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, String) {
            self.send(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn post_form(&self, body: &str) -> (StatusCode, String) {
            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri("/setup")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            let (status, body) = self
                .send(
                    Request::builder()
                        .method(Method::POST)
                        .uri(uri)
                        .header(CONTENT_TYPE, "application/json")
                        .body(Body::from(body.to_string()))
                        .unwrap(),
                )
                .await;
            (status, serde_json::from_str(&body).unwrap())
        }

        async fn stored_key(&self) -> Option<String> {
            self.session
                .credential()
                .await
                .map(|credential| credential.expose().to_string())
        }
    }

    #[tokio::test]
    async fn test_ping_in_any_state() {
        let app = TestApp::new(StubEngine::default(), None);
        assert_eq!(app.get("/ping").await, (StatusCode::OK, "ok".to_string()));

        app.post_form("key=AIzaTestKey").await;
        assert_eq!(app.get("/ping").await, (StatusCode::OK, "ok".to_string()));
    }

    #[tokio::test]
    async fn test_status_reflects_relay_state() {
        let app = TestApp::new(StubEngine::default(), None);
        let (status, body) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("waiting for key"));
        assert!(body.contains("API key: missing"));

        app.post_form("key=AIzaTestKey").await;
        let (_, body) = app.get("/").await;
        assert!(body.contains("Status: online"));
        assert!(body.contains("API key: configured"));
    }

    #[tokio::test]
    async fn test_setup_form_and_version_header() {
        let app = TestApp::new(StubEngine::default(), None);
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-version").unwrap(), crate::VERSION);
        let content_type = headers.get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let app = TestApp::new(StubEngine::default(), None);

        let (status, body) = app.post_form("key=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains(r#"class="err""#));

        let (status, _) = app.post_form("key=%20%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(app.stored_key().await, None);
        assert_eq!(app.engine.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_malformed_key_keeps_previous() {
        let app = TestApp::new(StubEngine::default(), Some("AIzaOriginal"));

        let (status, body) = app.post_json("/setup", json!({ "key": "not-a-key" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(app.stored_key().await.as_deref(), Some("AIzaOriginal"));
    }

    #[tokio::test]
    async fn test_non_string_key_is_rejected() {
        let app = TestApp::new(StubEngine::default(), Some("AIzaOriginal"));

        let (status, body) = app.post_json("/setup", json!({ "key": 123 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(app.stored_key().await.as_deref(), Some("AIzaOriginal"));
        assert_eq!(app.engine.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_valid_key_starts_relay_once() {
        let app = TestApp::new(StubEngine::default(), None);

        let (status, body) = app.post_form("key=AIzaFirstKey").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"class="ok""#));
        assert_eq!(app.engine.connect_attempts(), 1);
        assert!(app.session.is_relay_running());

        let (status, _) = app.post_form("key=AIzaSecondKey").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.engine.connect_attempts(), 1);
        assert_eq!(app.stored_key().await.as_deref(), Some("AIzaSecondKey"));
    }

    #[tokio::test]
    async fn test_json_submission() {
        let app = TestApp::new(StubEngine::default(), None);

        let (status, body) = app
            .post_json("/setup", json!({ "GEMINI_API_KEY": "AIzaJsonKey" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"]["status"], "started");
        assert_eq!(app.stored_key().await.as_deref(), Some("AIzaJsonKey"));

        let (_, body) = app
            .post_json("/setup", json!({ "key": "AIzaRotated" }))
            .await;
        assert_eq!(body["response"]["status"], "updated");
    }

    #[tokio::test]
    async fn test_engine_failure_is_server_error() {
        let app = TestApp::new(StubEngine::failing_once(), None);

        let (status, body) = app
            .post_json("/setup", json!({ "key": "AIzaTestKey" }))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(!app.session.is_relay_running());

        // Key stays stored, a resubmission retries the start.
        assert_eq!(app.stored_key().await.as_deref(), Some("AIzaTestKey"));
        let (status, _) = app
            .post_json("/setup", json!({ "key": "AIzaTestKey" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.engine.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_invalid_log_level() {
        let app = TestApp::new(StubEngine::default(), None);
        let (status, body) = app
            .post_json("/sys/set-log-level", json!({ "level": "relay=loud" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new(StubEngine::default(), None);
        let (status, _) = app.get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let router = with_layers(axum::Router::new().route(
            "/boom",
            get(|| async {
                if true {
                    panic!("boom");
                }
                "unreachable"
            }),
        ));

        let response = router
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key("x-version"));
    }
}
