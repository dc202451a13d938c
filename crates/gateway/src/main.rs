//! Portfolio Assistant API Gateway
//!
//! HTTP entry point for the chat assistant.
//! Handles:
//! - Request parsing and validation
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use portfolio_common::{
    config::{AppConfig, ObservabilityConfig},
    errors::AppError,
    metrics, Assistant,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub assistant: Arc<Assistant>,
    pub metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting Portfolio Assistant Gateway v{}",
        portfolio_common::VERSION
    );

    // Initialize metrics
    let metrics_handle = PrometheusBuilder::new()
        .set_buckets(metrics::UPSTREAM_BUCKETS)?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    metrics::register_metrics();

    // Completion settings are mandatory; fail before binding
    let assistant = Assistant::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize assistant");
        e
    })?;
    info!(
        retrieval_enabled = assistant.retrieval_enabled(),
        "Assistant ready"
    );

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        assistant: Arc::new(assistant),
        metrics: metrics_handle,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let stop = stop.clone();
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    // In-flight requests get a bounded grace period
    stop.notify_one();
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any);

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors_layer)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(CatchPanicLayer::custom(panic_response));

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))

        // Chat endpoint
        .route("/api/chat", post(handlers::chat::chat))
        .layer(middleware)
        .with_state(state)
}

/// Render a panic inside a handler as a 500 error body
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Internal {
        message: "unexpected failure while handling request".to_string(),
    }
    .into_response()
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use portfolio_common::{
        completion::{CompletionBackend, CompletionInvoker, CompletionRequest},
        context::ContextBuilder,
        prompt::PromptComposer,
        Result,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct FixedCompletion(std::result::Result<Value, String>);

    /// Answers only after the given delay
    struct SlowCompletion(std::time::Duration);

    #[async_trait]
    impl CompletionBackend for FixedCompletion {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Value> {
            self.0
                .clone()
                .map_err(|message| AppError::Completion { message })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[async_trait]
    impl CompletionBackend for SlowCompletion {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Value> {
            tokio::time::sleep(self.0).await;
            Ok(json!({"choices": [{"message": {"content": "too late"}}]}))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn app_with(backend: Arc<dyn CompletionBackend>, config: AppConfig) -> Router {
        let assistant = Assistant::new(
            None,
            CompletionInvoker::new(backend, 256),
            ContextBuilder::default(),
            PromptComposer::default(),
        );
        let state = AppState {
            config: Arc::new(config),
            assistant: Arc::new(assistant),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
        };
        create_router(state)
    }

    fn app(response: std::result::Result<Value, String>) -> Router {
        app_with(Arc::new(FixedCompletion(response)), AppConfig::default())
    }

    fn replying() -> Router {
        app(Ok(json!({"choices": [{"message": {"content": "Hi there"}}]})))
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_chat_reply() {
        let (status, body) = send(replying(), post_chat(r#"{"message": "Hello"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"reply": "Hi there"}));
    }

    #[tokio::test]
    async fn test_chat_invalid_json() {
        let (status, body) = send(replying(), post_chat("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FORMAT");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON: "));
    }

    #[tokio::test]
    async fn test_chat_missing_message() {
        let (status, body) = send(replying(), post_chat(r#"{"conversation_id": "c-1"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing user message");
        assert_eq!(body["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_chat_error_reply_is_ok_status() {
        let app = app(Err("Request failed: connection refused".into()));
        let (status, body) = send(app, post_chat(r#"{"message": "Hello"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "Request failed: connection refused"}));
    }

    #[tokio::test]
    async fn test_chat_without_content_type() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .body(Body::from(r#"{"message": "Hello"}"#))
            .unwrap();
        let (status, body) = send(replying(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "Hi there");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = replying()
            .oneshot(post_chat(r#"{"message": "Hello"}"#))
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(replying(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy"}));

        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let (status, body) = send(replying(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["retrieval"], "disabled");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = replying().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 1;
        let app = app_with(
            Arc::new(SlowCompletion(std::time::Duration::from_secs(5))),
            config,
        );

        let response = app.oneshot(post_chat(r#"{"message": "Hello"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_panic_response_is_internal_error() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_route() {
        let request = Request::builder().uri("/api/unknown").body(Body::empty()).unwrap();
        let response = tokio_test::block_on(replying().oneshot(request)).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
