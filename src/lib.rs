pub mod accounts;
pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod db;
pub mod error;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use accounts::AccountService;
use api::create_api_router;
use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    routing::get,
};
use clock::Clock;
use db::Database;
use jwt::{JwtCodec, JwtSettings};
use rand::TryRngCore;
use rand::rngs::OsRng;
use session::{SessionManager, SessionSettings};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{Span, info_span};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Access token signing and claim settings
    pub jwt: JwtSettings,
    /// Refresh token lifetime and per-user session cap
    pub sessions: SessionSettings,
    /// Upper bound on a single request, including any open transaction
    pub request_timeout: Duration,
    /// Time source for token timestamps
    pub clock: Clock,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtCodec::new(&config.jwt, config.clock.clone()));
    let sessions = SessionManager::new(
        config.db.clone(),
        jwt,
        &config.sessions,
        config.clock.clone(),
    );
    let accounts = AccountService::new(config.db.clone());

    let api_router = create_api_router(config.db.clone(), accounts, sessions);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api/v1", api_router)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    request_id.clone(),
                    |_req: &_| new_request_id(),
                ))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(timeout),
        )
}

/// 16 random bytes, hex-encoded.
fn new_request_id() -> Option<HeaderValue> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes).ok()?;
    HeaderValue::from_str(&hex::encode(bytes)).ok()
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
