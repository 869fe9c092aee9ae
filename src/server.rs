use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::{bootstrap_middleware, request_scope_middleware, session_auth_middleware};
use crate::state::AppState;

/// Full router. `/health` sits outside the bootstrap layer so liveness checks never hit
/// the secret store.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(public::health_get))
        .merge(api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.security)),
        )
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Hosted login
        .route("/api/auth/login", get(public::login_get))
        .route("/api/auth/callback", get(public::callback_get))
        .route("/api/auth/logout", get(public::logout_get))
        // Email verification
        .route("/api/verify-token", post(public::verify_token_post))
        .route("/api/resend-verification", post(public::resend_verification_post))
        // Identity provider hook
        .route("/api/hook/user", post(public::hook_user_post))
        .merge(protected_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, bootstrap_middleware))
        .layer(middleware::from_fn(request_scope_middleware))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(protected::me_get))
        .route("/api/user", get(protected::user_get))
        .route("/api/invoices", get(protected::invoices_get))
        .route_layer(middleware::from_fn_with_state(state, session_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(
        "Portal gateway listening on http://{} ({:?})",
        bind_addr,
        state.config.environment
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
