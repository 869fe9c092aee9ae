use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::RequestScope;
use crate::error::ApiError;
use crate::state::AppState;

/// Makes sure the secret bundle is in live configuration before any handler reads it
pub async fn bootstrap_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.secrets.ensure_environment_initialized(&state.live).await?;
    Ok(next.run(request).await)
}

/// Installs a fresh `RequestScope` so management-token lookups are shared within one request
pub async fn request_scope_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestScope::default());
    next.run(request).await
}
