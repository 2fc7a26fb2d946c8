//! Shared-secret API key authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shared::error::{AppError, ErrorCode};

use crate::state::AppState;

/// Middleware that requires the shared API key on every request.
///
/// The key is read from `X-API-Key`, falling back to the lowercase
/// `api_key` header for compatibility with older clients.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let provided = headers
        .get("x-api-key")
        .or_else(|| headers.get("api_key"))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match provided {
        None => Err(AppError::new(ErrorCode::ApiKeyMissing)),
        Some(key) if key != state.api_key => Err(AppError::new(ErrorCode::ApiKeyInvalid)),
        Some(_) => Ok(next.run(request).await),
    }
}
