use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};

use crate::error::{ApiError, ErrorVerbosityProvider, MethodNotAllowedError};

/// Replaces axum's empty `405` with an [`ApiError`] body.
///
/// Reached when a book route exists for the path but not for the method, e.g. `POST /books/{id}`.
pub async fn method_not_allowed<S: ErrorVerbosityProvider>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;

    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return Ok(response);
    }

    tracing::warn!(%method, %path, "Method not allowed");

    Err(MethodNotAllowedError::new(state.error_verbosity()).into())
}
