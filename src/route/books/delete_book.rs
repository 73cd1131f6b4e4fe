use axum::{extract::State, http::StatusCode};

use crate::{
    error::{ApiError, ErrorVerbosityProvider},
    extractor::path::ApiPath,
    state::ApiState,
};

#[tracing::instrument(name = "delete_book", skip_all)]
pub async fn delete_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    super::validate_isbn(&state, &isbn)?;

    state
        .store()
        .delete(&isbn)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    tracing::info!(%isbn, "Deleted");

    Ok(StatusCode::NO_CONTENT)
}
