use axum::extract::State;

use crate::{
    error::{ApiError, ErrorVerbosityProvider},
    extractor::path::ApiPath,
    state::ApiState,
};

use super::BookResponse;

#[tracing::instrument(name = "get_book", skip_all)]
pub async fn get_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
) -> Result<BookResponse, ApiError> {
    super::validate_isbn(&state, &isbn)?;

    let book = state
        .store()
        .get(&isbn)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    tracing::debug!(%isbn, "Found");

    Ok(BookResponse(book))
}
