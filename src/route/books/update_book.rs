use axum::extract::State;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{
    book::{AttributeValue, Attributes, ISBN},
    error::{ApiError, BookError, BookErrorType, ErrorVerbosityProvider},
    extractor::{json::ApiJson, path::ApiPath},
    state::ApiState,
};

use super::BookResponse;

/// Attributes to merge into the stored book.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UpdateBookRequest {
    pub attributes: Attributes,
}

/// Merges the request attributes into the book. Attributes not named in the request are kept.
#[tracing::instrument(name = "update_book", skip_all)]
pub async fn update_book(
    State(state): State<ApiState>,
    ApiPath(isbn): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateBookRequest>,
) -> Result<BookResponse, ApiError> {
    let verbosity = state.error_verbosity();
    let mut attributes = request.attributes;

    super::validate_isbn(&state, &isbn)?;

    // The isbn may be repeated in the body but never changed.
    if let Some(body_isbn) = attributes.remove(ISBN) {
        if body_isbn.as_str() != Some(isbn.as_str()) {
            let body = match body_isbn {
                AttributeValue::String(body) => body,
                other => serde_json::to_string(&other).unwrap_or_default(),
            };

            return Err(BookError::new(
                verbosity,
                BookErrorType::IsbnMismatch { path: isbn, body },
            )
            .into());
        }
    }

    super::validate_attributes(&state, &attributes)?;

    let book = state
        .store()
        .update(&isbn, attributes)
        .await
        .map_err(|err| ApiError::from_store_error(verbosity, err))?;

    tracing::info!(%isbn, "Updated");

    Ok(BookResponse(book))
}
