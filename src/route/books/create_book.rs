use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use crate::{
    book::{Attributes, Book},
    config::CreatePolicy,
    error::{ApiError, ErrorVerbosityProvider},
    extractor::{json::ApiJson, validated::Validated},
    state::ApiState,
    store::PutMode,
};

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, message = "isbn must not be empty"))]
    pub isbn: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug)]
pub struct CreateBookResponse(pub Book);

impl IntoResponse for CreateBookResponse {
    fn into_response(self) -> Response {
        let location = HeaderValue::try_from(location(&self.0.isbn));

        match location {
            Ok(location) => (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(self.0),
            )
                .into_response(),
            Err(_) => (StatusCode::CREATED, Json(self.0)).into_response(),
        }
    }
}

/// Path of the created book, with the isbn percent-encoded as a single segment.
fn location(isbn: &str) -> String {
    format!("/books/{}", urlencoding::encode(isbn))
}

#[tracing::instrument(name = "create_book", skip_all)]
pub async fn create_book(
    State(state): State<ApiState>,
    Validated(ApiJson(request)): Validated<ApiJson<CreateBookRequest>>,
) -> Result<CreateBookResponse, ApiError> {
    super::validate_isbn(&state, &request.isbn)?;
    super::validate_attributes(&state, &request.attributes)?;

    let mode = match state.book_policy().create {
        CreatePolicy::Reject => PutMode::CreateOnly,
        CreatePolicy::Overwrite => PutMode::Upsert,
    };

    let book = Book::new(request.isbn, request.attributes);

    state
        .store()
        .put(book.clone(), mode)
        .await
        .map_err(|err| ApiError::from_store_error(state.error_verbosity(), err))?;

    tracing::info!(isbn = %book.isbn, ?mode, "Created");

    Ok(CreateBookResponse(book))
}
