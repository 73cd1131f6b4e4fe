use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    book::{is_isbn13, is_iso8601_date, Attributes, Book, RELEASE_DATE},
    error::{ApiError, ErrorVerbosityProvider, ValidationError},
    state::ApiState,
};

pub mod app;
pub mod create_book;
pub mod delete_book;
pub mod get_book;
pub mod list_books;
pub mod update_book;

#[derive(Debug)]
pub struct BookResponse(pub Book);

impl IntoResponse for BookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

/// Checks `isbn` against the configured book policy.
fn validate_isbn(state: &ApiState, isbn: &str) -> Result<(), ApiError> {
    if state.book_policy().strict_isbn && !is_isbn13(isbn) {
        tracing::warn!(%isbn, "Isbn rejected");

        return Err(ValidationError::new(
            state.error_verbosity(),
            format!("invalid isbn {isbn}, must consist of 13 digits"),
        )
        .into());
    }

    Ok(())
}

/// Checks the attribute values against the configured book policy.
fn validate_attributes(state: &ApiState, attributes: &Attributes) -> Result<(), ApiError> {
    if !state.book_policy().validate_release_date {
        return Ok(());
    }

    let Some(release_date) = attributes.get(RELEASE_DATE) else {
        return Ok(());
    };

    match release_date.as_str() {
        Some(date) if is_iso8601_date(date) => Ok(()),
        _ => {
            tracing::warn!(?release_date, "Release date rejected");

            Err(ValidationError::new(
                state.error_verbosity(),
                format!("{RELEASE_DATE} does not match YYYY-MM-DD (ISO 8601)"),
            )
            .into())
        }
    }
}
