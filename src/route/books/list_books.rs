use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;

use crate::{
    book::Book,
    error::{ApiError, ErrorVerbosityProvider},
    state::ApiState,
};

#[derive(Debug)]
pub struct ListBooksResponse(pub Vec<Book>);

impl IntoResponse for ListBooksResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

/// Returns every stored book, ordered by isbn.
#[tracing::instrument(name = "list_books", skip_all)]
pub async fn list_books(State(state): State<ApiState>) -> Result<ListBooksResponse, ApiError> {
    let verbosity = state.error_verbosity();

    let mut books: Vec<Book> = state
        .store()
        .scan()
        .await
        .map_err(|err| ApiError::from_store_error(verbosity, err))?
        .try_collect()
        .await
        .map_err(|err| ApiError::from_store_error(verbosity, err))?;

    books.sort_by(|a, b| a.isbn.cmp(&b.isbn));

    tracing::debug!(count = books.len(), "Listed");

    Ok(ListBooksResponse(books))
}
