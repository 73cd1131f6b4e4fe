use std::borrow::Cow;

use axum::{
    extract::rejection::PathRejection,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ErrorVerbosity {
    /// Server returns only the appropriate status code.
    StatusCode,
    /// Server returns only the message with the appropriate status code.
    Message,
    /// Server returns the message, the error type with cleared error content and the appropriate status code.
    Type,
    /// Server returns the message, the error type with the error content and the appropriate status code.
    Full,
}

impl ErrorVerbosity {
    pub fn should_generate_error_reason(&self) -> bool {
        matches!(self, ErrorVerbosity::Full)
    }
}

pub trait ErrorVerbosityProvider {
    fn error_verbosity(&self) -> ErrorVerbosity;
}

#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    #[serde(flatten)]
    error: ApiError,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiErrorMessage {
    message: &'static str,
}

impl From<ApiErrorResponse> for ApiErrorMessage {
    fn from(response: ApiErrorResponse) -> Self {
        ApiErrorMessage {
            message: response.message,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let headers = self.error.headers();
        let status_code = self.error.status_code();

        match self.error.verbosity() {
            ErrorVerbosity::StatusCode => (status_code, headers).into_response(),
            ErrorVerbosity::Message => {
                (status_code, headers, Json(ApiErrorMessage::from(self))).into_response()
            }
            ErrorVerbosity::Type | ErrorVerbosity::Full => {
                (status_code, headers, Json(self)).into_response()
            }
        }
    }
}

#[derive(Debug, From, Serialize)]
#[serde(tag = "error_type", content = "error")]
/// API error
pub enum ApiError {
    /// Internal server error
    ///
    /// This error is returned when an internal server error occurs.
    InternalServerError(InternalServerError),
    /// Service unavailable
    ///
    /// This error is returned when the record store is unreachable or did not answer in time.
    ServiceUnavailable(ServiceUnavailableError),
    /// Body error
    ///
    /// This error is returned when the body is not as expected.
    Body(BodyError),
    /// Path error
    ///
    /// This error is returned when the path is not as expected.
    Path(PathError),
    /// Validation error
    ///
    /// This error is returned when the request was parsed but holds invalid values.
    Validation(ValidationError),
    /// Method not allowed
    ///
    /// This error is returned when the method is not allowed.
    MethodNotAllowed(MethodNotAllowedError),
    /// Not found error
    ///
    /// This error is returned when no route matches the request.
    NotFound(NotFoundError),
    /// Book error
    ///
    /// This error is returned when the requested operation conflicts with the stored books.
    Book(BookError),
}

impl ApiError {
    fn verbosity(&self) -> ErrorVerbosity {
        match self {
            ApiError::InternalServerError(err) => err.verbosity,
            ApiError::ServiceUnavailable(err) => err.verbosity,
            ApiError::Body(err) => err.verbosity,
            ApiError::Path(err) => err.verbosity,
            ApiError::Validation(err) => err.verbosity,
            ApiError::MethodNotAllowed(err) => err.verbosity,
            ApiError::NotFound(err) => err.verbosity,
            ApiError::Book(err) => err.verbosity,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::InternalServerError(_) => "An internal server error has occurred",
            ApiError::ServiceUnavailable(_) => "The service is temporarily unavailable",
            ApiError::Body(_) => "Failed to parse request body",
            ApiError::Path(_) => "Failed to parse path parameters",
            ApiError::Validation(_) => "Validation failed",
            ApiError::MethodNotAllowed(_) => "Method not allowed",
            ApiError::NotFound(_) => "The requested resource was not found",
            ApiError::Book(err) => err.message(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError(err) => err.status_code(),
            ApiError::ServiceUnavailable(err) => err.status_code(),
            ApiError::Body(err) => err.status_code(),
            ApiError::Path(err) => err.status_code(),
            ApiError::Validation(err) => err.status_code(),
            ApiError::MethodNotAllowed(err) => err.status_code(),
            ApiError::NotFound(err) => err.status_code(),
            ApiError::Book(err) => err.status_code(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let ApiError::ServiceUnavailable(_) = self {
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }

        headers
    }

    /// Maps a failed store call to the error returned to the client.
    pub fn from_store_error(verbosity: ErrorVerbosity, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { isbn } => {
                BookError::new(verbosity, BookErrorType::NotFound { isbn }).into()
            }
            StoreError::AlreadyExists { isbn } => {
                BookError::new(verbosity, BookErrorType::AlreadyExists { isbn }).into()
            }
            err @ (StoreError::Unavailable(_) | StoreError::Timeout(_)) => {
                ServiceUnavailableError::from_store_error(verbosity, err).into()
            }
            err => InternalServerError::from_generic_error(verbosity, err).into(),
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        let message = error.message();

        ApiErrorResponse { error, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiErrorResponse::from(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct InternalServerError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    internal_server_error: Option<String>,
}

impl InternalServerError {
    pub fn from_generic_error<E: Into<anyhow::Error>>(verbosity: ErrorVerbosity, err: E) -> Self {
        let err: anyhow::Error = err.into();
        let err = format!("{err:#}");
        tracing::error!(%err, "Internal server error");

        let internal_server_error = verbosity.should_generate_error_reason().then_some(err);

        InternalServerError {
            verbosity,
            internal_server_error,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceUnavailableError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    service_unavailable_reason: Option<String>,
}

impl ServiceUnavailableError {
    pub fn from_store_error(verbosity: ErrorVerbosity, err: StoreError) -> Self {
        tracing::error!(%err, "Store unavailable");

        let service_unavailable_reason = verbosity
            .should_generate_error_reason()
            .then(|| err.to_string());

        ServiceUnavailableError {
            verbosity,
            service_unavailable_reason,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[derive(Debug, Serialize)]
pub struct BodyError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    body_error_reason: Option<String>,
    body_expected_schema: Option<String>,
}

impl BodyError {
    pub fn new(
        verbosity: ErrorVerbosity,
        body_error_reason: String,
        body_expected_schema: Option<String>,
    ) -> Self {
        let (body_error_reason, body_expected_schema) =
            match verbosity.should_generate_error_reason() {
                true => (Some(body_error_reason), body_expected_schema),
                false => (None, None),
            };

        BodyError {
            verbosity,
            body_error_reason,
            body_expected_schema,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Serialize)]
pub struct PathError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    path_error_reason: Option<String>,
}

impl PathError {
    pub fn new(verbosity: ErrorVerbosity, path_error_reason: String) -> Self {
        let path_error_reason = verbosity
            .should_generate_error_reason()
            .then_some(path_error_reason);

        PathError {
            verbosity,
            path_error_reason,
        }
    }

    pub fn from_path_rejection(verbosity: ErrorVerbosity, rejection: PathRejection) -> ApiError {
        match rejection {
            // Raised when the handler is mounted on a route without path parameters.
            PathRejection::MissingPathParams(err) => {
                InternalServerError::from_generic_error(verbosity, anyhow::anyhow!("{err}")).into()
            }
            rejection => PathError::new(verbosity, rejection.body_text()).into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    validation_error_reason: Option<String>,
}

impl ValidationError {
    pub fn new(verbosity: ErrorVerbosity, validation_error_reason: String) -> Self {
        let validation_error_reason = verbosity
            .should_generate_error_reason()
            .then_some(validation_error_reason);

        ValidationError {
            verbosity,
            validation_error_reason,
        }
    }

    pub fn from_validation_errors(
        verbosity: ErrorVerbosity,
        errors: validator::ValidationErrors,
    ) -> Self {
        Self::new(verbosity, errors.to_string())
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Serialize)]
pub struct MethodNotAllowedError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
}

impl MethodNotAllowedError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        MethodNotAllowedError { verbosity }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::METHOD_NOT_ALLOWED
    }
}

#[derive(Debug, Serialize)]
pub struct NotFoundError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
}

impl NotFoundError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        NotFoundError { verbosity }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
pub enum BookErrorType {
    NotFound {
        #[serde(skip)]
        isbn: String,
    },
    AlreadyExists {
        #[serde(skip)]
        isbn: String,
    },
    IsbnMismatch {
        #[serde(skip)]
        path: String,
        #[serde(skip)]
        body: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BookError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    book_error_type: BookErrorType,
    book_error_reason: Option<Cow<'static, str>>,
}

impl BookError {
    pub fn new(verbosity: ErrorVerbosity, book_error_type: BookErrorType) -> Self {
        let book_error_reason = verbosity
            .should_generate_error_reason()
            .then(|| Self::reason(&book_error_type));

        BookError {
            verbosity,
            book_error_type,
            book_error_reason,
        }
    }

    fn reason(book_error_type: &BookErrorType) -> Cow<'static, str> {
        match book_error_type {
            BookErrorType::NotFound { isbn } => {
                Cow::Owned(format!("No book found with isbn {isbn}"))
            }
            BookErrorType::AlreadyExists { isbn } => {
                Cow::Owned(format!("A book with isbn {isbn} already exists"))
            }
            BookErrorType::IsbnMismatch { path, body } => Cow::Owned(format!(
                "Body isbn {body} does not match path isbn {path}"
            )),
        }
    }

    fn message(&self) -> &'static str {
        match self.book_error_type {
            BookErrorType::NotFound { .. } => "Book not found",
            BookErrorType::AlreadyExists { .. } => "Book already exists",
            BookErrorType::IsbnMismatch { .. } => "The isbn of a book cannot be changed",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.book_error_type {
            BookErrorType::NotFound { .. } => StatusCode::NOT_FOUND,
            BookErrorType::AlreadyExists { .. } => StatusCode::CONFLICT,
            BookErrorType::IsbnMismatch { .. } => StatusCode::BAD_REQUEST,
        }
    }
}
