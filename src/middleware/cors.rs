use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{config::CorsConfig, state::ApiState};

/// Header values sent in answer to a CORS preflight request.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_headers: HeaderValue,
    allow_methods: HeaderValue,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig) -> anyhow::Result<Self> {
        let allow_headers = HeaderValue::from_str(&config.allow_headers)
            .context("Invalid cors.allow_headers")?;
        let allow_methods = HeaderValue::from_str(&config.allow_methods)
            .context("Invalid cors.allow_methods")?;

        Ok(Self {
            allow_headers,
            allow_methods,
        })
    }
}

/// Answers `OPTIONS` requests without touching the store.
pub async fn preflight(State(state): State<ApiState>) -> Response {
    let cors = state.cors();

    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_HEADERS, cors.allow_headers.clone()),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("false"),
            ),
            (header::ACCESS_CONTROL_ALLOW_METHODS, cors.allow_methods.clone()),
        ],
    )
        .into_response()
}

/// Adds `Access-Control-Allow-Origin: *` to every response, errors included.
pub fn allow_any_origin_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    )
}
