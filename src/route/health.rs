use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    store: &'static str,
}

/// Liveness probe. Does not access the store.
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Health>) {
    (
        StatusCode::OK,
        Json(Health {
            status: "ok",
            store: state.store().name(),
        }),
    )
}
