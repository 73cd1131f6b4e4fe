use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    decompression::RequestDecompressionLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::ServerConfig,
    middleware::{
        cors::{allow_any_origin_layer, CorsHeaders},
        method_not_allowed::method_not_allowed,
        not_found::not_found,
        trace_response_body::trace_response_body,
    },
    route::{books, health::health},
    state::ApiState,
    store,
};

/// Builds the complete application router around `state`.
pub fn app(state: ApiState, request_timeout: Duration, trace_responses: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .merge(books::app::app())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            method_not_allowed::<ApiState>,
        ));

    if trace_responses {
        router = router.layer(middleware::from_fn_with_state(
            state.clone(),
            trace_response_body::<ApiState>,
        ));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(allow_any_origin_layer())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                    .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                    .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
            )
            .layer(TimeoutLayer::new(request_timeout))
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new()),
    )
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let store = store::connect(&self.config.store)
            .await
            .context("Failed to connect to record store")?;

        let cors = CorsHeaders::from_config(&self.config.cors)?;

        let state = ApiState::new(
            self.config.error_verbosity,
            store,
            self.config.books.clone(),
            cors,
        );

        let app = app(
            state,
            self.config.request_timeout(),
            self.config.trace_response_body,
        );

        tracing::info!(addr = %self.config.socket_address, "Starting server");

        let listener = TcpListener::bind(&self.config.socket_address)
            .await
            .context("Bind failed")?;

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");

        tracing::info!("CTRL+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;

        tracing::info!("SIGTERM received");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
