//! Liveness/readiness HTTP surface: an axum router exposing `/health/live`
//! and `/health/ready`, a `TimeoutLayer`, and graceful shutdown via a
//! `Signal` broadcast, backed by [`ServiceCoordinator::health_check`].

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use edge_common::Signal;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{config::HttpConfig, error::CoordinatorError, ServiceCoordinator};

pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// # Errors
    /// Returns an error if binding to `config.listen_address` fails.
    pub async fn new(
        config: &HttpConfig,
        coordinator: Arc<ServiceCoordinator>,
    ) -> Result<Self, CoordinatorError> {
        let listener =
            TcpListener::bind(&config.listen_address)
                .await
                .map_err(|e| CoordinatorError::Bind {
                    address: config.listen_address.clone(),
                    source: e,
                })?;

        tracing::info!(address = %config.listen_address, "coordinator health server bound");

        let router = Router::new()
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(coordinator)
            .layer(TimeoutLayer::new(Duration::from_secs(1)));

        Ok(Self { listener, router })
    }

    /// # Errors
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), CoordinatorError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("coordinator health server received shutdown signal");
            })
            .await
            .map_err(|e| CoordinatorError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Always 200: if the process can answer HTTP at all, it's alive.
async fn liveness_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

async fn readiness_handler(State(coordinator): State<Arc<ServiceCoordinator>>) -> Response {
    let health = coordinator.health_check().await;
    if health.is_healthy() {
        (StatusCode::OK, Json(health)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_always_passes() {
        let response = liveness_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_fails_before_anything_is_started() {
        let coordinator = Arc::new(ServiceCoordinator::new(crate::config::CoordinatorConfig::default()));
        let response = readiness_handler(State(coordinator)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
