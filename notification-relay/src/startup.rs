//! Application startup and lifecycle management.
//!
//! The relay serves two listeners: the public port with `GET /notifications`
//! only, and an admin port with health, readiness and metrics. The subscriber
//! runs alongside both and stops with them.

use crate::config::RelayConfig;
use crate::handlers::{
    health_check, list_notifications, method_not_allowed, metrics_endpoint, readiness_check,
};
use crate::services::{
    HistoryBuffer, HistoryStore, NotificationSource, RedisHistoryStore, RedisSubscriber,
};
use crate::workers::SubscriberLoop;
use axum::{http::Method, middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State for the public relay router.
#[derive(Clone)]
pub struct AppState {
    pub history: HistoryBuffer,
}

/// State for the admin router.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn HistoryStore>,
}

/// Public router: `GET /notifications`, open to any origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).fallback(method_not_allowed),
        )
        .route_layer(from_fn(metrics_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS]),
        )
}

/// Admin router for Docker/K8s probes and Prometheus.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    admin_port: u16,
    http_listener: TcpListener,
    admin_listener: TcpListener,
    config: RelayConfig,
    history: HistoryBuffer,
    source: Box<dyn NotificationSource>,
    shutdown: CancellationToken,
}

impl Application {
    /// Connect to Redis and bind both listeners.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let store = RedisHistoryStore::connect(&config.redis.url, &config.relay.history_key)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect history store: {}", e);
                AppError::InternalError(anyhow::anyhow!(e))
            })?;

        let source = RedisSubscriber::new(&config.redis.url, &config.relay.channel)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Self::build_with(config, Arc::new(store), Box::new(source)).await
    }

    /// Bind both listeners around an already constructed store and source.
    ///
    /// Port 0 in the config picks a random port; read it back with
    /// [`Application::http_port`].
    pub async fn build_with(
        config: RelayConfig,
        store: Arc<dyn HistoryStore>,
        source: Box<dyn NotificationSource>,
    ) -> Result<Self, AppError> {
        let http_listener = bind(config.port).await?;
        let http_port = http_listener.local_addr()?.port();

        let admin_listener = bind(config.admin.port).await?;
        let admin_port = admin_listener.local_addr()?.port();

        tracing::info!(
            "Notification relay: HTTP on port {}, admin on port {}",
            http_port,
            admin_port
        );

        let history = HistoryBuffer::new(store, config.relay.history_limit);

        Ok(Self {
            http_port,
            admin_port,
            http_listener,
            admin_listener,
            config,
            history,
            source,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn admin_port(&self) -> u16 {
        self.admin_port
    }

    /// Token that stops the subscriber and both servers when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the subscriber and both servers until the shutdown token fires or
    /// a server fails.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let shutdown = self.shutdown;

        let subscriber = SubscriberLoop::new(
            self.source,
            self.history.clone(),
            self.config.relay.retry.clone(),
            self.config.relay.channel.clone(),
            shutdown.clone(),
        )
        .spawn();

        let http_router = build_router(AppState {
            history: self.history.clone(),
        });
        let admin_router = build_admin_router(AdminState {
            store: self.history.store().clone(),
        });

        let http_shutdown = shutdown.clone();
        let admin_shutdown = shutdown.clone();

        let result = tokio::select! {
            result = axum::serve(self.http_listener, http_router)
                .with_graceful_shutdown(async move { http_shutdown.cancelled().await }) => {
                result.map_err(|e| {
                    tracing::error!("HTTP server error: {}", e);
                    std::io::Error::other(format!("HTTP server error: {}", e))
                })
            }
            result = axum::serve(self.admin_listener, admin_router)
                .with_graceful_shutdown(async move { admin_shutdown.cancelled().await }) => {
                result.map_err(|e| {
                    tracing::error!("Admin server error: {}", e);
                    std::io::Error::other(format!("Admin server error: {}", e))
                })
            }
        };

        // Whichever side finished first, take the rest down with it
        shutdown.cancel();
        if let Err(e) = subscriber.await {
            tracing::error!("Subscriber task failed: {}", e);
        }

        tracing::info!("Notification relay stopped");
        result
    }
}

async fn bind(port: u16) -> Result<TcpListener, AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind listener to {}: {}", addr, e);
        AppError::from(e)
    })
}
