//! HTTP API for the storefront.
//!
//! Provides REST endpoints for the catalog, per-session carts, checkout and
//! order administration, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod sessions;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use sessions::SessionRegistry;
pub use state::{AppState, Backend};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::scrape::<S>))
        .with_state((state.clone(), metrics_handle));

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/customers", post(routes::customers::register::<S>))
        .route("/customers/{id}", get(routes::customers::get::<S>))
        .route("/customers/{id}/orders", get(routes::customers::orders::<S>))
        .route(
            "/sessions/{sid}/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/sessions/{sid}/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/sessions/{sid}/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/sessions/{sid}/checkout", post(routes::checkout::checkout::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::update_status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Periodically evicts idle session carts until the runtime shuts down.
pub fn spawn_session_sweeper<S: Backend>(state: Arc<AppState<S>>) -> tokio::task::JoinHandle<()> {
    let period = (state.sessions.idle_limit() / 2).max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.sessions.evict_idle().await;
            if evicted > 0 {
                tracing::info!(evicted, "evicted idle session carts");
            }
        }
    })
}

/// Creates application state over `store` using the configured commit mode
/// and session storage.
pub fn create_state<S: Backend>(store: S, config: &config::Config) -> Arc<AppState<S>> {
    let sessions = match &config.session_dir {
        Some(dir) => SessionRegistry::on_disk(dir),
        None => SessionRegistry::in_memory(),
    }
    .with_limits(config.session_capacity, config.session_idle);
    Arc::new(AppState::new(store, sessions, config.commit_mode))
}
