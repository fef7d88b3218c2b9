//! # product-images: product image upload service
//!
//! A small HTTP service that keeps the `imagen` column of the `producto` table pointing at images
//! held by an object storage provider.
//!
//! ## Overview
//!
//! Two operations are exposed (see [`api`]):
//!
//! - `GET /images` returns every `(id_Producto, imagen)` pair in the product table, as stored.
//! - `POST /upload/{id}` takes one file in the multipart field `imagen`, uploads it to the
//!   configured storage provider and, once the provider has acknowledged the write, stores the
//!   returned public URL on the product.
//!
//! The database write never starts before the upload is confirmed, so a URL in the table always
//! refers to a completed upload. The reverse does not hold: if the product does not exist, or the
//! update fails, the uploaded object is left in storage and the caller gets a 404 or 500. Nothing
//! reconciles the two, and concurrent uploads for the same product race on the final update.
//!
//! ## Architecture
//!
//! Built on [Axum](https://github.com/tokio-rs/axum). The **storage layer** ([`storage`]) hides
//! the provider (Cloudinary, any S3-compatible bucket, or process memory) behind the
//! [`storage::ImageStorage`] trait. The **database layer** ([`db`]) owns one lazily connected
//! PostgreSQL pool, created at startup and closed at shutdown; connections are validated when
//! acquired, so an unreachable database fails individual requests rather than the process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use product_images::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     product_images::install_crypto_provider();
//!
//!     let args = product_images::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     product_images::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::db::handlers::{PgProductStore, ProductStore};
use crate::openapi::ApiDoc;
use crate::storage::ImageStorage;
use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue};
use axum::{
    Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .products(Arc::new(PgProductStore::new(pool)))
///     .storage(storage)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    /// Product table access
    pub products: Arc<dyn ProductStore>,
    /// Where uploaded images go
    pub storage: Arc<dyn ImageStorage>,
    pub config: Config,
}

/// Install the process-wide rustls crypto provider. Safe to call more than once.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::from(Any)
    } else {
        let mut origins = Vec::new();
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path; Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers(Any);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Build the application router with all endpoints and middleware.
///
/// - `GET /images`, `GET /imagenes`: image listing
/// - `POST /upload/{id}`: image upload, body capped at `max_upload_bytes`
/// - `GET /healthz`: liveness, no backend calls
/// - `GET /api-docs/openapi.json`, `GET /docs`: API documentation
/// - `GET /internal/metrics`: Prometheus metrics, when enabled
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.max_upload_bytes;
    let enable_metrics = state.config.enable_metrics;
    let cors_layer = create_cors_layer(&state.config)?;

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/images", get(api::handlers::images::list_images))
        .route("/imagenes", get(api::handlers::images::list_images))
        .route(
            "/upload/{id}",
            post(api::handlers::images::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors_layer);

    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] builds the pool, probes the database, optionally runs
///    migrations, and constructs the storage backend and router
/// 2. **Serve**: [`Application::serve`] binds the listener and handles requests
/// 3. **Shutdown**: once the shutdown future resolves, in-flight requests finish, the pool is
///    closed and telemetry is flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance backed by PostgreSQL and the configured storage
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            bind = %config.bind_address(),
            storage = config.storage.backend.kind(),
            max_upload_bytes = config.max_upload_bytes,
            "Starting product image service"
        );

        let pool = db::pools::create_pool(&config.database)?;

        // An unreachable database is logged, not fatal: requests fail individually until it is back
        if db::pools::check_connection(&pool).await {
            if config.database.run_migrations {
                migrator().run(&pool).await?;
                info!("Database migrations applied");
            }
        } else if config.database.run_migrations {
            warn!("Skipping migrations, database is unreachable");
        }

        let http_client = reqwest::Client::builder().build()?;
        let storage = storage::build_storage(&config.storage, http_client).await?;

        let state = AppState::builder()
            .products(Arc::new(PgProductStore::new(pool.clone())))
            .storage(storage)
            .config(config.clone())
            .build();

        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool: Some(pool),
        })
    }

    /// Create an application around prebuilt state, with no database pool to manage
    pub fn with_state(state: AppState) -> anyhow::Result<Self> {
        let config = state.config.clone();
        let router = build_router(state)?;

        Ok(Self { router, config, pool: None })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Product image service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
