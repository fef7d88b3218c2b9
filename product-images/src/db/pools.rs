//! Pool construction for the product database.
//!
//! The pool is created once at startup and shared by every request through [`PgProductStore`].
//! It is built lazily: no connection is opened until the first query, and every connection is
//! validated as it is handed out. A database that is down at startup therefore does not stop the
//! process; [`check_connection`] logs the problem and requests fail individually until the server
//! becomes reachable.
//!
//! # Example
//!
//! ```ignore
//! let pool = pools::create_pool(&config.database)?;
//! pools::check_connection(&pool).await;
//! let store = PgProductStore::new(pool.clone());
//! // ... serve ...
//! pool.close().await;
//! ```
//!
//! [`PgProductStore`]: crate::db::handlers::PgProductStore

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{error, info, instrument};

/// Build connection options from either `database.url` or the individual fields.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
    let mut options = match &config.url {
        Some(url) => PgConnectOptions::from_str(url)?,
        None => {
            let mut options = PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .database(&config.name);
            if !config.password.is_empty() {
                options = options.password(&config.password);
            }
            options
        }
    };

    if config.require_tls {
        options = options.ssl_mode(PgSslMode::Require);
    }

    Ok(options)
}

/// Create the shared pool without connecting.
pub fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = connect_options(config)?;
    let settings = &config.pool;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .test_before_acquire(true)
        .connect_lazy_with(options);

    Ok(pool)
}

/// Run a trivial query to report whether the database is reachable.
///
/// Never fails: the outcome is logged and returned so startup can decide what else to skip.
#[instrument(skip_all)]
pub async fn check_connection(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => {
            info!("Connected to database");
            true
        }
        Err(e) => {
            error!(error = %e, "Database connection failed; requests will fail until it becomes reachable");
            false
        }
    }
}
