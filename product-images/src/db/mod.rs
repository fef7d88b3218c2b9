//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL. The service touches a
//! single table, `producto`, which is normally owned by another system: rows are never created or
//! deleted here, only read and have their `imagen` column updated.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Handlers   │  (API request handlers)
//! └──────┬───────┘
//!        │  Arc<dyn ProductStore>
//!        ↓
//! ┌──────────────┐
//! │PgProductStore│  (owns the shared pool, one connection per call)
//! └──────┬───────┘
//!        │
//!        ↓
//! ┌──────────────┐
//! │   Products   │  (db::handlers - queries over a single connection)
//! └──────┬───────┘
//!        │
//!        ↓
//! ┌──────────────┐
//! │  PostgreSQL  │
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: The [`handlers::ProductStore`] seam and its PostgreSQL implementation
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//! - [`pools`]: Pool construction and the startup connectivity probe
//!
//! # Migrations
//!
//! `migrations/` holds the schema the service expects. It is only applied when
//! `database.run_migrations` is enabled:
//!
//! ```ignore
//! product_images::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
pub mod pools;
