//! Data access for the product table.
//!
//! - [`ProductStore`]: what the HTTP handlers depend on; swapped for an in-memory store in tests
//! - [`PgProductStore`]: the production implementation, owning the shared pool
//! - [`Products`]: query layer over a single connection or transaction
//!
//! # Common Pattern
//!
//! ```ignore
//! use product_images::db::handlers::Products;
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let rows = Products::new(&mut conn).list_images().await?;
//!     Ok(())
//! }
//! ```

pub mod products;
pub mod store;

pub use products::{PgProductStore, Products};
pub use store::ProductStore;
