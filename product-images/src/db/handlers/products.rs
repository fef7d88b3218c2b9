//! Database repository for the `producto` table.

use crate::{
    db::{
        errors::Result,
        handlers::store::ProductStore,
        models::products::ProductImage,
    },
    types::ProductId,
};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

pub struct Products<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Products<'c> {
    /// Create a new Products repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// All `(id_producto, imagen)` pairs, unordered
    #[instrument(skip(self), err)]
    pub async fn list_images(&mut self) -> Result<Vec<ProductImage>> {
        let rows = sqlx::query_as::<_, ProductImage>("SELECT id_producto, imagen FROM producto")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows)
    }

    /// Set `imagen` for one product, returning the number of rows touched
    #[instrument(skip(self, url), fields(url = %url), err)]
    pub async fn update_image_url(&mut self, id: ProductId, url: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE producto SET imagen = $1 WHERE id_producto = $2")
            .bind(url)
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

/// [`ProductStore`] backed by the shared PostgreSQL pool.
///
/// Every call checks a connection out of the pool (validated on acquire) and returns it when done;
/// there is no per-request reconnect logic.
#[derive(Clone, Debug)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductStore for PgProductStore {
    async fn list_images(&self) -> Result<Vec<ProductImage>> {
        let mut conn = self.pool.acquire().await?;
        Products::new(&mut conn).list_images().await
    }

    async fn update_image_url(&self, id: ProductId, url: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Products::new(&mut conn).update_image_url(id, url).await
    }
}
