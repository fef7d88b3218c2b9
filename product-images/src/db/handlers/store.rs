//! Storage-agnostic access to product image references.

use crate::db::{errors::Result, models::products::ProductImage};
use crate::types::ProductId;

/// The two operations the HTTP layer needs from the product table.
///
/// Implementations must be safe to share across concurrent requests. No ordering or locking is
/// promised between calls: two updates for the same product race and the last write wins.
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    /// Every `(id, image url)` pair, in whatever order the store returns them
    async fn list_images(&self) -> Result<Vec<ProductImage>>;

    /// Point a product at a new image URL. Returns the number of rows affected (0 or 1).
    async fn update_image_url(&self, id: ProductId, url: &str) -> Result<u64>;
}
