use crate::types::ProductId;
use sqlx::FromRow;

/// One `(id_producto, imagen)` pair from the `producto` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ProductImage {
    pub id_producto: ProductId,
    /// Set only after a successful upload
    pub imagen: Option<String>,
}
