use crate::db::models::products::ProductImage;
use crate::types::ProductId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Imagen actualizada con éxito";

/// One product and its current image URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductImageResponse {
    #[serde(rename = "id_Producto")]
    #[schema(example = 42)]
    pub id_producto: ProductId,
    /// `null` when the product has no image yet
    #[schema(example = "https://res.cloudinary.com/demo/image/upload/v1/productos/abc123.png")]
    pub imagen: Option<String>,
}

impl From<ProductImage> for ProductImageResponse {
    fn from(row: ProductImage) -> Self {
        Self {
            id_producto: row.id_producto,
            imagen: row.imagen,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    #[schema(example = "Imagen actualizada con éxito")]
    pub mensaje: String,
    #[serde(rename = "id_Producto")]
    #[schema(example = 42)]
    pub id_producto: ProductId,
}

impl UploadResponse {
    pub fn updated(id_producto: ProductId) -> Self {
        Self {
            mensaje: UPLOAD_SUCCESS_MESSAGE.to_string(),
            id_producto,
        }
    }
}
