use crate::db::errors::DbError;
use crate::storage::StorageError;
use crate::types::ProductId;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Path segment is not a valid product id
    #[error("Invalid product id: {value:?}")]
    InvalidProductId { value: String },

    /// Upload request carried no file
    #[error("No image file in upload request")]
    MissingImage,

    /// Malformed request body or unexpected multipart content
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body exceeded the configured upload limit
    #[error("Upload exceeds the limit of {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },

    /// No product row matched the id
    #[error("Product with ID {id} not found")]
    ProductNotFound { id: ProductId },

    /// Reading the product table failed
    #[error("Failed to list product images")]
    ListImages(#[source] DbError),

    /// Storage provider did not accept the upload
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Writing the new image URL failed after the upload succeeded
    #[error("Failed to update product image, stored object {orphaned_url} is unreferenced")]
    UpdateImage {
        orphaned_url: String,
        #[source]
        source: DbError,
    },
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "Producto no encontrado")]
    pub mensaje: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidProductId { .. } | Error::MissingImage | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ProductNotFound { .. } => StatusCode::NOT_FOUND,
            Error::ListImages(_) | Error::Storage(_) | Error::UpdateImage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidProductId { .. } => "ID de producto inválido".to_string(),
            Error::MissingImage => "No se envió ninguna imagen".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::PayloadTooLarge { limit_bytes } => {
                format!("La imagen supera el tamaño máximo permitido de {limit_bytes} bytes")
            }
            Error::ProductNotFound { .. } => "Producto no encontrado".to_string(),
            Error::ListImages(_) => "Error al obtener las imágenes".to_string(),
            Error::Storage(_) | Error::UpdateImage { .. } => "Error al subir imagen".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details, level by severity
        match &self {
            Error::ListImages(_) | Error::Storage(_) | Error::UpdateImage { .. } => {
                tracing::error!("Internal service error: {}", self.source_chain());
            }
            Error::ProductNotFound { .. } => {
                tracing::warn!("Upload target missing: {}", self);
            }
            Error::InvalidProductId { .. } | Error::MissingImage | Error::BadRequest { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            mensaje: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl Error {
    /// Flatten the error and its sources into one message for logging
    fn source_chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
