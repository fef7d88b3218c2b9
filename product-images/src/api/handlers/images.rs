use crate::AppState;
use crate::api::models::images::{ProductImageResponse, UploadResponse};
use crate::errors::{Error, ErrorBody, Result};
use crate::storage::UploadedImage;
use crate::types::parse_product_id;
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use tracing::{debug, info, instrument, warn};

/// Multipart field that carries the uploaded file
pub const IMAGE_FIELD: &str = "imagen";

#[utoipa::path(
    get,
    path = "/images",
    tag = "images",
    summary = "List product images",
    description = "Returns every product id with its current image URL, in table order. Also served at `/imagenes`.",
    responses(
        (status = 200, description = "All products and their image URLs", body = [ProductImageResponse]),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
#[instrument(skip_all)]
pub async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<ProductImageResponse>>> {
    let rows = state.products.list_images().await.map_err(Error::ListImages)?;
    debug!(count = rows.len(), "Listed product images");

    Ok(Json(rows.into_iter().map(ProductImageResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/upload/{id}",
    tag = "images",
    summary = "Upload product image",
    description = "Stores the file sent in the `imagen` field with the storage provider, then points the product's image at the stored URL. \
                   The stored object is kept even when the product does not exist.",
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    request_body(
        content_type = "multipart/form-data",
        description = "Exactly one file in the `imagen` field"
    ),
    responses(
        (status = 200, description = "Image stored and product updated", body = UploadResponse),
        (status = 400, description = "Invalid product id, missing file or malformed body", body = ErrorBody),
        (status = 404, description = "No product with this id", body = ErrorBody),
        (status = 413, description = "Upload larger than the configured limit", body = ErrorBody),
        (status = 500, description = "Storage provider or database error", body = ErrorBody)
    )
)]
#[instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    // The id is checked before the body is touched
    let id = parse_product_id(&raw_id).ok_or(Error::InvalidProductId { value: raw_id })?;

    let multipart = multipart.map_err(|e| Error::BadRequest {
        message: format!("Cuerpo multipart inválido: {}", e.body_text()),
    })?;
    let image = read_image(multipart, state.config.max_upload_bytes).await?;

    let stored = state.storage.upload(image).await?;
    info!(product_id = id, url = %stored.url, backend = state.storage.name(), "Image stored");

    let affected = state
        .products
        .update_image_url(id, &stored.url)
        .await
        .map_err(|source| Error::UpdateImage {
            orphaned_url: stored.url.clone(),
            source,
        })?;

    if affected == 0 {
        // The stored object stays behind, unreferenced
        warn!(product_id = id, orphaned_url = %stored.url, "Image stored for a product that does not exist");
        return Err(Error::ProductNotFound { id });
    }

    Ok(Json(UploadResponse::updated(id)))
}

/// Pull the single `imagen` file out of the form. Text fields are skipped; a second file, or a
/// file under any other name, rejects the request.
async fn read_image(mut multipart: Multipart, limit_bytes: usize) -> Result<UploadedImage> {
    let mut image: Option<UploadedImage> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit_bytes))? {
        // Browsers send an empty file name when no file was picked
        let Some(file_name) = field.file_name().filter(|name| !name.is_empty()).map(str::to_string) else {
            continue;
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != IMAGE_FIELD {
            return Err(Error::BadRequest {
                message: format!("Campo de archivo inesperado: '{field_name}'. La imagen debe enviarse en '{IMAGE_FIELD}'"),
            });
        }
        if image.is_some() {
            return Err(Error::BadRequest {
                message: "Solo se permite una imagen por solicitud".to_string(),
            });
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit_bytes))?;
        debug!(file_name = %file_name, size = bytes.len(), "Received image");

        image = Some(UploadedImage {
            bytes,
            content_type,
            file_name: Some(file_name),
        });
    }

    image.ok_or(Error::MissingImage)
}

fn multipart_error(err: MultipartError, limit_bytes: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit_bytes }
    } else {
        Error::BadRequest {
            message: format!("Cuerpo multipart inválido: {}", err.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::images::{ProductImageResponse, UploadResponse};
    use crate::errors::ErrorBody;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    fn image_form(bytes: &'static [u8]) -> MultipartForm {
        MultipartForm::new().add_part("imagen", Part::bytes(bytes).file_name("zapato.png").mime_type("image/png"))
    }

    #[test_log::test(tokio::test)]
    async fn test_list_returns_rows_unchanged() {
        let products = MemoryProductStore::with_products(&[
            (3, Some("https://cdn.example.com/c.png")),
            (1, None),
            (2, Some("https://cdn.example.com/b.png")),
        ]);
        let server = create_test_app(products, test_storage());

        let response = server.get("/images").await;

        response.assert_status_ok();
        let body: Vec<ProductImageResponse> = response.json();
        assert_eq!(
            body,
            vec![
                ProductImageResponse {
                    id_producto: 3,
                    imagen: Some("https://cdn.example.com/c.png".to_string())
                },
                ProductImageResponse {
                    id_producto: 1,
                    imagen: None
                },
                ProductImageResponse {
                    id_producto: 2,
                    imagen: Some("https://cdn.example.com/b.png".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_wire_format_and_legacy_path() {
        let products = MemoryProductStore::with_products(&[(7, None)]);
        let server = create_test_app(products, test_storage());

        let response = server.get("/imagenes").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!([{ "id_Producto": 7, "imagen": null }]));
    }

    #[tokio::test]
    async fn test_list_empty_table() {
        let server = create_test_app(MemoryProductStore::default(), test_storage());

        let response = server.get("/images").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_list_database_failure_is_opaque() {
        let products = MemoryProductStore::with_products(&[(1, None)]);
        products.fail_queries("connection refused (os error 111)");
        let server = create_test_app(products, test_storage());

        let response = server.get("/images").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert_eq!(body.mensaje, "Error al obtener las imágenes");
        assert!(!response.text().contains("connection refused"));
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_sets_url_returned_by_storage() {
        let products = MemoryProductStore::with_products(&[(42, None)]);
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        let response = server.post("/upload/42").multipart(image_form(PNG)).await;

        response.assert_status_ok();
        let body: UploadResponse = response.json();
        assert_eq!(body, UploadResponse::updated(42));
        response.assert_json(&serde_json::json!({ "mensaje": "Imagen actualizada con éxito", "id_Producto": 42 }));

        let objects = storage.objects();
        assert_eq!(objects.len(), 1);
        let (key, object) = objects.iter().next().unwrap();
        assert_eq!(object.bytes.as_ref(), PNG);
        assert_eq!(object.content_type.as_deref(), Some("image/png"));

        let url = products.image_of(42).flatten().unwrap();
        assert!(url.ends_with(key.as_str()));
        assert!(url.starts_with("http://localhost:3000/media/productos/"));
    }

    #[tokio::test]
    async fn test_repeated_upload_replaces_url() {
        let products = MemoryProductStore::with_products(&[(5, Some("https://cdn.example.com/old.png"))]);
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        server.post("/upload/5").multipart(image_form(PNG)).await.assert_status_ok();
        let first = products.image_of(5).flatten().unwrap();

        server.post("/upload/5").multipart(image_form(PNG)).await.assert_status_ok();
        let second = products.image_of(5).flatten().unwrap();

        assert_ne!(first, "https://cdn.example.com/old.png");
        assert_ne!(first, second);
        assert_eq!(storage.upload_count(), 2);
        assert_eq!(storage.objects().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_non_integer_id_makes_no_calls() {
        let products = MemoryProductStore::with_products(&[(12, None)]);
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        for id in ["abc", "12abc", "1.5", "99999999999"] {
            let response = server.post(&format!("/upload/{id}")).multipart(image_form(PNG)).await;

            response.assert_status_bad_request();
            let body: ErrorBody = response.json();
            assert_eq!(body.mensaje, "ID de producto inválido");
        }

        assert_eq!(storage.upload_count(), 0);
        assert_eq!(products.update_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_invalid_id_checked_before_body() {
        let storage = test_storage();
        let server = create_test_app(MemoryProductStore::default(), storage.clone());

        let response = server.post("/upload/abc").text("not multipart").await;

        response.assert_status_bad_request();
        response.assert_json(&serde_json::json!({ "mensaje": "ID de producto inválido" }));
    }

    #[tokio::test]
    async fn test_upload_without_file_makes_no_calls() {
        let products = MemoryProductStore::with_products(&[(1, None)]);
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        let response = server
            .post("/upload/1")
            .multipart(MultipartForm::new().add_text("descripcion", "zapato rojo"))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&serde_json::json!({ "mensaje": "No se envió ninguna imagen" }));
        assert_eq!(storage.upload_count(), 0);
        assert_eq!(products.update_count(), 0);
        assert_eq!(products.image_of(1), Some(None));
    }

    #[tokio::test]
    async fn test_upload_text_value_in_image_field_is_not_a_file() {
        let storage = test_storage();
        let server = create_test_app(MemoryProductStore::with_products(&[(1, None)]), storage.clone());

        let response = server
            .post("/upload/1")
            .multipart(MultipartForm::new().add_text("imagen", "https://example.com/a.png"))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&serde_json::json!({ "mensaje": "No se envió ninguna imagen" }));
        assert_eq!(storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_ignores_extra_text_fields() {
        let products = MemoryProductStore::with_products(&[(1, None)]);
        let server = create_test_app(products.clone(), test_storage());

        let form = MultipartForm::new()
            .add_text("nombre", "zapato")
            .add_part("imagen", Part::bytes(PNG).file_name("zapato.png").mime_type("image/png"));
        let response = server.post("/upload/1").multipart(form).await;

        response.assert_status_ok();
        assert!(products.image_of(1).flatten().is_some());
    }

    #[tokio::test]
    async fn test_upload_rejects_two_files() {
        let storage = test_storage();
        let server = create_test_app(MemoryProductStore::with_products(&[(1, None)]), storage.clone());

        let form = MultipartForm::new()
            .add_part("imagen", Part::bytes(PNG).file_name("a.png").mime_type("image/png"))
            .add_part("imagen", Part::bytes(PNG).file_name("b.png").mime_type("image/png"));
        let response = server.post("/upload/1").multipart(form).await;

        response.assert_status_bad_request();
        assert_eq!(storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_file_under_other_field() {
        let storage = test_storage();
        let server = create_test_app(MemoryProductStore::with_products(&[(1, None)]), storage.clone());

        let form = MultipartForm::new().add_part("file", Part::bytes(PNG).file_name("a.png").mime_type("image/png"));
        let response = server.post("/upload/1").multipart(form).await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(body.mensaje.contains("'file'"));
        assert_eq!(storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_non_multipart_body() {
        let storage = test_storage();
        let server = create_test_app(MemoryProductStore::with_products(&[(1, None)]), storage.clone());

        let response = server.post("/upload/1").json(&serde_json::json!({ "imagen": "x" })).await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(body.mensaje.starts_with("Cuerpo multipart inválido"));
        assert_eq!(storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let mut config = create_test_config();
        config.max_upload_bytes = 256;
        let storage = test_storage();
        let products = MemoryProductStore::with_products(&[(1, None)]);
        let server = create_test_app_with_config(config, products.clone(), storage.clone());

        static BIG: [u8; 4096] = [0u8; 4096];
        let form = MultipartForm::new().add_part("imagen", Part::bytes(&BIG[..]).file_name("big.png").mime_type("image/png"));
        let response = server.post("/upload/1").multipart(form).await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(storage.upload_count(), 0);
        assert_eq!(products.image_of(1), Some(None));
    }

    #[tokio::test]
    async fn test_upload_to_missing_product_keeps_stored_object() {
        let products = MemoryProductStore::with_products(&[(1, Some("https://cdn.example.com/a.png"))]);
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        let response = server.post("/upload/999999").multipart(image_form(PNG)).await;

        response.assert_status_not_found();
        response.assert_json(&serde_json::json!({ "mensaje": "Producto no encontrado" }));
        assert_eq!(storage.objects().len(), 1);
        assert_eq!(products.update_count(), 1);
        assert_eq!(
            products.rows(),
            vec![(1, Some("https://cdn.example.com/a.png".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_storage_failure_skips_database() {
        let products = MemoryProductStore::with_products(&[(1, None)]);
        let storage = test_storage();
        storage.fail_uploads("Invalid Signature");
        let server = create_test_app(products.clone(), storage.clone());

        let response = server.post("/upload/1").multipart(image_form(PNG)).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&serde_json::json!({ "mensaje": "Error al subir imagen" }));
        assert_eq!(products.update_count(), 0);
        assert_eq!(products.image_of(1), Some(None));
    }

    #[tokio::test]
    async fn test_database_failure_after_upload() {
        let products = MemoryProductStore::with_products(&[(1, None)]);
        products.fail_queries("deadlock detected");
        let storage = test_storage();
        let server = create_test_app(products.clone(), storage.clone());

        let response = server.post("/upload/1").multipart(image_form(PNG)).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&serde_json::json!({ "mensaje": "Error al subir imagen" }));
        assert_eq!(storage.objects().len(), 1);
        assert!(!response.text().contains("http://localhost:3000/media"));
    }
}
