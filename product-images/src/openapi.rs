//! OpenAPI document for the product image API, served at `/api-docs/openapi.json` and rendered
//! at `/docs`.

use crate::api;
use crate::errors::ErrorBody;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Product Images API",
        description = "Upload product images to object storage and list the image URL of every product."
    ),
    paths(api::handlers::images::list_images, api::handlers::images::upload_image),
    components(schemas(
        api::models::images::ProductImageResponse,
        api::models::images::UploadResponse,
        ErrorBody
    )),
    tags((name = "images", description = "Product image listing and upload"))
)]
pub struct ApiDoc;
