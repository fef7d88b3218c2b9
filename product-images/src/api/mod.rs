//! HTTP layer: route handlers in [`handlers`], wire types in [`models`].
//!
//! Two operations are exposed, both unauthenticated:
//!
//! - `GET /images` (legacy alias `GET /imagenes`): every product id with its image URL
//! - `POST /upload/{id}`: upload one image in the multipart field `imagen` and record its URL
//!
//! Field names and messages on the wire are Spanish, as existing clients expect them.

pub mod handlers;
pub mod models;
