//! Axum route handlers.
//!
//! - [`images`]: product image listing and upload

pub mod images;
