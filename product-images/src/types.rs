//! Common type definitions.
//!
//! # ID Types
//!
//! - [`ProductId`]: Product identifier. Assigned externally, stored as a 32-bit `INTEGER`
//!   primary key, so anything that does not fit an `i32` can never match a row.

use std::str::FromStr;

pub type ProductId = i32;

/// Parse a raw path segment into a [`ProductId`].
///
/// The whole segment must be a base-10 integer: `"12abc"`, `" 12"` and `"1.5"` are all rejected.
pub fn parse_product_id(raw: &str) -> Option<ProductId> {
    ProductId::from_str(raw).ok()
}
