//! Request and response bodies. Database rows are converted here so the table layout can change
//! without touching the JSON contract.

pub mod images;
