//! HTTP framework adapters.

mod types;

pub use types::ErrorResponse;

#[cfg(feature = "actix")]
pub mod actix;

#[cfg(feature = "axum_api")]
pub mod axum;
