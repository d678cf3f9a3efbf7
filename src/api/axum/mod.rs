//! axum integration.
//!
//! ```rust,ignore
//! use axum::{Router, middleware, routing::get};
//! use sessiontoken::api::axum::session_middleware;
//! use sessiontoken::Session;
//!
//! async fn visits(session: Session) -> String {
//!     let count = session.get::<u64>("visits").unwrap_or(0) + 1;
//!     let _ = session.insert("visits", count);
//!     count.to_string()
//! }
//!
//! let app = Router::new()
//!     .route("/", get(visits))
//!     .layer(middleware::from_fn_with_state(binder, session_middleware));
//! ```

mod error;
mod extractor;
mod middleware;

pub use error::AppError;
pub use middleware::session_middleware;
