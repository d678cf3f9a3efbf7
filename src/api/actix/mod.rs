//! actix-web integration.
//!
//! ```rust,ignore
//! use actix_web::{App, web};
//! use sessiontoken::api::actix::SessionPersistence;
//! use sessiontoken::Session;
//!
//! async fn visits(session: Session) -> String {
//!     let count = session.get::<u64>("visits").unwrap_or(0) + 1;
//!     let _ = session.insert("visits", count);
//!     count.to_string()
//! }
//!
//! App::new()
//!     .wrap(SessionPersistence::new(binder.clone()))
//!     .route("/", web::get().to(visits))
//! ```

mod error;
mod extractor;
mod middleware;

pub use error::SessionRequestError;
pub use middleware::{SessionPersistence, SessionPersistenceMiddleware};
