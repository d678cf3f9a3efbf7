#![allow(clippy::print_stdout, clippy::unwrap_used, clippy::expect_used)]

//! Session Server Example
//!
//! A small axum server keeping a per-visitor counter in a file-backed session.
//!
//! Run with: `cargo run --example session_server --features axum_api`
//!
//! Test endpoints:
//!   curl -X POST http://localhost:8080/visits -c cookies.txt -b cookies.txt
//!   curl http://localhost:8080/visits -b cookies.txt
//!   curl -X POST http://localhost:8080/visits -H "authToken: <key>"
//!   curl -X DELETE http://localhost:8080/visits -b cookies.txt

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use serde_json::json;
use sessiontoken::api::axum::{AppError, session_middleware};
use sessiontoken::{ExpiryConfig, FileSessionStore, Session, SessionBinder, SessionConfig};

async fn show(session: Session) -> axum::Json<serde_json::Value> {
    axum::Json(json!({
        "key": session.key(),
        "visits": session.get::<u64>("visits").unwrap_or(0),
    }))
}

async fn visit(session: Session) -> Result<axum::Json<serde_json::Value>, AppError> {
    let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
    session.insert("visits", visits)?;

    Ok(axum::Json(json!({ "visits": visits })))
}

async fn reset(session: Session) -> Result<(), AppError> {
    session.clear()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let path = std::env::var("SESSION_FILE").unwrap_or_else(|_| ".session".to_owned());
    let store = FileSessionStore::new(path, ExpiryConfig::default());
    println!("Storing sessions in {}", store.path().display());

    let config = SessionConfig {
        token: Some("authToken".to_owned()),
        ignore_header: Some("x-session-ignore".to_owned()),
        ..SessionConfig::with_cookie("auth")
    };
    let binder = SessionBinder::new(store, config).expect("valid session config");

    let app = Router::new()
        .route("/visits", get(show).post(visit).delete(reset))
        .layer(from_fn_with_state(binder, session_middleware));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .expect("bind 127.0.0.1:8080");

    println!("Listening on http://127.0.0.1:8080");
    axum::serve(listener, app).await.expect("server error");
}
