use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::AppError;
use crate::key_prefix;
use crate::session::{BoundSession, CookieMap, Session, SessionBinder};

/// Binds each request to its session and persists it before the response is returned.
///
/// Install with `axum::middleware::from_fn_with_state(binder, session_middleware)`.
/// Handlers reach the session through the [`Session`] extractor.
///
/// A store failure while loading fails the request with a 500. A failure
/// while persisting is logged and the response goes out unchanged.
pub async fn session_middleware(
    State(binder): State<SessionBinder>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if binder.should_ignore(&parts.headers) {
        parts.extensions.insert(Session::detached());
        return next.run(Request::from_parts(parts, body)).await;
    }

    let cookies = CookieMap::from_headers(&parts.headers);
    let bound = match binder.begin(&parts.headers, &cookies).await {
        Ok(bound) => bound,
        Err(e) => {
            log::error!(target: "sessiontoken", "msg=\"session load failed\", error=\"{e}\"");
            return AppError(e).into_response();
        }
    };

    parts.extensions.insert(bound.session());
    if let Some((name, value)) = token_header(&bound) {
        parts.headers.insert(name, value);
    }

    let mut response = next.run(Request::from_parts(parts, body)).await;
    expose_new_key(&bound, response.headers_mut());

    let key = bound.key().to_owned();
    if let Err(e) = bound.finalize().await {
        log::error!(
            target: "sessiontoken",
            "msg=\"session persist failed\", key=\"{}\", error=\"{e}\"",
            key_prefix(&key)
        );
    }

    response
}

fn token_header(bound: &BoundSession) -> Option<(HeaderName, HeaderValue)> {
    let (name, key) = bound.token_header()?;
    let name = HeaderName::try_from(name).ok()?;
    let value = HeaderValue::from_str(key).ok()?;
    Some((name, value))
}

fn expose_new_key(bound: &BoundSession, headers: &mut HeaderMap) {
    if let Some(cookie) = bound.set_cookie().and_then(|c| HeaderValue::from_str(c).ok()) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Some((name, value)) = token_header(bound) {
        headers.insert(name, value);
    }
}
