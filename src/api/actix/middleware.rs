use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    HttpMessage, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use futures::future::{LocalBoxFuture, Ready, ok};

use super::error::SessionRequestError;
use crate::key_prefix;
use crate::session::{BoundSession, CookieMap, Session, SessionBinder};

/// Session persistence middleware for actix-web.
///
/// Loads the session before the handler runs and writes it back once the
/// handler has produced a response. Handlers take [`Session`] as an extractor.
#[derive(Clone)]
pub struct SessionPersistence {
    binder: SessionBinder,
}

impl SessionPersistence {
    #[must_use]
    pub fn new(binder: SessionBinder) -> Self {
        Self { binder }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionPersistence
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = SessionPersistenceMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionPersistenceMiddleware {
            service: Rc::new(service),
            binder: self.binder.clone(),
        })
    }
}

pub struct SessionPersistenceMiddleware<S> {
    service: Rc<S>,
    binder: SessionBinder,
}

impl<S, B> Service<ServiceRequest> for SessionPersistenceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        if self.binder.should_ignore(req.headers()) {
            req.extensions_mut().insert(Session::detached());
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let service = Rc::clone(&self.service);
        let binder = self.binder.clone();

        Box::pin(async move {
            let cookies = CookieMap::parse(
                req.headers()
                    .get_all(header::COOKIE)
                    .filter_map(|value| value.to_str().ok()),
            );

            let bound = match binder.begin(req.headers(), &cookies).await {
                Ok(bound) => bound,
                Err(e) => {
                    log::error!(target: "sessiontoken", "msg=\"session load failed\", error=\"{e}\"");
                    let response = SessionRequestError::from(e).error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            req.extensions_mut().insert(bound.session());
            if let Some((name, value)) = token_header(&bound) {
                req.headers_mut().insert(name, value);
            }

            let mut res = service.call(req).await?;
            expose_new_key(&bound, res.headers_mut());

            let key = bound.key().to_owned();
            if let Err(e) = bound.finalize().await {
                log::error!(
                    target: "sessiontoken",
                    "msg=\"session persist failed\", key=\"{}\", error=\"{e}\"",
                    key_prefix(&key)
                );
            }

            Ok(res.map_into_left_body())
        })
    }
}

fn token_header(bound: &BoundSession) -> Option<(HeaderName, HeaderValue)> {
    let (name, key) = bound.token_header()?;
    let name = HeaderName::try_from(name).ok()?;
    let value = HeaderValue::from_str(key).ok()?;
    Some((name, value))
}

fn expose_new_key(bound: &BoundSession, headers: &mut HeaderMap) {
    if let Some(cookie) = bound.set_cookie().and_then(|c| HeaderValue::from_str(c).ok()) {
        headers.append(header::SET_COOKIE, cookie);
    }
    if let Some((name, value)) = token_header(bound) {
        headers.insert(name, value);
    }
}
