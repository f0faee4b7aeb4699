//! Bearer token middleware for the admin and service scopes.
//!
//! Requests must carry `Authorization: Bearer <token>` where `<token>` is one of the configured `SPG_ADMIN_TOKENS`.
//! Tokens are compared in constant time. A request without a matching token is refused with 401 before it reaches the
//! handler.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use spg_common::Secret;
use subtle::ConstantTimeEq;

use crate::errors::ServerError;

pub struct BearerAuthMiddlewareFactory {
    tokens: Rc<Vec<Secret<String>>>,
}

impl BearerAuthMiddlewareFactory {
    pub fn new(tokens: &[Secret<String>]) -> Self {
        BearerAuthMiddlewareFactory { tokens: Rc::new(tokens.iter().filter(|t| t.is_set()).cloned().collect()) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BearerAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthMiddlewareService { tokens: Rc::clone(&self.tokens), service: Rc::new(service) })
    }
}

pub struct BearerAuthMiddlewareService<S> {
    tokens: Rc<Vec<Secret<String>>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let tokens = Rc::clone(&self.tokens);
        Box::pin(async move {
            let presented = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .ok_or_else(|| {
                    debug!("💻️ No bearer token on request to {}", req.path());
                    ServerError::AuthenticationError("A bearer token is required".into())
                })?;
            if is_known_token(&tokens, presented) {
                service.call(req).await
            } else {
                warn!("💻️ Invalid bearer token presented for {}", req.path());
                Err(ServerError::AuthenticationError("Invalid bearer token".into()).into())
            }
        })
    }
}

fn is_known_token(tokens: &[Secret<String>], presented: &str) -> bool {
    // Every configured token is compared so the time taken does not depend on which one matched
    tokens.iter().fold(false, |found, token| found | bool::from(token.reveal().as_bytes().ct_eq(presented.as_bytes())))
}
