//! HMAC middleware for Actix Web.
//!
//! This module provides a middleware for Actix Web that checks the signature of incoming payment callbacks.
//!
//! The gateway signs the raw request body with HMAC-SHA256, using the shared `MPG_CALLBACK_SECRET` as the key, and
//! sends the base64-encoded MAC in the `X-Mpesa-Signature` (or `X-Signature`) header. The body is checked before any
//! handler gets to parse it, and is then put back into the request untouched.
//!
//! Wrap the callback scope with this middleware.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mpg_engine::helpers::{CallbackAuth, SIGNATURE_HEADERS};

use crate::errors::ServerError;

pub struct HmacMiddlewareFactory {
    auth: CallbackAuth,
}

impl HmacMiddlewareFactory {
    pub fn new(auth: CallbackAuth) -> Self {
        HmacMiddlewareFactory { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService { auth: self.auth.clone(), service: Rc::new(service) }))
    }
}

pub struct HmacMiddlewareService<S> {
    auth: CallbackAuth,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth = self.auth.clone();
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for request");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = SIGNATURE_HEADERS
                .iter()
                .find_map(|name| req.headers().get(*name))
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if auth.authenticate(data.as_ref(), signature.as_deref()) {
                trace!("🔐️ HMAC check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid or missing callback signature. Denying access.");
                Err(ServerError::SignatureInvalid.into())
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
