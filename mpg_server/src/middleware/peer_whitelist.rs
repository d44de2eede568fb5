//! Callback peer filtering.
//!
//! Use [`check_callback_peer`] with `wrap_fn` on the callback scope. Register it after the HMAC middleware so that
//! the peer is checked before the body is read.
use std::net::IpAddr;

use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse},
    Error,
};
use futures::{
    future::{ok, LocalBoxFuture},
    FutureExt,
};

use crate::{
    config::ServerOptions,
    errors::ServerError,
    helpers::{get_remote_ip, is_whitelisted},
};

/// Passes the request on to `srv` if the remote peer is on the whitelist (or there is no whitelist). Otherwise the
/// request is answered with `403 Forbidden` and `srv` is never called.
pub fn check_callback_peer<S, B>(
    req: ServiceRequest,
    srv: &S,
    whitelist: Option<&[IpAddr]>,
    options: ServerOptions,
) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    let peer_ip = get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded);
    if is_whitelisted(peer_ip, whitelist) {
        srv.call(req).map(|res| res.map(ServiceResponse::map_into_left_body)).boxed_local()
    } else {
        ok(req.error_response(ServerError::ForbiddenPeer).map_into_right_body()).boxed_local()
    }
}
