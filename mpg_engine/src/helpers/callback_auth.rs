//! Authentication of inbound payment callbacks.
//!
//! The gateway signs each callback with HMAC-SHA256 over the exact bytes of the request body, using a secret shared
//! with us out of band, and sends the base64-encoded MAC in a header. Verification must happen on the raw body,
//! before anything in it is parsed or trusted.
use std::fmt::Debug;

use hmac::{Hmac, Mac};
use log::*;
use mpg_common::Secret;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Headers that may carry the callback signature, in order of preference.
pub const SIGNATURE_HEADERS: [&str; 2] = ["X-Mpesa-Signature", "X-Signature"];

/// How inbound callbacks are authenticated. This type has no `Default`; checks are only ever off when configured so.
#[derive(Clone)]
pub enum CallbackAuth {
    /// Every callback is accepted. Only for local development against a gateway sandbox that can't sign.
    Disabled,
    /// Callbacks must carry a valid HMAC-SHA256 signature made with the given secret.
    Enforced(Secret<String>),
}

impl Debug for CallbackAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackAuth::Disabled => write!(f, "CallbackAuth::Disabled"),
            CallbackAuth::Enforced(_) => write!(f, "CallbackAuth::Enforced(****)"),
        }
    }
}

impl CallbackAuth {
    pub fn enforced<S: Into<String>>(secret: S) -> Self {
        CallbackAuth::Enforced(Secret::new(secret.into()))
    }

    pub fn is_enforced(&self) -> bool {
        matches!(self, CallbackAuth::Enforced(_))
    }

    /// Returns `true` if the callback body may be trusted.
    ///
    /// With [`CallbackAuth::Enforced`], a missing header, a header that is not valid base64, or a MAC that does not
    /// match all return `false`. The comparison is constant-time.
    pub fn authenticate(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool {
        match self {
            CallbackAuth::Disabled => {
                warn!("🔐️ Callback signature checks are DISABLED. Accepting an unauthenticated callback.");
                true
            },
            CallbackAuth::Enforced(secret) => verify_signature(secret.reveal().as_bytes(), raw_body, signature_header),
        }
    }
}

/// Produces the header value a gateway holding `secret` would send with `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::default(),
    };
    mac.update(body);
    base64::encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &[u8], body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(header) = signature_header.map(str::trim).filter(|s| !s.is_empty()) else {
        debug!("🔐️ Callback has no signature header");
        return false;
    };
    let signature = match base64::decode(header) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("🔐️ Callback signature is not valid base64. {e}");
            return false;
        },
    };
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(e) => {
            error!("🔐️ Could not initialise HMAC with the callback secret. {e}");
            return false;
        },
    };
    mac.update(body);
    match mac.verify_slice(&signature) {
        Ok(()) => {
            trace!("🔐️ Callback signature is valid");
            true
        },
        Err(_) => {
            debug!("🔐️ Callback signature does not match");
            false
        },
    }
}
