mod hmac;
mod peer_whitelist;

pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService};
pub use peer_whitelist::check_callback_peer;
