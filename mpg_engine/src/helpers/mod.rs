//! Stateless building blocks of callback processing: authenticating the raw body, then normalizing the payload.
mod callback_auth;
mod payload_normalizer;

pub use callback_auth::{sign, CallbackAuth, SIGNATURE_HEADERS};
pub use payload_normalizer::{
    normalize,
    normalize_raw,
    FieldExtractor,
    NormalizationError,
    NormalizedNotification,
    OrderReference,
    AMOUNT_EXTRACTORS,
    GATEWAY_REFERENCE_EXTRACTORS,
    ORDER_ID_EXTRACTORS,
    PAYER_PHONE_EXTRACTORS,
    TRANSACTION_ID_EXTRACTORS,
};
