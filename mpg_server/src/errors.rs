use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::*;
use mpesa_tools::MpesaApiError;
use mpg_engine::{LedgerError, ReconciliationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("Invalid input. {0}")]
    InvalidInput(String),
    #[error("{0}")]
    AmountMismatch(String),
    #[error("The callback signature is missing or invalid.")]
    SignatureInvalid,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
    #[error("The payment gateway refused the request. {0}")]
    GatewayRejected(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnavailable(String),
    #[error("The order ledger is busy. Please try again. {0}")]
    StorageConflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::AmountMismatch(_) => StatusCode::BAD_REQUEST,
            Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayUnavailable(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageConflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "success": false, "error": self.to_string() }).to_string())
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::Normalization(e) => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id} does not exist")),
            e @ ReconciliationError::AmountMismatch { .. } => Self::AmountMismatch(e.to_string()),
            ReconciliationError::StorageConflict(s) => Self::StorageConflict(s),
            ReconciliationError::InternalError(s) => Self::BackendError(s),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OrderAlreadyExists(_) | LedgerError::ChargeRequestAlreadyExists(_) => {
                Self::AlreadyExists(e.to_string())
            },
            LedgerError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id} does not exist")),
            LedgerError::InvalidOrder(s) => Self::InvalidInput(s),
            LedgerError::StorageConflict(s) => Self::StorageConflict(s),
            LedgerError::DatabaseError(s) => Self::BackendError(s),
        }
    }
}

impl From<MpesaApiError> for ServerError {
    fn from(e: MpesaApiError) -> Self {
        match e {
            MpesaApiError::InvalidAmount(_) | MpesaApiError::InvalidPhoneNumber(_) => Self::InvalidInput(e.to_string()),
            MpesaApiError::AuthError { .. } | MpesaApiError::GatewayRejected { .. } => {
                Self::GatewayRejected(e.to_string())
            },
            MpesaApiError::GatewayUnavailable(s) => Self::GatewayUnavailable(s),
            MpesaApiError::JsonError(_) => {
                warn!("📲️ The gateway sent a response we could not understand. {e}");
                Self::GatewayRejected(e.to_string())
            },
            MpesaApiError::Initialization(_) | MpesaApiError::Configuration(_) => {
                error!("📲️ The gateway client is misconfigured. {e}");
                Self::ConfigurationError(e.to_string())
            },
        }
    }
}
