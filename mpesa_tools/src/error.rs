use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpesaApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid gateway configuration: {0}")]
    Configuration(String),
    #[error("Invalid charge amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),
    #[error("The gateway rejected our credentials. Error {status}. {message}")]
    AuthError { status: u16, message: String },
    #[error("The gateway rejected the charge request. Error {status}. {message}")]
    GatewayRejected { status: u16, message: String },
    #[error("The gateway could not be reached: {0}")]
    GatewayUnavailable(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl MpesaApiError {
    /// Input validation failures happen before anything is sent to the gateway.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::InvalidPhoneNumber(_))
    }
}

impl From<reqwest::Error> for MpesaApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::GatewayUnavailable(e.to_string())
    }
}
