use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use mpg_common::Secret;

pub const DEFAULT_COUNTRY_CODE: &str = "254";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("{other} is not a valid gateway environment")),
        }
    }
}

impl Display for MpesaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    /// Defaults to the environment's base url. Overriding it is mostly useful for pointing the client at a stub.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
    pub passkey: Secret<String>,
    /// The paybill or till number charges are made to.
    pub shortcode: String,
    /// Where the gateway should push the outcome of each charge.
    pub callback_url: String,
    /// Replaces the leading `0` of local-format phone numbers.
    pub country_code: String,
    pub transaction_type: String,
    /// Upper bound on each individual call to the gateway.
    pub timeout: Duration,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        let environment = MpesaEnvironment::default();
        Self {
            environment,
            base_url: environment.base_url().to_string(),
            consumer_key: String::default(),
            consumer_secret: Secret::default(),
            passkey: Secret::default(),
            shortcode: String::default(),
            callback_url: String::default(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            transaction_type: DEFAULT_TRANSACTION_TYPE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MpesaConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = env::var("MPG_MPESA_ENV")
            .ok()
            .and_then(|s| {
                s.parse::<MpesaEnvironment>().map_err(|e| warn!("📲️ {e}. Falling back to the sandbox.")).ok()
            })
            .unwrap_or_default();
        let base_url = env::var("MPG_MPESA_BASE_URL").unwrap_or_else(|_| environment.base_url().to_string());
        let consumer_key = env::var("MPG_MPESA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("📲️ MPG_MPESA_CONSUMER_KEY not set. Charge initiation will fail until it is configured.");
            String::default()
        });
        let consumer_secret = Secret::new(env::var("MPG_MPESA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("📲️ MPG_MPESA_CONSUMER_SECRET not set. Charge initiation will fail until it is configured.");
            String::default()
        }));
        let passkey = Secret::new(env::var("MPG_MPESA_PASSKEY").unwrap_or_else(|_| {
            warn!("📲️ MPG_MPESA_PASSKEY not set. Charge initiation will fail until it is configured.");
            String::default()
        }));
        let shortcode = env::var("MPG_MPESA_SHORTCODE").unwrap_or_else(|_| {
            warn!("📲️ MPG_MPESA_SHORTCODE not set. Charge initiation will fail until it is configured.");
            String::default()
        });
        let callback_url = env::var("MPG_MPESA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("📲️ MPG_MPESA_CALLBACK_URL not set. The gateway will not know where to send payment results.");
            String::default()
        });
        let country_code = env::var("MPG_MPESA_COUNTRY_CODE").unwrap_or_else(|_| DEFAULT_COUNTRY_CODE.to_string());
        let transaction_type =
            env::var("MPG_MPESA_TRANSACTION_TYPE").unwrap_or_else(|_| DEFAULT_TRANSACTION_TYPE.to_string());
        let timeout = env::var("MPG_MPESA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("📲️ Invalid value for MPG_MPESA_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_TIMEOUT);
        info!("📲️ Using the {environment} gateway at {base_url} with a {}s timeout", timeout.as_secs());
        Self {
            environment,
            base_url,
            consumer_key,
            consumer_secret,
            passkey,
            shortcode,
            callback_url,
            country_code,
            transaction_type,
            timeout,
        }
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
