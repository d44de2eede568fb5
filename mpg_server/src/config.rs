use std::{env, net::IpAddr};

use log::*;
use mpesa_tools::MpesaConfig;
use mpg_common::{parse_boolean_flag, Money};
use mpg_engine::{helpers::CallbackAuth, ReconciliationOptions, DEFAULT_AMOUNT_TOLERANCE, DEFAULT_MAX_CONFLICT_RETRIES};

use crate::errors::ServerError;

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
const DEFAULT_MPG_DATABASE_URL: &str = "sqlite://data/mpg_store.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub callback: CallbackConfig,
    pub reconciliation: ReconciliationOptions,
    /// Gateway client configuration, used for charge initiation
    pub mpesa: MpesaConfig,
}

#[derive(Clone, Debug)]
pub struct CallbackConfig {
    pub auth: CallbackAuth,
    /// If supplied, requests against the callback endpoint will be checked against a whitelist of gateway IP
    /// addresses. To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl ServerConfig {
    /// Reads the configuration from the environment. Invalid values are replaced with defaults. The only fatal
    /// problem is a missing callback secret while callback signature checks are on.
    pub fn from_env_or_default() -> Result<Self, ServerError> {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = env::var("MPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPG_PORT. {e} Using the default, {DEFAULT_MPG_PORT}, instead."
                    );
                    DEFAULT_MPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPG_DATABASE_URL is not set. Using {DEFAULT_MPG_DATABASE_URL}.");
            DEFAULT_MPG_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MPG_USE_FORWARDED").ok(), false);
        let callback = CallbackConfig::try_from_env()?;
        let reconciliation = configure_reconciliation();
        let mpesa = MpesaConfig::new_from_env_or_default();
        Ok(Self { host, port, database_url, use_x_forwarded_for, use_forwarded, callback, reconciliation, mpesa })
    }
}

impl CallbackConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        Self::from_settings(
            env::var("MPG_CALLBACK_HMAC_CHECKS").ok(),
            env::var("MPG_CALLBACK_SECRET").ok(),
            env::var("MPG_CALLBACK_IP_WHITELIST").ok(),
        )
    }

    /// Builds the callback configuration from the raw setting values. Signature checks are on unless `hmac_checks`
    /// explicitly turns them off, so leaving every setting out is a configuration error.
    pub fn from_settings(
        hmac_checks: Option<String>,
        secret: Option<String>,
        whitelist: Option<String>,
    ) -> Result<Self, ServerError> {
        let hmac_checks = parse_boolean_flag(hmac_checks, true);
        let secret = secret.filter(|s| !s.trim().is_empty());
        let auth = callback_auth(hmac_checks, secret)?;
        let whitelist = whitelist.and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The callback IP whitelist was configured, but is empty. The server will run, but won't \
                     accept any payment callbacks."
                );
            },
            None => {
                info!("🪛️ No callback IP whitelist is set. Only signature validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Callback IP whitelist: {addrs}");
            },
        }
        Ok(Self { auth, whitelist })
    }
}

fn callback_auth(hmac_checks: bool, secret: Option<String>) -> Result<CallbackAuth, ServerError> {
    match (hmac_checks, secret) {
        (true, Some(secret)) => Ok(CallbackAuth::enforced(secret)),
        (true, None) => Err(ServerError::ConfigurationError(
            "MPG_CALLBACK_SECRET is not set. Set it to the secret the gateway signs callbacks with, or explicitly \
             disable callback signature checks with MPG_CALLBACK_HMAC_CHECKS=false."
                .to_string(),
        )),
        (false, _) => {
            warn!(
                "🚨️🚨️🚨️ Callback signature checks are DISABLED. Anyone can mark orders as paid. Never run a \
                 production server like this. 🚨️🚨️🚨️"
            );
            Ok(CallbackAuth::Disabled)
        },
    }
}

/// `none`, `false` and `0` disable the whitelist. Otherwise the value is a comma-separated list of IP addresses;
/// invalid entries are skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Callback IP whitelist is disabled. If this is not what you want, set MPG_CALLBACK_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in MPG_CALLBACK_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn configure_reconciliation() -> ReconciliationOptions {
    let amount_tolerance = env::var("MPG_AMOUNT_TOLERANCE")
        .map_err(|_| {
            info!("🪛️ MPG_AMOUNT_TOLERANCE is not set. Using the default value of {DEFAULT_AMOUNT_TOLERANCE}.")
        })
        .and_then(|s| {
            s.trim()
                .parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for MPG_AMOUNT_TOLERANCE. {e}"))
                .and_then(|v| {
                    if v < 0 {
                        warn!("🪛️ MPG_AMOUNT_TOLERANCE cannot be negative. Using the default.");
                        Err(())
                    } else {
                        Ok(Money::from(v))
                    }
                })
        })
        .ok()
        .unwrap_or(DEFAULT_AMOUNT_TOLERANCE);
    let max_conflict_retries = env::var("MPG_MAX_CONFLICT_RETRIES")
        .map_err(|_| {
            info!("🪛️ MPG_MAX_CONFLICT_RETRIES is not set. Using the default value of {DEFAULT_MAX_CONFLICT_RETRIES}.")
        })
        .and_then(|s| {
            s.trim()
                .parse::<u32>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for MPG_MAX_CONFLICT_RETRIES. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES);
    ReconciliationOptions { amount_tolerance, max_conflict_retries }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
