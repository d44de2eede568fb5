use chrono::{DateTime, Utc};
use mpg_common::Money;

use crate::MpesaApiError;

/// Gateway timestamps are `YYYYMMDDHHMMSS`, good to the second.
pub fn gateway_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// The STK password is `base64(shortcode ‖ passkey ‖ timestamp)`. The same timestamp must be sent alongside it.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Converts a local-format phone number into the international format the gateway expects.
///
/// Spaces, dashes and a leading `+` are dropped, and a leading `0` is replaced with `country_code`. The result must be
/// all digits and between 9 and 15 digits long.
pub fn normalize_phone(phone: &str, country_code: &str) -> Result<String, MpesaApiError> {
    let cleaned = phone.trim().chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')')).collect::<String>();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let international = match cleaned.strip_prefix('0') {
        Some(local) => format!("{country_code}{local}"),
        None => cleaned.to_string(),
    };
    let valid = (9..=15).contains(&international.len()) && international.bytes().all(|b| b.is_ascii_digit());
    if valid {
        Ok(international)
    } else {
        Err(MpesaApiError::InvalidPhoneNumber(format!("'{phone}' cannot be converted to international format")))
    }
}

/// Gateways charge in whole units. Amounts are rounded to the nearest unit and must still be positive afterwards.
pub fn gateway_amount(amount: Money) -> Result<i64, MpesaApiError> {
    let units = amount.round_to_major();
    if units > 0 {
        Ok(units)
    } else {
        Err(MpesaApiError::InvalidAmount(format!("{amount} rounds to {units}, which cannot be charged")))
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn phone_numbers() {
        assert_eq!(normalize_phone("0712345678", "254").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254 712-345-678", "254").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254712345678", "254").unwrap(), "254712345678");
        assert!(normalize_phone("07123abc78", "254").is_err());
        assert!(normalize_phone("0712", "254").is_err());
        assert!(normalize_phone("", "254").is_err());
    }

    #[test]
    fn timestamps_and_passwords() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let ts = gateway_timestamp(t);
        assert_eq!(ts, "20240309070501");
        let password = stk_password("174379", "passkey", &ts);
        assert_eq!(base64::decode(password).unwrap(), b"174379passkey20240309070501");
    }

    #[test]
    fn amounts_are_rounded() {
        assert_eq!(gateway_amount(Money::from(68_049)).unwrap(), 680);
        assert_eq!(gateway_amount(Money::from(68_050)).unwrap(), 681);
        assert!(gateway_amount(Money::from(49)).is_err());
        assert!(gateway_amount(Money::from(-10_000)).is_err());
    }
}
