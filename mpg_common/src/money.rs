use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "KES";
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------        Money        ---------------------------------------------------------
/// A currency-agnostic amount, held as an integer number of minor units (cents).
///
/// Mobile-money gateways only ever deal in whole major units, so amounts are rounded with [`Money::round_to_major`]
/// before they are sent out. Everything stored and compared internally keeps the full minor-unit precision.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

/// Interprets the value as minor units.
impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / units, abs % units)
    }
}

/// Parses decimal strings such as `"680"`, `"680.5"` or `" 680.00 "`. Digits beyond the second decimal place are
/// rounded half away from zero.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || MoneyConversionError(format!("'{s}' is not a valid amount"));
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if !whole.bytes().all(|c| c.is_ascii_digit()) || !frac.bytes().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| err())? };
        let digits = frac.as_bytes();
        let digit = |i: usize| digits.get(i).map(|d| i64::from(d - b'0')).unwrap_or(0);
        let mut minor = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            minor += 1;
        }
        let value = whole.checked_mul(MINOR_UNITS_PER_MAJOR).and_then(|v| v.checked_add(minor)).ok_or_else(err)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_minor(value: i64) -> Self {
        Self(value)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS_PER_MAJOR)
    }

    /// Converts a floating point amount in major units, e.g. a JSON number such as `680.5`.
    pub fn try_from_major_f64(value: f64) -> Result<Self, MoneyConversionError> {
        if !value.is_finite() {
            return Err(MoneyConversionError(format!("{value} is not a finite number")));
        }
        let minor = (value * MINOR_UNITS_PER_MAJOR as f64).round();
        if minor.abs() >= i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(minor as i64))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs_diff(&self, other: Money) -> Money {
        Self((self.0 - other.0).abs())
    }

    /// Rounds to the nearest whole major unit, half away from zero.
    pub fn round_to_major(&self) -> i64 {
        let whole = self.0 / MINOR_UNITS_PER_MAJOR;
        let rem = self.0 % MINOR_UNITS_PER_MAJOR;
        if rem.abs() * 2 >= MINOR_UNITS_PER_MAJOR {
            whole + self.0.signum()
        } else {
            whole
        }
    }
}
