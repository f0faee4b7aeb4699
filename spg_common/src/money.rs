use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

//--------------------------------------     MinorUnits       --------------------------------------------------------
/// An amount of money expressed in the minor unit of its currency (cents, kobo, pesewa, ...).
///
/// Every currency handled by the gateway has two decimal places, so `MinorUnits(50_000)` is 500.00 KES.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// The fraction `basis_points / 10_000` of this amount, rounded up to the next minor unit.
    pub fn basis_points(&self, basis_points: u32) -> Self {
        let bps = i64::from(basis_points);
        Self((self.0 * bps + 9_999) / 10_000)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct AmountParseError(String);

/// Providers send amounts as decimal strings ("500", "500.5", "500.50", "3.000000"). Parse them into minor units.
///
/// Digits past the second decimal place are dropped, so an amount is never rounded up to more than was paid.
/// Amounts too large for [`MinorUnits`] are an error.
pub fn parse_decimal_amount(amount: &str) -> Result<MinorUnits, AmountParseError> {
    let amount = amount.trim();
    let (negative, digits) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };
    let mut parts = digits.split('.');
    let whole_digits = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| AmountParseError(amount.to_string()))?;
    if !whole_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountParseError(format!("Invalid amount: {amount}")));
    }
    let whole = whole_digits.parse::<i64>().map_err(|e| AmountParseError(format!("Invalid amount: {amount}. {e}.")))?;
    let cents = match parts.next() {
        None => 0,
        Some(frac) if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) => {
            return Err(AmountParseError(format!("Invalid fractional part in {amount}")));
        },
        Some(frac) => {
            let mut minor = frac.bytes().take(2).fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'));
            if frac.len() == 1 {
                minor *= 10;
            }
            minor
        },
    };
    if parts.next().is_some() {
        return Err(AmountParseError(format!("Invalid amount: {amount}")));
    }
    let value = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(|| AmountParseError(format!("{amount} is too large")))?;
    Ok(MinorUnits(if negative { -value } else { value }))
}
