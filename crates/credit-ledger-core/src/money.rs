//! Amount, phone number, and date-range value types.
//!
//! Balances and amounts are fixed-point decimals with two fraction digits.
//! Anything crossing into the ledger goes through [`validate_amount`] or
//! [`PhoneNumber::parse`] first; the ledger itself never sees malformed input.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Number of fraction digits carried by every stored amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Exclusive upper bound for a single amount (10 digits, 2 of them fractional).
pub const MAX_AMOUNT_UNITS: i64 = 100_000_000;

/// Shortest accepted phone number, in digits.
pub const MIN_PHONE_DIGITS: usize = 7;

/// Longest accepted phone number, in digits (E.164).
pub const MAX_PHONE_DIGITS: usize = 15;

/// Validate a request amount and return it rescaled to two fraction digits.
///
/// # Errors
///
/// Returns `LedgerError::Validation` if the amount is not positive, carries
/// more than two fraction digits, or is too large.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::Validation(format!(
            "amount has more than {AMOUNT_SCALE} fraction digits: {amount}"
        )));
    }
    if amount >= Decimal::from(MAX_AMOUNT_UNITS) {
        return Err(LedgerError::Validation(format!(
            "amount exceeds the maximum of {MAX_AMOUNT_UNITS}: {amount}"
        )));
    }
    Ok(to_ledger_scale(amount))
}

/// Rescale a value to the ledger's two fraction digits.
#[must_use]
pub fn to_ledger_scale(mut value: Decimal) -> Decimal {
    value.rescale(AMOUNT_SCALE);
    value
}

/// A destination phone number for a charge.
///
/// Accepts an optional leading `+` followed only by digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse and validate a phone number.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` if the input is not a plausible
    /// phone number.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::Validation(format!(
                "malformed phone number: {input:?}"
            )));
        }
        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
            return Err(LedgerError::Validation(format!(
                "phone number must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits: {input:?}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Return the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A half-open time window `[from, until)` used to filter listings.
///
/// Either bound may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    /// A range covering all time.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            from: None,
            until: None,
        }
    }

    /// A range between two instants.
    #[must_use]
    pub const fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn amount_is_rescaled_to_two_digits() {
        let amount = validate_amount(dec("30")).unwrap();
        assert_eq!(amount.scale(), 2);
        assert_eq!(amount.to_string(), "30.00");

        // trailing zeros beyond two digits are fine
        assert_eq!(validate_amount(dec("12.500")).unwrap().to_string(), "12.50");
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            validate_amount(dec("-0.01")),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn sub_cent_and_oversized_amounts_are_rejected() {
        assert!(validate_amount(dec("0.001")).is_err());
        assert!(validate_amount(dec("100000000.00")).is_err());
        assert!(validate_amount(dec("99999999.99")).is_ok());
        assert!(validate_amount(dec("0.01")).is_ok());
    }

    #[test]
    fn phone_number_validation() {
        assert!(PhoneNumber::parse("09121234567").is_ok());
        assert!(PhoneNumber::parse("+989121234567").is_ok());
        assert!(PhoneNumber::parse("").is_err());
        assert!(PhoneNumber::parse("0912-123-4567").is_err());
        assert!(PhoneNumber::parse("123").is_err());
        assert!(PhoneNumber::parse("1234567890123456").is_err());
    }

    #[test]
    fn phone_number_rejected_during_deserialization() {
        let result: std::result::Result<PhoneNumber, _> = serde_json::from_str("\"abc\"");
        assert!(result.is_err());
    }
}
