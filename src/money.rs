//! Money

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{
    Money, MoneyError,
    iso::{Currency, EUR, GBP, USD},
};
use thiserror::Error;

/// Monetary amount as reported by the store.
pub type Amount = Money<'static, Currency>;

/// Errors that can occur while converting between wire amounts and [`Amount`]s.
#[derive(Debug, Error, PartialEq)]
pub enum MoneyConversionError {
    /// Decimal amount cannot be represented in minor units.
    #[error("amount cannot be represented in minor units: {0}")]
    NotRepresentable(Decimal),

    /// Price string was not in the `AMOUNT CURRENCY` format.
    #[error("invalid price format: {0}")]
    InvalidPrice(String),

    /// Percentage string could not be parsed.
    #[error("invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Currency code is not supported.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Minor unit arithmetic overflowed.
    #[error("amount overflowed")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Looks up a supported ISO currency by its alpha code.
///
/// # Errors
///
/// Returns [`MoneyConversionError::UnknownCurrency`] for unsupported codes.
pub fn parse_currency(code: &str) -> Result<&'static Currency, MoneyConversionError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(MoneyConversionError::UnknownCurrency(other.to_string())),
    }
}

/// Convert a decimal major-unit amount (e.g. `12.5`) into an [`Amount`].
///
/// Amounts are rounded half away from zero to the nearest minor unit.
///
/// # Errors
///
/// Returns [`MoneyConversionError::NotRepresentable`] if the amount overflows minor units.
pub fn from_decimal(
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Amount, MoneyConversionError> {
    let minor_units = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .ok_or(MoneyConversionError::NotRepresentable(amount))?;

    Ok(Money::from_minor(minor_units, currency))
}

/// Parse a price string (e.g., `"2.99 GBP"`) into an [`Amount`].
///
/// # Errors
///
/// Returns an error if the string is not in the format `AMOUNT CURRENCY`, if the amount
/// cannot be parsed as a decimal, or if the currency code is not recognised.
pub fn parse_price(s: &str) -> Result<Amount, MoneyConversionError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(currency_code), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(MoneyConversionError::InvalidPrice(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| MoneyConversionError::InvalidPrice(s.to_string()))?;

    from_decimal(amount, parse_currency(currency_code)?)
}

/// Parse a percentage string (e.g., `"15%"` or `"0.15"`) into a `Percentage`.
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, MoneyConversionError> {
    let trimmed = s.trim();

    let (value, scale) = match trimmed.strip_suffix('%') {
        Some(percent_str) => (percent_str.trim(), Decimal::ONE_HUNDRED),
        None => (trimmed, Decimal::ONE),
    };

    let value = value
        .parse::<Decimal>()
        .map_err(|_err| MoneyConversionError::InvalidPercentage(s.to_string()))?;

    let fraction = value
        .checked_div(scale)
        .and_then(|fraction| fraction.to_f64())
        .ok_or_else(|| MoneyConversionError::InvalidPercentage(s.to_string()))?;

    Ok(Percentage::from(fraction))
}

/// Calculate a percentage of an amount given in minor units.
///
/// # Errors
///
/// Returns [`MoneyConversionError::Overflow`] if the calculation cannot be represented.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, MoneyConversionError> {
    let minor = Decimal::from_i64(minor).ok_or(MoneyConversionError::Overflow)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(MoneyConversionError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyConversionError::Overflow)
}

/// Multiply a unit price by a quantity.
///
/// # Errors
///
/// Returns [`MoneyConversionError::Overflow`] if the result overflows minor units.
pub fn line_total(unit_price: &Amount, quantity: u32) -> Result<Amount, MoneyConversionError> {
    let minor = unit_price
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(MoneyConversionError::Overflow)?;

    Ok(Money::from_minor(minor, unit_price.currency()))
}
