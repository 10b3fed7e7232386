//! Monetary amounts: decimal parsing, minor-unit conversion, and bounds.
//!
//! Human input arrives as a decimal string (`"10.50"`). The network speaks
//! integer minor units at the asset's declared scale (`"1050"` for scale 2).
//! Conversion happens exactly once, with [`rust_decimal`]; after that every
//! comparison and every wire value is integer arithmetic. No floating point
//! is involved at any point.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// An integer minor-unit value that serializes as a string.
///
/// The payment network encodes amounts as string-encoded integers because
/// JSON consumers in loosely-typed runtimes cannot represent all 64-bit
/// integers without precision loss.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct MinorUnits(u64);

impl MinorUnits {
    /// Returns the inner integer value.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for MinorUnits {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MinorUnits> for u64 {
    fn from(value: MinorUnits) -> Self {
        value.0
    }
}

impl FromStr for MinorUnits {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MinorUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MinorUnits {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
    }
}

/// An amount as carried on the wire: integer minor units plus the asset
/// they are denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    /// String-encoded integer minor units.
    pub value: MinorUnits,
    /// Asset code (e.g., `"USD"`).
    pub asset_code: String,
    /// Number of fractional decimal digits.
    pub asset_scale: u8,
}

impl Amount {
    /// Converts a decimal amount into this asset's minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the amount is negative or does not
    /// fit the asset's minor-unit range.
    pub fn from_decimal(
        amount: Decimal,
        asset_code: impl Into<String>,
        asset_scale: u8,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            value: MinorUnits(to_minor_units(amount, asset_scale)?),
            asset_code: asset_code.into(),
            asset_scale,
        })
    }

    /// Returns the amount as a decimal at the asset's scale.
    #[must_use]
    pub fn as_decimal(&self) -> Decimal {
        from_minor_units(self.value.0, self.asset_scale)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_decimal(), self.asset_code)
    }
}

/// Converts a decimal amount to integer minor units at the given scale.
///
/// The result is `round(amount × 10^scale)` with midpoints rounded away
/// from zero, computed exactly in decimal arithmetic.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the amount is negative, the scale is
/// unrepresentable, or the scaled value overflows `u64`.
pub fn to_minor_units(amount: Decimal, scale: u8) -> Result<u64, ValidationError> {
    if amount.is_sign_negative() {
        return Err(ValidationError::new(format!(
            "amount must not be negative: {amount}"
        )));
    }
    let factor = 10u64
        .checked_pow(u32::from(scale))
        .ok_or_else(|| ValidationError::new(format!("unsupported asset scale: {scale}")))?;
    let scaled = amount
        .checked_mul(Decimal::from(factor))
        .ok_or_else(|| ValidationError::new(format!("amount out of range: {amount}")))?;
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| ValidationError::new(format!("amount out of range: {amount}")))
}

/// Converts integer minor units back to a decimal at the given scale.
#[must_use]
pub fn from_minor_units(minor: u64, scale: u8) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(minor), u32::from(scale))
}

/// Parses a human-entered amount string into a positive decimal.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the input is not a decimal number or is
/// not strictly positive.
pub fn parse_amount(input: &str) -> Result<Decimal, ValidationError> {
    let amount = Decimal::from_str(input.trim())
        .map_err(|_| ValidationError::new(format!("not a decimal amount: {input}")))?;
    if amount <= Decimal::ZERO {
        return Err(ValidationError::new(format!(
            "amount must be positive: {input}"
        )));
    }
    Ok(amount)
}

/// Configured minimum and maximum for a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountBounds {
    /// Smallest accepted amount.
    pub min: Decimal,
    /// Largest accepted amount.
    pub max: Decimal,
}

impl Default for AmountBounds {
    fn default() -> Self {
        Self {
            min: Decimal::new(1, 2),       // 0.01
            max: Decimal::new(100_000, 2), // 1000.00
        }
    }
}

impl AmountBounds {
    /// Checks an amount against the configured bounds.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the violated bound.
    pub fn check(&self, amount: Decimal) -> Result<(), ValidationError> {
        if amount < self.min {
            return Err(ValidationError::new(format!(
                "amount {amount} is below the minimum of {}",
                self.min
            )));
        }
        if amount > self.max {
            return Err(ValidationError::new(format!(
                "amount {amount} exceeds the maximum of {}",
                self.max
            )));
        }
        Ok(())
    }
}
