use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of decimal places of the settlement token (USDC-style).
pub const TOKEN_DECIMALS: u32 = 6;

/// Base units in one whole token.
pub const UNITS_PER_TOKEN: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Represents a non-negative token quantity in base units.
///
/// Used for token balances, allowances and the ledger's running totals.
/// `Balance(1_000_000)` is one whole token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Balance(pub u128);

/// Represents a strictly positive token quantity in base units.
///
/// Every payment carries an `Amount`; a zero payment is rejected on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(u128);

impl Amount {
    pub fn new(units: u128) -> Result<Self> {
        if units > 0 {
            Ok(Self(units))
        } else {
            Err(LedgerError::InvalidAmount)
        }
    }

    pub fn units(&self) -> u128 {
        self.0
    }
}

impl TryFrom<u128> for Amount {
    type Error = LedgerError;

    fn try_from(units: u128) -> std::result::Result<Self, Self::Error> {
        Self::new(units)
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Balance(self.0).fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(units: u128) -> Self {
        Self(units)
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Parses a human-readable token quantity (e.g. `1.25`) into base units.
    ///
    /// Rejects negative values and anything finer than [`TOKEN_DECIMALS`] places.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::ValidationError(format!(
                "Token amount must not be negative: {value}"
            )));
        }
        let scaled = value
            .checked_mul(Decimal::from(UNITS_PER_TOKEN as u64))
            .ok_or_else(|| {
                LedgerError::ValidationError(format!("Token amount out of range: {value}"))
            })?;
        if !scaled.fract().is_zero() {
            return Err(LedgerError::ValidationError(format!(
                "Token amount has more than {TOKEN_DECIMALS} decimal places: {value}"
            )));
        }
        scaled.to_u128().map(Self).ok_or_else(|| {
            LedgerError::ValidationError(format!("Token amount out of range: {value}"))
        })
    }

    /// Converts base units back into a normalized decimal (`995000` -> `0.995`).
    pub fn to_decimal(self) -> Result<Decimal> {
        let units = i128::try_from(self.0).map_err(|_| LedgerError::Overflow)?;
        Decimal::try_from_i128_with_scale(units, TOKEN_DECIMALS)
            .map(|d| d.normalize())
            .map_err(|e| LedgerError::ValidationError(format!("Balance not representable: {e}")))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Ok(d) => write!(f, "{d}"),
            Err(_) => write!(f, "{} units", self.0),
        }
    }
}

// Unchecked arithmetic; ledger totals go through `checked_add`.
impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}
