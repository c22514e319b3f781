//! Platform fee arithmetic.
//!
//! Fees are expressed in basis points (10000 bps = 100%) and always rounded
//! down, so the recipient receives any remainder of the integer division.

use super::amount::{Amount, Balance};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Hard ceiling for the platform fee (10%).
pub const MAX_FEE_BPS: u16 = 1_000;

/// Fee charged when nothing else is configured (0.5%).
pub const DEFAULT_FEE_BPS: u16 = 50;

/// A platform fee rate, guaranteed to be at most [`MAX_FEE_BPS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeBps(u16);

impl FeeBps {
    pub const ZERO: Self = Self(0);

    pub fn new(bps: u16) -> Result<Self> {
        if bps > MAX_FEE_BPS {
            Err(LedgerError::FeeTooHigh {
                requested: bps,
                max: MAX_FEE_BPS,
            })
        } else {
            Ok(Self(bps))
        }
    }

    pub fn bps(&self) -> u16 {
        self.0
    }

    /// Splits `amount` into the platform's cut and the recipient's share.
    pub fn split(&self, amount: Amount) -> Result<FeeSplit> {
        let platform_fee = amount
            .units()
            .checked_mul(u128::from(self.0))
            .ok_or(LedgerError::Overflow)?
            / BPS_DENOMINATOR;
        Ok(FeeSplit {
            platform_fee: Balance(platform_fee),
            recipient_amount: Balance(amount.units() - platform_fee),
        })
    }
}

impl Default for FeeBps {
    fn default() -> Self {
        Self(DEFAULT_FEE_BPS)
    }
}

impl TryFrom<u16> for FeeBps {
    type Error = LedgerError;

    fn try_from(bps: u16) -> std::result::Result<Self, Self::Error> {
        Self::new(bps)
    }
}

impl fmt::Display for FeeBps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.0)
    }
}

/// The result of applying a [`FeeBps`] to a payment amount.
///
/// `platform_fee + recipient_amount` always equals the original amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub platform_fee: Balance,
    pub recipient_amount: Balance,
}
