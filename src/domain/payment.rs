use super::amount::{Amount, Balance};
use super::fee::{FeeBps, FeeSplit};
use alloy_primitives::{Address, B256, U256, keccak256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a processed payment: a keccak-256 hash over its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub B256);

impl PaymentId {
    /// Derives the id from the packed encoding of the payment inputs.
    ///
    /// The layout follows Solidity's `abi.encodePacked(payer, recipient,
    /// amount, toolName, timestamp, sequence)`: raw 20-byte addresses,
    /// 32-byte big-endian integers and the tool name's UTF-8 bytes. The
    /// sequence number keeps two otherwise identical payments in the same
    /// second from colliding.
    pub fn derive(
        payer: Address,
        recipient: Address,
        amount: Amount,
        tool_name: &str,
        timestamp: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        let mut packed = Vec::with_capacity(20 + 20 + 32 + tool_name.len() + 32 + 32);
        packed.extend_from_slice(payer.as_slice());
        packed.extend_from_slice(recipient.as_slice());
        packed.extend_from_slice(&U256::from(amount.units()).to_be_bytes::<32>());
        packed.extend_from_slice(tool_name.as_bytes());
        packed.extend_from_slice(&U256::from(timestamp.timestamp().max(0) as u64).to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(sequence).to_be_bytes::<32>());
        Self(keccak256(&packed))
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable entry of the payment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    /// Position in the append-only log, starting at zero.
    pub sequence: u64,
    pub payer: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub platform_fee: Balance,
    pub recipient_amount: Balance,
    pub fee_bps: FeeBps,
    pub tool_name: String,
    pub service_id: String,
    pub timestamp: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn split(&self) -> FeeSplit {
        FeeSplit {
            platform_fee: self.platform_fee,
            recipient_amount: self.recipient_amount,
        }
    }
}

/// Running totals of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTotals {
    pub address: Address,
    /// Sum of `recipient_amount` over payments received.
    pub earned: Balance,
    /// Sum of `amount` over payments made.
    pub spent: Balance,
}

impl AddressTotals {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            earned: Balance::ZERO,
            spent: Balance::ZERO,
        }
    }
}
