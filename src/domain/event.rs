use super::amount::Balance;
use super::fee::FeeBps;
use super::payment::PaymentRecord;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Notifications published by the payment processor after a state change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    PaymentProcessed { record: PaymentRecord },
    FeeUpdated { old: FeeBps, new: FeeBps },
    PlatformAccountUpdated { old: Address, new: Address },
    OwnershipTransferred { old: Address, new: Address },
    EmergencyWithdrawal { to: Address, amount: Balance },
}
