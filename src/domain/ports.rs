use super::amount::Balance;
use super::payment::{AddressTotals, PaymentId, PaymentRecord};
use crate::error::Result;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

/// Append-only storage for payment records and the per-address running totals.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends `record` and adds it to the payer's spending and the recipient's
    /// earnings in a single atomic write.
    ///
    /// Fails if the id is already present or if `record.sequence` is not the
    /// next position in the log.
    async fn commit(&self, record: PaymentRecord) -> Result<()>;
    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>>;
    async fn payment_count(&self) -> Result<u64>;
    async fn earnings(&self, address: Address) -> Result<Balance>;
    async fn spending(&self, address: Address) -> Result<Balance>;
    async fn all_totals(&self) -> Result<Vec<AddressTotals>>;
    /// All records in sequence order.
    async fn payments(&self) -> Result<Vec<PaymentRecord>>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// The value-movement substrate: an ERC-20 style token.
///
/// Movements that must apply together go through a [`TokenTransaction`]
/// opened with [`begin`](Token::begin).
#[async_trait]
pub trait Token: Send + Sync {
    async fn balance_of(&self, owner: Address) -> Result<Balance>;
    async fn allowance(&self, owner: Address, spender: Address) -> Result<Balance>;
    async fn approve(&self, owner: Address, spender: Address, amount: Balance) -> Result<()>;
    async fn transfer(&self, from: Address, to: Address, amount: Balance) -> Result<()>;
    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance.
    async fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()>;
    /// Opens a transaction. No other write to the token is applied until it
    /// commits or rolls back.
    async fn begin(&self) -> Result<TokenTransactionBox>;
}

pub type TokenBox = Arc<dyn Token>;

/// A batch of token movements that apply together or not at all.
///
/// Dropping a transaction without committing it discards its movements.
#[async_trait]
pub trait TokenTransaction: Send + Sync {
    /// Balance as seen inside the transaction.
    async fn balance_of(&self, owner: Address) -> Result<Balance>;
    async fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<()>;
    async fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

pub type TokenTransactionBox = Box<dyn TokenTransaction>;
