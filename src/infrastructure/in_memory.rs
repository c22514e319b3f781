use crate::domain::amount::Balance;
use crate::domain::payment::{AddressTotals, PaymentId, PaymentRecord};
use crate::domain::ports::{LedgerStore, Token, TokenTransaction, TokenTransactionBox};
use crate::error::{LedgerError, Result};
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

#[derive(Default)]
struct LedgerState {
    log: Vec<PaymentId>,
    payments: HashMap<PaymentId, PaymentRecord>,
    totals: BTreeMap<Address, AddressTotals>,
}

/// A thread-safe in-memory payment ledger.
///
/// Clones share the same state. Commits happen under a single write lock, so
/// readers never see a record without its running-total updates.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit(&self, record: PaymentRecord) -> Result<()> {
        let mut state = self.state.write().await;

        if state.payments.contains_key(&record.id) {
            return Err(LedgerError::DuplicatePayment(record.id));
        }
        let expected = state.log.len() as u64;
        if record.sequence != expected {
            return Err(LedgerError::InternalError(
                format!(
                    "Out-of-order commit: sequence {} but log holds {}",
                    record.sequence, expected
                )
                .into(),
            ));
        }

        // Compute both totals before touching state so a failure leaves nothing behind.
        let spent = state
            .totals
            .get(&record.payer)
            .map_or(Balance::ZERO, |t| t.spent)
            .checked_add(record.amount.into())
            .ok_or(LedgerError::Overflow)?;
        let earned = state
            .totals
            .get(&record.recipient)
            .map_or(Balance::ZERO, |t| t.earned)
            .checked_add(record.recipient_amount)
            .ok_or(LedgerError::Overflow)?;

        state
            .totals
            .entry(record.payer)
            .or_insert_with(|| AddressTotals::new(record.payer))
            .spent = spent;
        state
            .totals
            .entry(record.recipient)
            .or_insert_with(|| AddressTotals::new(record.recipient))
            .earned = earned;
        state.log.push(record.id);
        state.payments.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state.payments.get(id).cloned())
    }

    async fn payment_count(&self) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.log.len() as u64)
    }

    async fn earnings(&self, address: Address) -> Result<Balance> {
        let state = self.state.read().await;
        Ok(state.totals.get(&address).map_or(Balance::ZERO, |t| t.earned))
    }

    async fn spending(&self, address: Address) -> Result<Balance> {
        let state = self.state.read().await;
        Ok(state.totals.get(&address).map_or(Balance::ZERO, |t| t.spent))
    }

    async fn all_totals(&self) -> Result<Vec<AddressTotals>> {
        let state = self.state.read().await;
        Ok(state.totals.values().copied().collect())
    }

    async fn payments(&self) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .log
            .iter()
            .filter_map(|id| state.payments.get(id).cloned())
            .collect())
    }
}

#[derive(Default, Clone)]
struct TokenState {
    balances: BTreeMap<Address, Balance>,
    allowances: HashMap<(Address, Address), Balance>,
}

impl TokenState {
    fn balance(&self, owner: Address) -> Balance {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn credit(&mut self, to: Address, amount: Balance) -> Result<()> {
        let balance = self.balances.entry(to).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Checks both sides before touching either, so a failed move changes nothing.
    fn move_funds(&mut self, from: Address, to: Address, amount: Balance) -> Result<()> {
        let balance = self.balance(from);
        let remaining = balance.checked_sub(amount).ok_or_else(|| {
            LedgerError::TransferFailed(format!(
                "insufficient balance: {from} holds {balance}, needs {amount}"
            ))
        })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(from, remaining);
        self.balances.insert(to, credited);
        Ok(())
    }

    fn move_allowed_funds(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()> {
        let allowed = self
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        let remaining = allowed.checked_sub(amount).ok_or_else(|| {
            LedgerError::TransferFailed(format!(
                "insufficient allowance: {spender} may spend {allowed} of {from}, needs {amount}"
            ))
        })?;
        self.move_funds(from, to, amount)?;
        self.allowances.insert((from, spender), remaining);
        Ok(())
    }
}

/// An in-process ERC-20 style token.
///
/// Balances and allowances live behind one `RwLock`. A [`TokenTransaction`]
/// holds the write half for its whole lifetime and works on a private copy,
/// so concurrent writers wait for it and a rollback only discards its own
/// movements.
#[derive(Default, Clone)]
pub struct InMemoryToken {
    state: Arc<RwLock<TokenState>>,
}

impl InMemoryToken {
    /// Creates a token with no holders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `to` out of thin air.
    pub async fn mint(&self, to: Address, amount: Balance) -> Result<()> {
        let mut state = self.state.write().await;
        state.credit(to, amount)?;
        tracing::debug!(%to, %amount, "minted");
        Ok(())
    }

    /// Every address that has ever held a balance, in address order.
    pub async fn holders(&self) -> Vec<Address> {
        let state = self.state.read().await;
        state.balances.keys().copied().collect()
    }
}

#[async_trait]
impl Token for InMemoryToken {
    async fn balance_of(&self, owner: Address) -> Result<Balance> {
        let state = self.state.read().await;
        Ok(state.balance(owner))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<Balance> {
        let state = self.state.read().await;
        Ok(state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, owner: Address, spender: Address, amount: Balance) -> Result<()> {
        let mut state = self.state.write().await;
        state.allowances.insert((owner, spender), amount);
        tracing::debug!(%owner, %spender, %amount, "approved");
        Ok(())
    }

    async fn transfer(&self, from: Address, to: Address, amount: Balance) -> Result<()> {
        let mut state = self.state.write().await;
        state.move_funds(from, to, amount)?;
        tracing::debug!(%from, %to, %amount, "transferred");
        Ok(())
    }

    async fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.move_allowed_funds(spender, from, to, amount)?;
        tracing::debug!(%spender, %from, %to, %amount, "transferred from");
        Ok(())
    }

    async fn begin(&self) -> Result<TokenTransactionBox> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTokenTransaction { guard, working }))
    }
}

/// Open transaction on an [`InMemoryToken`].
pub struct InMemoryTokenTransaction {
    guard: OwnedRwLockWriteGuard<TokenState>,
    working: TokenState,
}

#[async_trait]
impl TokenTransaction for InMemoryTokenTransaction {
    async fn balance_of(&self, owner: Address) -> Result<Balance> {
        Ok(self.working.balance(owner))
    }

    async fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<()> {
        self.working.move_funds(from, to, amount)?;
        tracing::debug!(%from, %to, %amount, "transferred (pending)");
        Ok(())
    }

    async fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<()> {
        self.working.move_allowed_funds(spender, from, to, amount)?;
        tracing::debug!(%spender, %from, %to, %amount, "transferred from (pending)");
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!("token transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::fee::FeeBps;
    use alloy_primitives::address;
    use chrono::Utc;

    const PAYER: Address = address!("1111111111111111111111111111111111111111");
    const RECIPIENT: Address = address!("2222222222222222222222222222222222222222");
    const CUSTODY: Address = address!("0000000000000000000000000000000000000402");

    fn record(sequence: u64, units: u128) -> PaymentRecord {
        let amount = Amount::new(units).unwrap();
        let fee = FeeBps::new(50).unwrap();
        let split = fee.split(amount).unwrap();
        let timestamp = Utc::now();
        PaymentRecord {
            id: PaymentId::derive(PAYER, RECIPIENT, amount, "maps", timestamp, sequence),
            sequence,
            payer: PAYER,
            recipient: RECIPIENT,
            amount,
            platform_fee: split.platform_fee,
            recipient_amount: split.recipient_amount,
            fee_bps: fee,
            tool_name: "maps".to_string(),
            service_id: "google-maps".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_in_memory_ledger_commit_and_totals() {
        let store = InMemoryLedgerStore::new();
        let first = record(0, 500_000);
        let second = record(1, 500_000);

        store.commit(first.clone()).await.unwrap();
        store.commit(second.clone()).await.unwrap();

        assert_eq!(store.payment_count().await.unwrap(), 2);
        assert_eq!(store.get(&first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(store.earnings(RECIPIENT).await.unwrap(), Balance(995_000));
        assert_eq!(store.spending(PAYER).await.unwrap(), Balance(1_000_000));
        assert_eq!(store.earnings(PAYER).await.unwrap(), Balance::ZERO);
        assert_eq!(store.payments().await.unwrap(), vec![first, second]);
        assert_eq!(store.all_totals().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_ledger_rejects_duplicate_id() {
        let store = InMemoryLedgerStore::new();
        let first = record(0, 1_000_000);
        store.commit(first.clone()).await.unwrap();

        let mut replay = first.clone();
        replay.sequence = 1;
        assert!(matches!(
            store.commit(replay).await,
            Err(LedgerError::DuplicatePayment(id)) if id == first.id
        ));
        assert_eq!(store.spending(PAYER).await.unwrap(), Balance(1_000_000));
    }

    #[tokio::test]
    async fn test_in_memory_ledger_rejects_sequence_gap() {
        let store = InMemoryLedgerStore::new();
        assert!(matches!(
            store.commit(record(3, 1_000_000)).await,
            Err(LedgerError::InternalError(_))
        ));
        assert_eq!(store.payment_count().await.unwrap(), 0);
        assert!(store.all_totals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_transfer_from_spends_allowance() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(2_000_000)).await.unwrap();
        token.approve(PAYER, CUSTODY, Balance(1_500_000)).await.unwrap();

        token
            .transfer_from(CUSTODY, PAYER, CUSTODY, Balance(1_000_000))
            .await
            .unwrap();

        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(1_000_000));
        assert_eq!(token.balance_of(CUSTODY).await.unwrap(), Balance(1_000_000));
        assert_eq!(token.allowance(PAYER, CUSTODY).await.unwrap(), Balance(500_000));
    }

    #[tokio::test]
    async fn test_token_rejects_insufficient_allowance_and_balance() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(100)).await.unwrap();
        token.approve(PAYER, CUSTODY, Balance(50)).await.unwrap();

        assert!(matches!(
            token.transfer_from(CUSTODY, PAYER, CUSTODY, Balance(60)).await,
            Err(LedgerError::TransferFailed(_))
        ));
        assert!(matches!(
            token.transfer(PAYER, RECIPIENT, Balance(101)).await,
            Err(LedgerError::TransferFailed(_))
        ));
        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(100));
        assert_eq!(token.allowance(PAYER, CUSTODY).await.unwrap(), Balance(50));
    }

    #[tokio::test]
    async fn test_token_transaction_rollback_discards_its_movements() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(1_000)).await.unwrap();
        token.approve(PAYER, CUSTODY, Balance(1_000)).await.unwrap();

        let mut tx = token.begin().await.unwrap();
        tx.transfer_from(CUSTODY, PAYER, CUSTODY, Balance(700))
            .await
            .unwrap();
        tx.transfer(CUSTODY, RECIPIENT, Balance(700)).await.unwrap();
        assert_eq!(tx.balance_of(RECIPIENT).await.unwrap(), Balance(700));
        tx.rollback().await.unwrap();

        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(1_000));
        assert_eq!(token.balance_of(RECIPIENT).await.unwrap(), Balance::ZERO);
        assert_eq!(token.allowance(PAYER, CUSTODY).await.unwrap(), Balance(1_000));
    }

    #[tokio::test]
    async fn test_token_transaction_commit_applies_movements() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(1_000)).await.unwrap();

        let mut tx = token.begin().await.unwrap();
        tx.transfer(PAYER, RECIPIENT, Balance(400)).await.unwrap();
        assert!(matches!(
            tx.transfer(PAYER, RECIPIENT, Balance(601)).await,
            Err(LedgerError::TransferFailed(_))
        ));
        tx.commit().await.unwrap();

        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(600));
        assert_eq!(token.balance_of(RECIPIENT).await.unwrap(), Balance(400));
        assert_eq!(token.holders().await, vec![PAYER, RECIPIENT]);
    }

    #[tokio::test]
    async fn test_token_dropped_transaction_is_discarded() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(1_000)).await.unwrap();
        {
            let mut tx = token.begin().await.unwrap();
            tx.transfer(PAYER, RECIPIENT, Balance(1_000)).await.unwrap();
        }
        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(1_000));
    }

    #[tokio::test]
    async fn test_token_writers_wait_for_open_transaction() {
        let token = InMemoryToken::new();
        token.mint(PAYER, Balance(1_000)).await.unwrap();

        let mut tx = token.begin().await.unwrap();
        tx.transfer(PAYER, RECIPIENT, Balance(500)).await.unwrap();

        let writer = token.clone();
        let mint = tokio::spawn(async move { writer.mint(CUSTODY, Balance(777)).await });
        tokio::task::yield_now().await;
        assert!(!mint.is_finished());

        tx.rollback().await.unwrap();
        mint.await.unwrap().unwrap();

        assert_eq!(token.balance_of(CUSTODY).await.unwrap(), Balance(777));
        assert_eq!(token.balance_of(PAYER).await.unwrap(), Balance(1_000));
        assert_eq!(token.balance_of(RECIPIENT).await.unwrap(), Balance::ZERO);
    }
}
