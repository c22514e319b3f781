use super::guard::ReentrancyGuard;
use crate::domain::amount::{Amount, Balance};
use crate::domain::clock::{ClockBox, SystemClock};
use crate::domain::event::LedgerEvent;
use crate::domain::fee::{FeeBps, FeeSplit};
use crate::domain::payment::{AddressTotals, PaymentId, PaymentRecord};
use crate::domain::ports::{LedgerStoreBox, TokenBox, TokenTransactionBox};
use crate::error::{LedgerError, Result};
use alloy_primitives::Address;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the event channel; slow subscribers lag instead of blocking payments.
const EVENT_CAPACITY: usize = 256;

/// Startup settings of a [`PaymentProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// The administrative identity allowed to change settings.
    pub owner: Address,
    /// Receives the platform fee of every payment.
    pub platform_account: Address,
    /// The processor's own token account; payers approve it as spender.
    pub custody: Address,
    pub fee_bps: u16,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    owner: Address,
    platform_account: Address,
    fee: FeeBps,
}

/// The payment ledger.
///
/// `PaymentProcessor` moves a payment from the payer through its custody
/// account, pays the platform fee and the recipient, and records the result.
/// It owns its token and storage backends; every mutating operation runs
/// under a [`ReentrancyGuard`], so operations are applied one at a time and
/// each one either completes fully or leaves no trace.
pub struct PaymentProcessor {
    token: TokenBox,
    store: LedgerStoreBox,
    clock: ClockBox,
    custody: Address,
    settings: RwLock<Settings>,
    guard: ReentrancyGuard,
    events: broadcast::Sender<LedgerEvent>,
}

impl PaymentProcessor {
    /// Creates a new `PaymentProcessor` using the system clock.
    ///
    /// # Arguments
    ///
    /// * `config` - Owner, platform account, custody account and initial fee.
    /// * `token` - The token payments are made in.
    /// * `store` - The store for payment records and running totals.
    pub fn new(config: ProcessorConfig, token: TokenBox, store: LedgerStoreBox) -> Result<Self> {
        if [config.owner, config.platform_account, config.custody].contains(&Address::ZERO) {
            return Err(LedgerError::InvalidAccount);
        }
        let fee = FeeBps::new(config.fee_bps)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            token,
            store,
            clock: Box::new(SystemClock),
            custody: config.custody,
            settings: RwLock::new(Settings {
                owner: config.owner,
                platform_account: config.platform_account,
                fee,
            }),
            guard: ReentrancyGuard::new(),
            events,
        })
    }

    /// Replaces the clock used to timestamp payments.
    pub fn with_clock(mut self, clock: ClockBox) -> Self {
        self.clock = clock;
        self
    }

    /// Subscribes to events published after each committed state change.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Processes a payment of `amount` base units from `caller` to `recipient`.
    ///
    /// The caller must have approved [`custody`](Self::custody) for at least
    /// `amount`. On success the payment is recorded and its id returned; on
    /// failure token balances and the ledger are left exactly as they were.
    pub async fn process_payment(
        &self,
        caller: Address,
        recipient: Address,
        amount: u128,
        tool_name: &str,
        service_id: &str,
    ) -> Result<PaymentId> {
        self.guard
            .run(async {
                if recipient == Address::ZERO {
                    return Err(LedgerError::InvalidRecipient);
                }
                let amount = Amount::new(amount)?;
                let settings = *self.settings.read().await;
                let split = settings.fee.split(amount)?;

                let mut tx = self.token.begin().await?;
                let record = match self
                    .settle(
                        &mut tx, caller, recipient, amount, split, settings, tool_name, service_id,
                    )
                    .await
                {
                    Ok(record) => record,
                    Err(e) => return Err(unwind(tx, e).await),
                };
                if let Err(e) = tx.commit().await {
                    // The record is already committed; it stays authoritative.
                    tracing::error!(
                        id = %record.id,
                        error = %e,
                        "token commit failed after the payment was recorded"
                    );
                }

                tracing::info!(
                    id = %record.id,
                    sequence = record.sequence,
                    payer = %record.payer,
                    recipient = %record.recipient,
                    amount = %record.amount,
                    platform_fee = %record.platform_fee,
                    tool = %record.tool_name,
                    service = %record.service_id,
                    "payment processed"
                );
                let id = record.id;
                self.publish(LedgerEvent::PaymentProcessed { record });
                Ok(id)
            })
            .await
    }

    /// Token movements plus the ledger commit. The movements only become
    /// visible once `tx` commits.
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        tx: &mut TokenTransactionBox,
        caller: Address,
        recipient: Address,
        amount: Amount,
        split: FeeSplit,
        settings: Settings,
        tool_name: &str,
        service_id: &str,
    ) -> Result<PaymentRecord> {
        tx.transfer_from(self.custody, caller, self.custody, amount.into())
            .await
            .map_err(into_transfer_failure)?;

        if !split.platform_fee.is_zero() {
            tx.transfer(self.custody, settings.platform_account, split.platform_fee)
                .await
                .map_err(into_transfer_failure)?;
        }

        tx.transfer(self.custody, recipient, split.recipient_amount)
            .await
            .map_err(into_transfer_failure)?;

        let timestamp = self.clock.now();
        let sequence = self.store.payment_count().await?;
        let record = PaymentRecord {
            id: PaymentId::derive(caller, recipient, amount, tool_name, timestamp, sequence),
            sequence,
            payer: caller,
            recipient,
            amount,
            platform_fee: split.platform_fee,
            recipient_amount: split.recipient_amount,
            fee_bps: settings.fee,
            tool_name: tool_name.to_string(),
            service_id: service_id.to_string(),
            timestamp,
        };
        self.store.commit(record.clone()).await?;
        Ok(record)
    }

    /// Total amount `address` has received as a recipient, net of fees.
    pub async fn earnings(&self, address: Address) -> Result<Balance> {
        self.store.earnings(address).await
    }

    /// Total amount `address` has paid, fees included.
    pub async fn spending(&self, address: Address) -> Result<Balance> {
        self.store.spending(address).await
    }

    pub async fn payment(&self, id: &PaymentId) -> Result<Option<PaymentRecord>> {
        self.store.get(id).await
    }

    /// The full payment log in sequence order.
    pub async fn payments(&self) -> Result<Vec<PaymentRecord>> {
        self.store.payments().await
    }

    pub async fn totals(&self) -> Result<Vec<AddressTotals>> {
        self.store.all_totals().await
    }

    /// What a payment of `amount` would be split into at the current fee.
    pub async fn preview_split(&self, amount: u128) -> Result<FeeSplit> {
        let amount = Amount::new(amount)?;
        self.settings.read().await.fee.split(amount)
    }

    pub async fn fee_bps(&self) -> FeeBps {
        self.settings.read().await.fee
    }

    pub async fn platform_account(&self) -> Address {
        self.settings.read().await.platform_account
    }

    pub async fn owner(&self) -> Address {
        self.settings.read().await.owner
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    /// Sets the platform fee. Owner only; at most 1000 bps.
    pub async fn update_fee(&self, caller: Address, new_fee_bps: u16) -> Result<()> {
        self.guard
            .run(async {
                let mut settings = self.settings.write().await;
                ensure_owner(&settings, caller)?;
                let new = FeeBps::new(new_fee_bps)?;
                let old = std::mem::replace(&mut settings.fee, new);
                drop(settings);

                tracing::info!(%old, %new, "fee updated");
                self.publish(LedgerEvent::FeeUpdated { old, new });
                Ok(())
            })
            .await
    }

    /// Redirects future platform fees. Owner only.
    pub async fn update_platform_account(&self, caller: Address, new_account: Address) -> Result<()> {
        self.guard
            .run(async {
                let mut settings = self.settings.write().await;
                ensure_owner(&settings, caller)?;
                if new_account == Address::ZERO {
                    return Err(LedgerError::InvalidAccount);
                }
                let old = std::mem::replace(&mut settings.platform_account, new_account);
                drop(settings);

                tracing::info!(%old, new = %new_account, "platform account updated");
                self.publish(LedgerEvent::PlatformAccountUpdated {
                    old,
                    new: new_account,
                });
                Ok(())
            })
            .await
    }

    /// Hands the administrative role to `new_owner`. Owner only.
    pub async fn transfer_ownership(&self, caller: Address, new_owner: Address) -> Result<()> {
        self.guard
            .run(async {
                let mut settings = self.settings.write().await;
                ensure_owner(&settings, caller)?;
                if new_owner == Address::ZERO {
                    return Err(LedgerError::InvalidAccount);
                }
                let old = std::mem::replace(&mut settings.owner, new_owner);
                drop(settings);

                tracing::info!(%old, new = %new_owner, "ownership transferred");
                self.publish(LedgerEvent::OwnershipTransferred {
                    old,
                    new: new_owner,
                });
                Ok(())
            })
            .await
    }

    /// Sweeps whatever is left in custody to the owner and returns the amount.
    ///
    /// Payments never leave funds in custody, so this only recovers tokens sent
    /// to the custody account directly.
    pub async fn emergency_withdraw(&self, caller: Address) -> Result<Balance> {
        self.guard
            .run(async {
                let owner = {
                    let settings = self.settings.read().await;
                    ensure_owner(&settings, caller)?;
                    settings.owner
                };

                let mut tx = self.token.begin().await?;
                let stuck = tx.balance_of(self.custody).await?;
                if stuck.is_zero() {
                    tx.rollback().await?;
                    return Ok(Balance::ZERO);
                }
                if let Err(e) = tx.transfer(self.custody, owner, stuck).await {
                    return Err(unwind(tx, into_transfer_failure(e)).await);
                }
                tx.commit().await?;

                tracing::warn!(to = %owner, amount = %stuck, "emergency withdrawal");
                self.publish(LedgerEvent::EmergencyWithdrawal {
                    to: owner,
                    amount: stuck,
                });
                Ok(stuck)
            })
            .await
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn ensure_owner(settings: &Settings, caller: Address) -> Result<()> {
    if caller == settings.owner {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized)
    }
}

/// Rolls `tx` back after `cause`. A failed rollback is reported instead of
/// `cause`, since the token may then hold part of the movements.
async fn unwind(tx: TokenTransactionBox, cause: LedgerError) -> LedgerError {
    tracing::warn!(error = %cause, "operation failed, rolling back token movements");
    match tx.rollback().await {
        Ok(()) => cause,
        Err(e) => {
            tracing::error!(error = %e, "token rollback failed");
            LedgerError::InternalError(
                format!(
                    "{cause}; rolling back the token also failed ({e}), balances may be partially applied"
                )
                .into(),
            )
        }
    }
}

fn into_transfer_failure(e: LedgerError) -> LedgerError {
    match e {
        LedgerError::TransferFailed(_) => e,
        other => LedgerError::TransferFailed(other.to_string()),
    }
}
