use crate::domain::amount::Balance;
use crate::error::Result;
use alloy_primitives::Address;
use serde::Serialize;
use std::io::Write;

/// Final state of one address: token balance plus ledger running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSummary {
    pub address: Address,
    pub balance: Balance,
    pub earned: Balance,
    pub spent: Balance,
}

#[derive(Serialize)]
struct SummaryRow {
    address: String,
    balance: String,
    earned: String,
    spent: String,
}

impl TryFrom<&AccountSummary> for SummaryRow {
    type Error = crate::error::LedgerError;

    fn try_from(summary: &AccountSummary) -> Result<Self> {
        Ok(Self {
            address: summary.address.to_string(),
            balance: summary.balance.to_decimal()?.to_string(),
            earned: summary.earned.to_decimal()?.to_string(),
            spent: summary.spent.to_decimal()?.to_string(),
        })
    }
}

/// Writes per-address summaries as CSV (`address,balance,earned,spent`).
pub struct SummaryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the summaries sorted by address and flushes the sink.
    pub fn write_summaries(&mut self, mut summaries: Vec<AccountSummary>) -> Result<()> {
        summaries.sort_by_key(|s| s.address);
        if summaries.is_empty() {
            self.writer
                .write_record(["address", "balance", "earned", "spent"])?;
        }
        for summary in &summaries {
            self.writer.serialize(SummaryRow::try_from(summary)?)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
