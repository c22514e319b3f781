use crate::domain::amount::Balance;
use crate::error::{LedgerError, Result};
use alloy_primitives::Address;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    Mint,
    Approve,
    Pay,
    SetFee,
    SetPlatform,
    TransferOwnership,
    Withdraw,
}

/// One raw CSV row: `type, caller, target, amount, tool, service`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub r#type: CommandType,
    pub caller: Option<String>,
    pub target: Option<String>,
    pub amount: Option<Decimal>,
    pub tool: Option<String>,
    pub service: Option<String>,
}

/// A validated ledger command.
///
/// Token quantities are in base units; `Pay` keeps a zero amount so the
/// processor can reject it with its own error.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Mint {
        to: Address,
        amount: Balance,
    },
    Approve {
        owner: Address,
        amount: Balance,
    },
    Pay {
        payer: Address,
        recipient: Address,
        amount: Balance,
        tool: String,
        service: String,
    },
    SetFee {
        caller: Address,
        fee_bps: u16,
    },
    SetPlatform {
        caller: Address,
        account: Address,
    },
    TransferOwnership {
        caller: Address,
        new_owner: Address,
    },
    Withdraw {
        caller: Address,
    },
}

impl TryFrom<CommandRecord> for Command {
    type Error = LedgerError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.r#type;
        let caller = || required_address(kind, "caller", record.caller.as_deref());
        let target = || required_address(kind, "target", record.target.as_deref());
        let amount = || {
            record
                .amount
                .ok_or_else(|| missing(kind, "amount"))
                .and_then(Balance::from_decimal)
        };

        Ok(match kind {
            CommandType::Mint => Command::Mint {
                to: target()?,
                amount: amount()?,
            },
            CommandType::Approve => Command::Approve {
                owner: caller()?,
                amount: amount()?,
            },
            CommandType::Pay => Command::Pay {
                payer: caller()?,
                recipient: target()?,
                amount: amount()?,
                tool: record.tool.clone().unwrap_or_default(),
                service: record.service.clone().unwrap_or_default(),
            },
            CommandType::SetFee => Command::SetFee {
                caller: caller()?,
                fee_bps: record
                    .amount
                    .ok_or_else(|| missing(kind, "amount"))
                    .and_then(to_bps)?,
            },
            CommandType::SetPlatform => Command::SetPlatform {
                caller: caller()?,
                account: target()?,
            },
            CommandType::TransferOwnership => Command::TransferOwnership {
                caller: caller()?,
                new_owner: target()?,
            },
            CommandType::Withdraw => Command::Withdraw { caller: caller()? },
        })
    }
}

fn missing(kind: CommandType, field: &str) -> LedgerError {
    LedgerError::ValidationError(format!("{kind:?} requires a {field}"))
}

fn required_address(kind: CommandType, field: &str, value: Option<&str>) -> Result<Address> {
    let raw = value.ok_or_else(|| missing(kind, field))?;
    Address::from_str(raw)
        .map_err(|e| LedgerError::ValidationError(format!("Invalid {field} address {raw:?}: {e}")))
}

fn to_bps(value: Decimal) -> Result<u16> {
    if !value.fract().is_zero() {
        return Err(LedgerError::ValidationError(format!(
            "Fee must be a whole number of basis points: {value}"
        )));
    }
    value
        .to_u16()
        .ok_or_else(|| LedgerError::ValidationError(format!("Fee out of range: {value}")))
}

/// Reads ledger commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads, deserializes and validates commands.
    ///
    /// This allows for processing large files in a streaming fashion without loading
    /// the entire dataset into memory.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map_err(LedgerError::from)
                .and_then(|record: CommandRecord| Command::try_from(record))
        })
    }
}
