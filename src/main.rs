use alloy_primitives::Address;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use x402_ledger::application::processor::{PaymentProcessor, ProcessorConfig};
use x402_ledger::domain::amount::Balance;
use x402_ledger::domain::fee::DEFAULT_FEE_BPS;
use x402_ledger::domain::ports::{LedgerStoreBox, Token};
use x402_ledger::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryToken};
#[cfg(feature = "storage-rocksdb")]
use x402_ledger::infrastructure::rocksdb::RocksDBStore;
use x402_ledger::interfaces::csv::command_reader::{Command, CommandReader};
use x402_ledger::interfaces::csv::payment_writer::PaymentWriter;
use x402_ledger::interfaces::csv::summary_writer::{AccountSummary, SummaryWriter};

const DEFAULT_CUSTODY: &str = "0x0000000000000000000000000000000000000402";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Administrative identity allowed to change fees and sweep custody
    #[arg(long, env = "LEDGER_OWNER")]
    owner: Address,

    /// Account receiving platform fees. Defaults to the owner.
    #[arg(long, env = "LEDGER_PLATFORM_ACCOUNT")]
    platform_account: Option<Address>,

    /// The ledger's own token account; payers approve it as spender
    #[arg(long, env = "LEDGER_CUSTODY", default_value = DEFAULT_CUSTODY)]
    custody: Address,

    /// Platform fee in basis points (at most 1000)
    #[arg(long, env = "LEDGER_FEE_BPS", default_value_t = DEFAULT_FEE_BPS)]
    fee_bps: u16,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    ///
    /// Only payment records and earnings/spending totals persist. Token
    /// balances, allowances and custody start empty on every run.
    #[arg(long, env = "LEDGER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Also write the payment log to this CSV file
    #[arg(long)]
    payments_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let token = InMemoryToken::new();
    let config = ProcessorConfig {
        owner: cli.owner,
        platform_account: cli.platform_account.unwrap_or(cli.owner),
        custody: cli.custody,
        fee_bps: cli.fee_bps,
    };
    let store = open_store(cli.db_path)?;
    let processor = PaymentProcessor::new(config, Arc::new(token.clone()), store)?;
    tracing::info!(
        owner = %config.owner,
        platform_account = %config.platform_account,
        custody = %config.custody,
        fee_bps = config.fee_bps,
        "ledger ready"
    );

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = apply(&processor, &token, command).await {
                    tracing::warn!("Error processing command: {e}");
                }
            }
            Err(e) => {
                tracing::warn!("Error reading command: {e}");
            }
        }
    }

    if let Some(path) = cli.payments_out {
        let payments = processor.payments().await?;
        let file = File::create(path).into_diagnostic()?;
        PaymentWriter::new(file).write_payments(&payments)?;
    }

    // Output final state
    let summaries = collect_summaries(&processor, &token).await?;
    let stdout = io::stdout();
    let mut writer = SummaryWriter::new(stdout.lock());
    writer.write_summaries(summaries)?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        Some(path) => Ok(Box::new(RocksDBStore::open(path)?)),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Box::new(InMemoryLedgerStore::new()))
}

async fn apply(
    processor: &PaymentProcessor,
    token: &InMemoryToken,
    command: Command,
) -> x402_ledger::error::Result<()> {
    match command {
        Command::Mint { to, amount } => token.mint(to, amount).await,
        Command::Approve { owner, amount } => {
            token.approve(owner, processor.custody(), amount).await
        }
        Command::Pay {
            payer,
            recipient,
            amount,
            tool,
            service,
        } => processor
            .process_payment(payer, recipient, amount.units(), &tool, &service)
            .await
            .map(|_| ()),
        Command::SetFee { caller, fee_bps } => processor.update_fee(caller, fee_bps).await,
        Command::SetPlatform { caller, account } => {
            processor.update_platform_account(caller, account).await
        }
        Command::TransferOwnership { caller, new_owner } => {
            processor.transfer_ownership(caller, new_owner).await
        }
        Command::Withdraw { caller } => processor.emergency_withdraw(caller).await.map(|_| ()),
    }
}

/// Joins token balances with ledger totals for every address either side knows.
async fn collect_summaries(
    processor: &PaymentProcessor,
    token: &InMemoryToken,
) -> x402_ledger::error::Result<Vec<AccountSummary>> {
    let mut summaries: BTreeMap<Address, AccountSummary> = BTreeMap::new();

    for totals in processor.totals().await? {
        summaries.insert(
            totals.address,
            AccountSummary {
                address: totals.address,
                balance: Balance::ZERO,
                earned: totals.earned,
                spent: totals.spent,
            },
        );
    }
    for address in token.holders().await {
        summaries.entry(address).or_insert(AccountSummary {
            address,
            balance: Balance::ZERO,
            earned: Balance::ZERO,
            spent: Balance::ZERO,
        });
    }
    for summary in summaries.values_mut() {
        summary.balance = token.balance_of(summary.address).await?;
    }

    Ok(summaries.into_values().collect())
}
