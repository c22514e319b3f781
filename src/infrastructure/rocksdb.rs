use crate::domain::amount::Balance;
use crate::domain::payment::{AddressTotals, PaymentId, PaymentRecord};
use crate::domain::ports::LedgerStore;
use crate::error::{LedgerError, Result};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment records, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping big-endian sequence numbers to payment ids.
pub const CF_SEQUENCE: &str = "sequence";
/// Column Family for per-address earnings.
pub const CF_EARNINGS: &str = "earnings";
/// Column Family for per-address spending.
pub const CF_SPENDING: &str = "spending";

/// A persistent ledger implementation using RocksDB.
///
/// Records, the sequence index and both running-total maps live in separate
/// Column Families. A commit writes all of them in one `WriteBatch`, so a
/// crash can never leave a record without its totals.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all ledger column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_PAYMENTS, CF_SEQUENCE, CF_EARNINGS, CF_SPENDING]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read_balance(&self, cf_name: &str, address: Address) -> Result<Balance> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, address.as_slice())? {
            Some(bytes) => decode_balance(&bytes),
            None => Ok(Balance::ZERO),
        }
    }

    fn count(&self) -> Result<u64> {
        let cf = self.cf(CF_SEQUENCE)?;
        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(decode_sequence(&key)? + 1)
            }
            None => Ok(0),
        }
    }

    fn read_record(&self, id: &PaymentId) -> Result<Option<PaymentRecord>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_pinned_cf(cf, id.as_slice())? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                LedgerError::InternalError(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Deserialization error: {e}"),
                )))
            }),
            None => Ok(None),
        }
    }
}

fn decode_balance(bytes: &[u8]) -> Result<Balance> {
    let raw: [u8; 16] = bytes.try_into().map_err(|_| {
        LedgerError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Expected a 16-byte balance, found {} bytes", bytes.len()),
        )))
    })?;
    Ok(Balance(u128::from_be_bytes(raw)))
}

fn decode_sequence(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        LedgerError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Expected an 8-byte sequence key, found {} bytes", bytes.len()),
        )))
    })?;
    Ok(u64::from_be_bytes(raw))
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn commit(&self, record: PaymentRecord) -> Result<()> {
        // Reads below must not interleave with another commit's batch.
        let _commit = self.commit_lock.lock().await;

        if self.read_record(&record.id)?.is_some() {
            return Err(LedgerError::DuplicatePayment(record.id));
        }
        let expected = self.count()?;
        if record.sequence != expected {
            return Err(LedgerError::InternalError(
                format!(
                    "Out-of-order commit: sequence {} but log holds {}",
                    record.sequence, expected
                )
                .into(),
            ));
        }

        let spent = self
            .read_balance(CF_SPENDING, record.payer)?
            .checked_add(record.amount.into())
            .ok_or(LedgerError::Overflow)?;
        let earned = self
            .read_balance(CF_EARNINGS, record.recipient)?
            .checked_add(record.recipient_amount)
            .ok_or(LedgerError::Overflow)?;

        let value = serde_json::to_vec(&record).map_err(|e| {
            LedgerError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {e}"),
            )))
        })?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_PAYMENTS)?, record.id.as_slice(), value);
        batch.put_cf(
            self.cf(CF_SEQUENCE)?,
            record.sequence.to_be_bytes(),
            record.id.as_slice(),
        );
        batch.put_cf(
            self.cf(CF_SPENDING)?,
            record.payer.as_slice(),
            spent.units().to_be_bytes(),
        );
        batch.put_cf(
            self.cf(CF_EARNINGS)?,
            record.recipient.as_slice(),
            earned.units().to_be_bytes(),
        );
        self.db.write(batch)?;

        Ok(())
    }

    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentRecord>> {
        self.read_record(id)
    }

    async fn payment_count(&self) -> Result<u64> {
        self.count()
    }

    async fn earnings(&self, address: Address) -> Result<Balance> {
        self.read_balance(CF_EARNINGS, address)
    }

    async fn spending(&self, address: Address) -> Result<Balance> {
        self.read_balance(CF_SPENDING, address)
    }

    async fn all_totals(&self) -> Result<Vec<AddressTotals>> {
        let mut totals: BTreeMap<Address, AddressTotals> = BTreeMap::new();

        for cf_name in [CF_EARNINGS, CF_SPENDING] {
            let iter = self.db.iterator_cf(self.cf(cf_name)?, IteratorMode::Start);
            for item in iter {
                let (key, value) = item?;
                let raw: [u8; 20] = key.as_ref().try_into().map_err(|e| {
                    LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                        "Corrupt address key: {e}"
                    ))))
                })?;
                let address = Address::from(raw);
                let balance = decode_balance(&value)?;
                let entry = totals
                    .entry(address)
                    .or_insert_with(|| AddressTotals::new(address));
                if cf_name == CF_EARNINGS {
                    entry.earned = balance;
                } else {
                    entry.spent = balance;
                }
            }
        }

        Ok(totals.into_values().collect())
    }

    async fn payments(&self) -> Result<Vec<PaymentRecord>> {
        let mut records = Vec::new();
        let iter = self.db.iterator_cf(self.cf(CF_SEQUENCE)?, IteratorMode::Start);

        for item in iter {
            let (_sequence, id_bytes) = item?;
            let raw: [u8; 32] = id_bytes.as_ref().try_into().map_err(|e| {
                LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                    "Corrupt payment id: {e}"
                ))))
            })?;
            let id = PaymentId(B256::from(raw));
            let record = self.read_record(&id)?.ok_or_else(|| {
                LedgerError::InternalError(Box::new(std::io::Error::other(format!(
                    "Sequence index points at missing payment {id}"
                ))))
            })?;
            records.push(record);
        }

        Ok(records)
    }
}
