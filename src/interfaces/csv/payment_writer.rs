use crate::domain::payment::PaymentRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

const HEADER: [&str; 11] = [
    "id",
    "sequence",
    "timestamp",
    "payer",
    "recipient",
    "amount",
    "platform_fee",
    "recipient_amount",
    "fee_bps",
    "tool",
    "service",
];

#[derive(Serialize)]
struct PaymentRow<'a> {
    id: String,
    sequence: u64,
    timestamp: String,
    payer: String,
    recipient: String,
    amount: String,
    platform_fee: String,
    recipient_amount: String,
    fee_bps: u16,
    tool: &'a str,
    service: &'a str,
}

/// Writes the payment log as CSV, one row per record in sequence order.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: &[PaymentRecord]) -> Result<()> {
        self.writer.write_record(HEADER)?;
        for record in payments {
            self.writer.serialize(PaymentRow {
                id: record.id.to_string(),
                sequence: record.sequence,
                timestamp: record.timestamp.to_rfc3339(),
                payer: record.payer.to_string(),
                recipient: record.recipient.to_string(),
                amount: record.amount.to_string(),
                platform_fee: record.platform_fee.to_decimal()?.to_string(),
                recipient_amount: record.recipient_amount.to_decimal()?.to_string(),
                fee_bps: record.fee_bps.bps(),
                tool: &record.tool_name,
                service: &record.service_id,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
