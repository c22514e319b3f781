#![allow(dead_code)]

use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const OWNER: &str = "0x9999999999999999999999999999999999999999";
pub const PLATFORM: &str = "0x3333333333333333333333333333333333333333";
pub const CUSTODY: &str = "0x0000000000000000000000000000000000000402";
pub const PAYER: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";
pub const HEADER: [&str; 6] = ["type", "caller", "target", "amount", "tool", "service"];

/// Writes `rows` under the command header into a temporary CSV file.
pub fn commands_file(rows: &[[&str; 6]]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    {
        let mut wtr = csv::Writer::from_writer(file.as_file_mut());
        wtr.write_record(HEADER).unwrap();
        for row in rows {
            wtr.write_record(row).unwrap();
        }
        wtr.flush().unwrap();
    }
    file.flush().unwrap();
    file
}

/// Standard CLI arguments: owner and platform account, default fee.
pub fn ledger_args() -> [&'static str; 4] {
    ["--owner", OWNER, "--platform-account", PLATFORM]
}

pub fn generate_csv(path: &Path, payments: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(HEADER)?;
    wtr.write_record(["mint", "", PAYER, "1000000", "", ""])?;
    wtr.write_record(["approve", PAYER, "", "1000000", "", ""])?;

    for _ in 0..payments {
        wtr.write_record(["pay", PAYER, RECIPIENT, "1.0", "maps.geocode", "google-maps"])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Fills `path` with roughly `size_mb` of payments spread over 50 recipients.
pub fn generate_large_csv(path: &Path, size_mb: usize) -> Result<(), Error> {
    use rand::Rng;

    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;
    wtr.write_record(["mint", "", PAYER, "1000000000", "", ""])?;
    wtr.write_record(["approve", PAYER, "", "1000000000", "", ""])?;

    let recipients: Vec<String> = (1..=50u8)
        .map(|i| format!("0x{}", format!("{i:02x}").repeat(20)))
        .collect();
    let mut rng = rand::thread_rng();
    let target_size = (size_mb * 1024 * 1024) as u64;

    // Check size every 5000 rows to avoid syscall overhead
    loop {
        for _ in 0..5000 {
            let recipient = &recipients[rng.gen_range(0..recipients.len())];
            let cents = rng.gen_range(1..=500u32);
            let amount = format!("{}.{:02}", cents / 100, cents % 100);
            wtr.write_record([
                "pay",
                PAYER,
                recipient.as_str(),
                amount.as_str(),
                "weather.current",
                "openweather",
            ])?;
        }
        wtr.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}
