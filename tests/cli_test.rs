use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg("tests/fixtures/payments.csv").args(common::ledger_args());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("address,balance,earned,spent"))
        // Custody ends empty
        .stdout(predicate::str::contains(
            "0x0000000000000000000000000000000000000402,0,0,0",
        ))
        // Payer: 10 minted, 1.5 spent
        .stdout(predicate::str::contains(
            "0x1111111111111111111111111111111111111111,8.5,0,1.5",
        ))
        // Recipient: 0.995 + 0.4975
        .stdout(predicate::str::contains(
            "0x2222222222222222222222222222222222222222,1.4925,1.4925,0",
        ))
        // Platform: 0.005 + 0.0025
        .stdout(predicate::str::contains(
            "0x3333333333333333333333333333333333333333,0.0075,0,0",
        ));

    Ok(())
}

#[test]
fn test_cli_platform_defaults_to_owner() {
    let file = common::commands_file(&[
        ["mint", "", common::PAYER, "1.0", "", ""],
        ["approve", common::PAYER, "", "1.0", "", ""],
        ["pay", common::PAYER, common::RECIPIENT, "1.0", "maps", "google-maps"],
    ]);

    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg(file.path()).arg("--owner").arg(common::OWNER);

    cmd.assert().success().stdout(predicate::str::contains(
        "0x9999999999999999999999999999999999999999,0.005,0,0",
    ));
}

#[test]
fn test_cli_reads_settings_from_env() {
    let file = common::commands_file(&[
        ["mint", "", common::PAYER, "1.0", "", ""],
        ["approve", common::PAYER, "", "1.0", "", ""],
        ["pay", common::PAYER, common::RECIPIENT, "1.0", "maps", "google-maps"],
    ]);

    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg(file.path())
        .env("LEDGER_OWNER", common::OWNER)
        .env("LEDGER_PLATFORM_ACCOUNT", common::PLATFORM)
        .env("LEDGER_FEE_BPS", "1000");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "0x2222222222222222222222222222222222222222,0.9,0.9,0",
        ))
        .stdout(predicate::str::contains(
            "0x3333333333333333333333333333333333333333,0.1,0,0",
        ));
}

#[test]
fn test_cli_rejects_fee_above_ceiling() {
    let file = common::commands_file(&[]);

    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg(file.path())
        .args(common::ledger_args())
        .arg("--fee-bps")
        .arg("1001");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("exceeds the 1000 bps ceiling"));
}

#[test]
fn test_cli_writes_payment_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("payments.csv");

    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg("tests/fixtures/payments.csv")
        .args(common::ledger_args())
        .arg("--payments-out")
        .arg(&log_path);
    cmd.assert().success();

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,sequence,timestamp,payer,recipient,amount"));
    assert!(lines[1].contains(",0,"));
    assert!(lines[1].ends_with(",1,0.005,0.995,50,maps.geocode,google-maps"));
    assert!(lines[2].ends_with(",0.5,0.0025,0.4975,50,weather.current,openweather"));
}

#[test]
fn test_cli_help_explains_what_persists() {
    let mut cmd = Command::new(cargo_bin!("x402-ledger"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "Only payment records and earnings/spending totals persist",
        ))
        .stdout(predicate::str::contains(
            "custody start empty on every run",
        ));
}
