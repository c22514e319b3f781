//! Stablecoin payment ledger for pay-per-call data tools.
//!
//! A payer approves the ledger's custody account on a token, then each
//! `process_payment` pulls the amount, splits off the platform fee, pays the
//! recipient and appends an auditable [`PaymentRecord`](domain::payment::PaymentRecord).

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
