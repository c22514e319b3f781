//! Application layer containing the payment ledger.
//!
//! `PaymentProcessor` is the entry point for processing payments and for the
//! owner-only administrative operations. It serializes mutating operations
//! through a `ReentrancyGuard` and pushes committed changes to subscribers over
//! a `tokio` broadcast channel.

pub mod guard;
pub mod processor;
