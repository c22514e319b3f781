//! Domain layer: value objects, records, events and the ports the ledger depends on.

pub mod amount;
pub mod clock;
pub mod event;
pub mod fee;
pub mod payment;
pub mod ports;
