//! CSV command input and summary/audit output.

pub mod command_reader;
pub mod payment_writer;
pub mod summary_writer;
