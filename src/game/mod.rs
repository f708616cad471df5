//! Game actions on top of the chain gateway
//!
//! The service:
//! 1. Answers read-only game queries
//! 2. Runs start / join / move / withdraw / cancel as submit-then-confirm actions
//! 3. Keeps receipts of transactions still being confirmed

pub mod receipts;
pub mod service;

pub use service::{ActionOutcome, GameService};
