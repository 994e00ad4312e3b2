//! TAP Ledger - the authoritative system of record behind intent authorization.
//!
//! The [`Ledger`] trait is the only way the rest of TAP touches ledger state.
//! Two implementations ship here:
//! - [`HttpLedgerClient`]: JSON client for a ledger bridge service
//! - [`InMemoryLedger`]: in-process reference ledger for local runs and tests
//!
//! "At most one execution per intent" is the ledger's guarantee, not the
//! caller's. Every implementation must apply state transitions atomically.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod http;
mod memory;
mod settlement;
mod traits;
mod types;

pub use http::HttpLedgerClient;
pub use memory::{InMemoryLedger, LedgerOp};
pub use settlement::SettlementAuthorization;
pub use tap_types::{LedgerError, LedgerResult};
pub use traits::Ledger;
pub use types::{IntentAccount, RecordIntentRequest, RecordedIntent};
