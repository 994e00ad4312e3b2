//! TAP local persistence.
//!
//! The store mirrors agents and intents so that cheap local checks can run
//! before any ledger call. It is subordinate to the ledger: after a crash
//! between a ledger write and the mirror write it may lag, and nothing here
//! is relied on to prevent a double execution.
//!
//! Backends:
//! - [`memory::InMemoryTapStore`] for tests and ephemeral runs
//! - `sqlite::SqliteTapStore` (feature `sqlite`, on by default)

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod bootstrap;
pub mod memory;
mod model;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use bootstrap::{StoreConfig, StoreHandle};
pub use model::{AgentPatch, IntentPatch};
pub use tap_types::{StorageError, StorageResult};
pub use traits::{AgentStore, IntentStore, TapStore};
