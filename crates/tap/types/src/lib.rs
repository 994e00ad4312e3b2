//! TAP Types - shared vocabulary for intent-scoped agent authorization.
//!
//! An [`Agent`] acts on a user's behalf only under an [`Intent`]: a bounded,
//! time-limited authorization identified by a unique [`IntentHash`]. The
//! remote ledger owns the truth for both; this crate only defines the shapes
//! and the pure rules every component agrees on.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod agent;
mod clock;
mod errors;
mod ids;
mod intent;

pub use agent::Agent;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{LedgerError, LedgerResult, StorageError, StorageResult, TapError, TapResult};
pub use ids::{AgentAddress, IntentAddress, IntentHash};
pub use intent::{Intent, IntentState, IntentStatus};

/// Smallest unit of value movable under an intent (lamports on the reference ledger).
pub type Amount = u64;
