//! TAP Intent - the authorization lifecycle for autonomous agents.
//!
//! A caller records an intent (bounded amount, action, time to live) before
//! acting, attaches a signed request and/or the intent address to the guarded
//! action, then settles or revokes the intent. Outcomes feed the agent's
//! reputation.
//!
//! Every operation runs its local invariant checks first and returns early,
//! without touching the ledger, when a violation is detectable locally. The
//! ledger remains the source of truth; the local store is a mirror that may
//! lag after a partial failure.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod bounded;
mod config;
mod manager;
mod registry;
mod reputation;

pub use config::{IntentManagerConfig, ReadMode, ReputationConfig, DEFAULT_LEDGER_TIMEOUT};
pub use manager::{ExecuteIntent, IntentManager, RecordIntent};
pub use registry::{AgentRegistry, RegisterAgent};
pub use reputation::{ReputationReason, ReputationTracker};
