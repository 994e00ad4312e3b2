use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Where `verify_intent` may read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Ledger only; ledger failures surface to the caller.
    #[default]
    LedgerOnly,
    /// Degraded mode: answer from the local mirror when the ledger is
    /// unreachable or times out.
    AllowMirrorFallback,
}

/// Intent manager configuration.
#[derive(Debug, Clone)]
pub struct IntentManagerConfig {
    /// Applied to every individual ledger call.
    pub ledger_timeout: Duration,
    pub read_mode: ReadMode,
}

impl Default for IntentManagerConfig {
    fn default() -> Self {
        Self {
            ledger_timeout: DEFAULT_LEDGER_TIMEOUT,
            read_mode: ReadMode::LedgerOnly,
        }
    }
}

/// Score deltas applied by [`crate::ReputationTracker::record_outcome`].
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub success_delta: i64,
    pub failure_delta: i64,
    pub ledger_timeout: Duration,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            success_delta: 5,
            failure_delta: -10,
            ledger_timeout: DEFAULT_LEDGER_TIMEOUT,
        }
    }
}
