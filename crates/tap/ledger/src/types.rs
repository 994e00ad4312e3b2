use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tap_types::{AgentAddress, Amount, IntentAddress, IntentHash, IntentState};

/// Input to [`crate::Ledger::record_intent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIntentRequest {
    pub agent: AgentAddress,
    pub hash: IntentHash,
    pub max_amount: Amount,
    pub action: String,
    pub ttl_seconds: i64,
}

/// Ledger acknowledgement of a newly recorded intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedIntent {
    pub address: IntentAddress,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The ledger's view of one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentAccount {
    pub address: IntentAddress,
    pub hash: IntentHash,
    pub agent: AgentAddress,
    pub max_amount: Amount,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub executed: bool,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub execution_ref: Option<String>,
}

impl IntentAccount {
    pub fn state(&self) -> IntentState {
        IntentState {
            max_amount: self.max_amount,
            expires_at: self.expires_at,
            executed: self.executed,
            revoked: self.revoked,
        }
    }
}
