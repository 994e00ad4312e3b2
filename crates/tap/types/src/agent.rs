use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AgentAddress;

/// Identity permitted to act on a user's behalf.
///
/// Created once at registration and never deleted, only deactivated.
/// `private_key_ref` is local signing material (or a reference to it) and is
/// never sent to the ledger or any counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub address: AgentAddress,
    pub public_key: String,
    pub private_key_ref: String,
    pub owner: String,
    #[serde(default)]
    pub reputation_score: i64,
    pub registered_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub total_intents: u64,
    #[serde(default)]
    pub successful_txns: u64,
    #[serde(default)]
    pub failed_txns: u64,
    #[serde(default)]
    pub metadata_uri: String,
}

fn default_active() -> bool {
    true
}

impl Agent {
    /// A freshly registered agent with all counters at their defaults.
    pub fn new(
        address: AgentAddress,
        public_key: impl Into<String>,
        private_key_ref: impl Into<String>,
        owner: impl Into<String>,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            address,
            public_key: public_key.into(),
            private_key_ref: private_key_ref.into(),
            owner: owner.into(),
            reputation_score: 0,
            registered_at,
            is_active: true,
            total_intents: 0,
            successful_txns: 0,
            failed_txns: 0,
            metadata_uri: String::new(),
        }
    }

    pub fn with_metadata_uri(mut self, uri: impl Into<String>) -> Self {
        self.metadata_uri = uri.into();
        self
    }
}
