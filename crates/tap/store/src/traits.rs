use crate::model::{AgentPatch, IntentPatch};
use crate::StorageResult;
use async_trait::async_trait;
use tap_types::{Agent, AgentAddress, Intent, IntentAddress, IntentHash};

/// Mirror of registered agents, keyed by ledger address.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Insert or fully replace the agent with the same address.
    async fn upsert_agent(&self, agent: Agent) -> StorageResult<()>;

    async fn get_agent(&self, address: &AgentAddress) -> StorageResult<Option<Agent>>;

    /// Merge the named fields and return the updated record.
    async fn update_agent(&self, address: &AgentAddress, patch: AgentPatch)
        -> StorageResult<Agent>;
}

/// Mirror of recorded intents, keyed by intent hash.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Insert or fully replace the intent with the same hash.
    ///
    /// An executed or revoked record only accepts replacements that keep its
    /// lifecycle flags, terms and execution reference.
    async fn upsert_intent(&self, intent: Intent) -> StorageResult<()>;

    async fn get_intent(&self, hash: &IntentHash) -> StorageResult<Option<Intent>>;

    /// Apply lifecycle flags and return the updated record.
    async fn update_intent(&self, hash: &IntentHash, patch: IntentPatch) -> StorageResult<Intent>;

    /// Remember which hash a ledger intent address belongs to.
    ///
    /// Re-indexing the same pair is a no-op; pointing a known address at a
    /// different hash is a conflict.
    async fn index_intent_address(
        &self,
        address: &IntentAddress,
        hash: &IntentHash,
    ) -> StorageResult<()>;

    async fn resolve_intent_address(
        &self,
        address: &IntentAddress,
    ) -> StorageResult<Option<IntentHash>>;
}

/// Store bundle handed to the intent manager and reputation tracker.
pub trait TapStore: AgentStore + IntentStore + Send + Sync {}

impl<T> TapStore for T where T: AgentStore + IntentStore + Send + Sync {}
