use crate::settlement::SettlementAuthorization;
use crate::types::{IntentAccount, RecordIntentRequest, RecordedIntent};
use async_trait::async_trait;
use tap_types::{AgentAddress, IntentAddress, LedgerResult};

/// Authoritative ledger for agents, intents and reputation.
///
/// All calls are network-bound in production; callers wrap them in their own
/// timeouts. A timed-out `execute_intent` may still have settled.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Register an agent identity (its public key bytes) and return its address.
    async fn register_agent(&self, identity: &[u8]) -> LedgerResult<AgentAddress>;

    async fn record_intent(&self, request: RecordIntentRequest) -> LedgerResult<RecordedIntent>;

    /// Current ledger record for `address`, or `None` when no such intent exists.
    async fn verify_intent(&self, address: &IntentAddress) -> LedgerResult<Option<IntentAccount>>;

    /// Settle an intent and return the execution reference.
    ///
    /// Must fail, never resubmit value movement, when the intent is already
    /// executed.
    async fn execute_intent(&self, authorization: SettlementAuthorization)
        -> LedgerResult<String>;

    async fn revoke_intent(&self, address: &IntentAddress) -> LedgerResult<()>;

    async fn update_reputation(
        &self,
        agent: &AgentAddress,
        delta: i64,
        reason: &str,
    ) -> LedgerResult<()>;

    async fn get_agent_score(&self, agent: &AgentAddress) -> LedgerResult<i64>;
}
