//! In-process reference ledger.
//!
//! Applies every transition under one lock so that concurrent executions of
//! the same intent resolve to exactly one success. Call counters and one-shot
//! failure injection make it the simulation seam for intent-manager tests.

use crate::settlement::SettlementAuthorization;
use crate::traits::Ledger;
use crate::types::{IntentAccount, RecordIntentRequest, RecordedIntent};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tap_types::{
    AgentAddress, Clock, IntentAddress, IntentHash, LedgerError, LedgerResult, SystemClock,
    TapError,
};
use tracing::debug;

/// Ledger operations, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    RegisterAgent,
    RecordIntent,
    VerifyIntent,
    ExecuteIntent,
    RevokeIntent,
    UpdateReputation,
    GetAgentScore,
}

impl LedgerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterAgent => "register_agent",
            Self::RecordIntent => "record_intent",
            Self::VerifyIntent => "verify_intent",
            Self::ExecuteIntent => "execute_intent",
            Self::RevokeIntent => "revoke_intent",
            Self::UpdateReputation => "update_reputation",
            Self::GetAgentScore => "get_agent_score",
        }
    }
}

#[derive(Debug, Clone)]
struct AgentAccount {
    public_key: String,
    score: i64,
}

#[derive(Debug, Default)]
struct LedgerState {
    agents: HashMap<AgentAddress, AgentAccount>,
    intents: HashMap<IntentAddress, IntentAccount>,
    hashes: HashSet<IntentHash>,
    settlements: u64,
    calls: HashMap<LedgerOp, usize>,
    failures: HashMap<LedgerOp, LedgerError>,
}

/// In-memory authoritative ledger.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    clock: Arc<dyn Clock>,
    latency: Arc<Mutex<Option<StdDuration>>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            clock,
            latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Number of calls made to `op` so far, failed ones included.
    pub fn calls(&self, op: LedgerOp) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.calls.values().sum())
            .unwrap_or(0)
    }

    /// Make the next call to `op` fail with `error` without touching state.
    pub fn fail_next(&self, op: LedgerOp, error: LedgerError) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(op, error);
        }
    }

    /// Delay every subsequent call, to exercise caller timeouts.
    pub fn set_latency(&self, latency: Option<StdDuration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Snapshot of an intent account, bypassing call accounting.
    pub fn peek_intent(&self, address: &IntentAddress) -> Option<IntentAccount> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.intents.get(address).cloned())
    }

    /// Overwrite an intent account, for arranging test fixtures.
    pub fn put_intent(&self, account: IntentAccount) {
        if let Ok(mut state) = self.state.lock() {
            state.hashes.insert(account.hash.clone());
            state.intents.insert(account.address.clone(), account);
        }
    }

    async fn enter(&self, op: LedgerOp) -> LedgerResult<std::sync::MutexGuard<'_, LedgerState>> {
        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Transport("ledger state lock poisoned".to_string()))?;
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(error) = state.failures.remove(&op) {
            debug!(op = op.as_str(), %error, "injected ledger failure");
            return Err(error);
        }
        Ok(state)
    }
}

fn derive_address(domain: &str, parts: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    bs58::encode(hasher.finalize().as_bytes()).into_string()
}

fn rejection(err: TapError) -> LedgerError {
    LedgerError::rejected(err.kind(), err.to_string())
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn register_agent(&self, identity: &[u8]) -> LedgerResult<AgentAddress> {
        if identity.len() != tap_signer::PUBLIC_KEY_LENGTH {
            return Err(LedgerError::rejected(
                "InvalidIdentity",
                format!("identity must be {} bytes", tap_signer::PUBLIC_KEY_LENGTH),
            ));
        }
        let mut state = self.enter(LedgerOp::RegisterAgent).await?;
        let address = AgentAddress(derive_address("tap-agent", &[identity]));
        if state.agents.contains_key(&address) {
            return Err(LedgerError::rejected(
                "AgentExists",
                format!("agent {address} is already registered"),
            ));
        }
        state.agents.insert(
            address.clone(),
            AgentAccount {
                public_key: bs58::encode(identity).into_string(),
                score: 0,
            },
        );
        debug!(agent = %address, "ledger registered agent");
        Ok(address)
    }

    async fn record_intent(&self, request: RecordIntentRequest) -> LedgerResult<RecordedIntent> {
        let mut state = self.enter(LedgerOp::RecordIntent).await?;
        if !state.agents.contains_key(&request.agent) {
            return Err(LedgerError::NotFound(format!("agent {}", request.agent)));
        }
        if request.ttl_seconds <= 0 {
            return Err(LedgerError::rejected(
                "InvalidTtl",
                format!("ttl_seconds must be positive, got {}", request.ttl_seconds),
            ));
        }
        if state.hashes.contains(&request.hash) {
            return Err(LedgerError::rejected(
                "IntentExists",
                format!("intent {} is already recorded", request.hash),
            ));
        }

        let created_at = self.clock.now();
        let expires_at = Duration::try_seconds(request.ttl_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                LedgerError::rejected(
                    "InvalidTtl",
                    format!("ttl_seconds {} is out of range", request.ttl_seconds),
                )
            })?;
        let address = IntentAddress(derive_address(
            "tap-intent",
            &[
                request.agent.as_str().as_bytes(),
                request.hash.as_str().as_bytes(),
            ],
        ));
        state.hashes.insert(request.hash.clone());
        state.intents.insert(
            address.clone(),
            IntentAccount {
                address: address.clone(),
                hash: request.hash,
                agent: request.agent,
                max_amount: request.max_amount,
                action: request.action,
                created_at,
                expires_at,
                executed: false,
                revoked: false,
                execution_ref: None,
            },
        );
        Ok(RecordedIntent {
            address,
            created_at,
            expires_at,
        })
    }

    async fn verify_intent(&self, address: &IntentAddress) -> LedgerResult<Option<IntentAccount>> {
        let state = self.enter(LedgerOp::VerifyIntent).await?;
        Ok(state.intents.get(address).cloned())
    }

    async fn execute_intent(
        &self,
        authorization: SettlementAuthorization,
    ) -> LedgerResult<String> {
        let now = self.clock.now();
        let mut state = self.enter(LedgerOp::ExecuteIntent).await?;
        let registered_key = state
            .agents
            .get(&authorization.agent)
            .map(|a| a.public_key.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("agent {}", authorization.agent)))?;
        if registered_key != authorization.public_key {
            return Err(LedgerError::rejected(
                "Unauthorized",
                "settlement key does not match the registered agent key",
            ));
        }
        authorization
            .verify()
            .map_err(|_| LedgerError::rejected("BadSignature", "settlement signature invalid"))?;

        state.settlements += 1;
        let sequence = state.settlements;
        let account = state
            .intents
            .get_mut(&authorization.intent_address)
            .ok_or_else(|| {
                LedgerError::NotFound(format!("intent {}", authorization.intent_address))
            })?;
        if account.agent != authorization.agent {
            return Err(LedgerError::rejected(
                "AgentMismatch",
                format!("intent {} belongs to another agent", account.address),
            ));
        }
        account
            .state()
            .check_execution(account.address.as_str(), authorization.amount, now)
            .map_err(rejection)?;

        let execution_ref = derive_address(
            "tap-execution",
            &[
                account.address.as_str().as_bytes(),
                authorization.action_id.as_bytes(),
                &sequence.to_le_bytes(),
            ],
        );
        account.executed = true;
        account.execution_ref = Some(execution_ref.clone());
        debug!(
            intent_address = %account.address,
            amount = authorization.amount,
            "ledger settled intent"
        );
        Ok(execution_ref)
    }

    async fn revoke_intent(&self, address: &IntentAddress) -> LedgerResult<()> {
        let mut state = self.enter(LedgerOp::RevokeIntent).await?;
        let account = state
            .intents
            .get_mut(address)
            .ok_or_else(|| LedgerError::NotFound(format!("intent {address}")))?;
        account
            .state()
            .check_revocation(address.as_str())
            .map_err(rejection)?;
        account.revoked = true;
        Ok(())
    }

    async fn update_reputation(
        &self,
        agent: &AgentAddress,
        delta: i64,
        reason: &str,
    ) -> LedgerResult<()> {
        let mut state = self.enter(LedgerOp::UpdateReputation).await?;
        let account = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| LedgerError::NotFound(format!("agent {agent}")))?;
        account.score = account.score.saturating_add(delta);
        debug!(agent = %agent, delta, reason, score = account.score, "ledger reputation updated");
        Ok(())
    }

    async fn get_agent_score(&self, agent: &AgentAddress) -> LedgerResult<i64> {
        let state = self.enter(LedgerOp::GetAgentScore).await?;
        state
            .agents
            .get(agent)
            .map(|a| a.score)
            .ok_or_else(|| LedgerError::NotFound(format!("agent {agent}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tap_signer::AgentKeypair;
    use tap_types::{IntentStatus, ManualClock};

    async fn setup() -> (InMemoryLedger, Arc<ManualClock>, AgentKeypair, AgentAddress) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let ledger = InMemoryLedger::new(clock.clone());
        let keypair = AgentKeypair::generate();
        let agent = ledger
            .register_agent(&keypair.public_key_bytes())
            .await
            .unwrap();
        (ledger, clock, keypair, agent)
    }

    fn request(agent: &AgentAddress, max_amount: u64) -> RecordIntentRequest {
        RecordIntentRequest {
            agent: agent.clone(),
            hash: IntentHash::generate(),
            max_amount,
            action: "checkout".into(),
            ttl_seconds: 60,
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (ledger, _, keypair, _) = setup().await;
        let err = ledger
            .register_agent(&keypair.public_key_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref code, .. } if code == "AgentExists"));
    }

    #[tokio::test]
    async fn second_execution_is_rejected() {
        let (ledger, _, keypair, agent) = setup().await;
        let recorded = ledger.record_intent(request(&agent, 100)).await.unwrap();
        let auth = SettlementAuthorization::sign(
            &keypair,
            "a1",
            recorded.address.clone(),
            agent.clone(),
            100,
        );

        let first = ledger.execute_intent(auth.clone()).await.unwrap();
        let err = ledger.execute_intent(auth).await.unwrap_err();
        assert!(
            matches!(err, LedgerError::Rejected { ref code, .. } if code == "AlreadyExecuted")
        );
        let account = ledger.peek_intent(&recorded.address).unwrap();
        assert_eq!(account.execution_ref, Some(first));
    }

    #[tokio::test]
    async fn foreign_key_cannot_settle() {
        let (ledger, _, _, agent) = setup().await;
        let recorded = ledger.record_intent(request(&agent, 100)).await.unwrap();
        let intruder = AgentKeypair::generate();
        let auth = SettlementAuthorization::sign(&intruder, "a1", recorded.address, agent, 10);
        let err = ledger.execute_intent(auth).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref code, .. } if code == "Unauthorized"));
    }

    #[tokio::test]
    async fn expiry_follows_shared_clock() {
        let (ledger, clock, _, agent) = setup().await;
        let recorded = ledger.record_intent(request(&agent, 100)).await.unwrap();
        assert_eq!(recorded.expires_at - recorded.created_at, Duration::seconds(60));

        clock.advance(Duration::seconds(60));
        let account = ledger.verify_intent(&recorded.address).await.unwrap().unwrap();
        assert_eq!(account.state().status_at(clock.now()), IntentStatus::Expired);
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_rejected_and_ledger_stays_usable() {
        let (ledger, _, _, agent) = setup().await;
        let mut huge = request(&agent, 100);
        huge.ttl_seconds = i64::MAX;
        let err = ledger.record_intent(huge).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref code, .. } if code == "InvalidTtl"));

        let recorded = ledger.record_intent(request(&agent, 100)).await.unwrap();
        assert!(ledger.peek_intent(&recorded.address).is_some());
    }

    #[tokio::test]
    async fn injected_failure_fires_once_and_is_counted() {
        let (ledger, _, _, agent) = setup().await;
        ledger.fail_next(
            LedgerOp::GetAgentScore,
            LedgerError::Transport("connection reset".into()),
        );
        assert!(ledger.get_agent_score(&agent).await.is_err());
        assert_eq!(ledger.get_agent_score(&agent).await.unwrap(), 0);
        assert_eq!(ledger.calls(LedgerOp::GetAgentScore), 2);
    }

    #[tokio::test]
    async fn concurrent_executions_settle_once() {
        let (ledger, _, keypair, agent) = setup().await;
        let recorded = ledger.record_intent(request(&agent, 100)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            let auth = SettlementAuthorization::sign(
                &keypair,
                format!("a{i}"),
                recorded.address.clone(),
                agent.clone(),
                50,
            );
            handles.push(tokio::spawn(async move { ledger.execute_intent(auth).await }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
