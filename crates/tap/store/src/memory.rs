//! In-memory reference implementation of the TAP store traits.
//!
//! Deterministic and test-friendly. Durable deployments should use the
//! SQLite backend.

use crate::model::{check_replacement, validate_intent, AgentPatch, IntentPatch};
use crate::traits::{AgentStore, IntentStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tap_types::{Agent, AgentAddress, Intent, IntentAddress, IntentHash};

/// In-memory TAP store.
#[derive(Debug, Default)]
pub struct InMemoryTapStore {
    agents: RwLock<HashMap<AgentAddress, Agent>>,
    intents: RwLock<HashMap<IntentHash, Intent>>,
    addresses: RwLock<HashMap<IntentAddress, IntentHash>>,
}

impl InMemoryTapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryTapStore {
    async fn upsert_agent(&self, agent: Agent) -> StorageResult<()> {
        let mut guard = self
            .agents
            .write()
            .map_err(|_| StorageError::Backend("agents lock poisoned".to_string()))?;
        guard.insert(agent.address.clone(), agent);
        Ok(())
    }

    async fn get_agent(&self, address: &AgentAddress) -> StorageResult<Option<Agent>> {
        let guard = self
            .agents
            .read()
            .map_err(|_| StorageError::Backend("agents lock poisoned".to_string()))?;
        Ok(guard.get(address).cloned())
    }

    async fn update_agent(
        &self,
        address: &AgentAddress,
        patch: AgentPatch,
    ) -> StorageResult<Agent> {
        patch.validate()?;
        let mut guard = self
            .agents
            .write()
            .map_err(|_| StorageError::Backend("agents lock poisoned".to_string()))?;
        let agent = guard
            .get_mut(address)
            .ok_or_else(|| StorageError::NotFound(format!("agent {address} not found")))?;
        patch.apply(agent);
        Ok(agent.clone())
    }
}

#[async_trait]
impl IntentStore for InMemoryTapStore {
    async fn upsert_intent(&self, intent: Intent) -> StorageResult<()> {
        validate_intent(&intent)?;
        let mut guard = self
            .intents
            .write()
            .map_err(|_| StorageError::Backend("intents lock poisoned".to_string()))?;
        if let Some(current) = guard.get(&intent.hash) {
            check_replacement(current, &intent)?;
        }
        guard.insert(intent.hash.clone(), intent);
        Ok(())
    }

    async fn get_intent(&self, hash: &IntentHash) -> StorageResult<Option<Intent>> {
        let guard = self
            .intents
            .read()
            .map_err(|_| StorageError::Backend("intents lock poisoned".to_string()))?;
        Ok(guard.get(hash).cloned())
    }

    async fn update_intent(&self, hash: &IntentHash, patch: IntentPatch) -> StorageResult<Intent> {
        let mut guard = self
            .intents
            .write()
            .map_err(|_| StorageError::Backend("intents lock poisoned".to_string()))?;
        let current = guard
            .get(hash)
            .ok_or_else(|| StorageError::NotFound(format!("intent {hash} not found")))?;
        let next = patch.apply(current)?;
        guard.insert(hash.clone(), next.clone());
        Ok(next)
    }

    async fn index_intent_address(
        &self,
        address: &IntentAddress,
        hash: &IntentHash,
    ) -> StorageResult<()> {
        let mut guard = self
            .addresses
            .write()
            .map_err(|_| StorageError::Backend("address index lock poisoned".to_string()))?;
        match guard.get(address) {
            Some(existing) if existing != hash => Err(StorageError::Conflict(format!(
                "intent address {address} already maps to {existing}"
            ))),
            Some(_) => Ok(()),
            None => {
                guard.insert(address.clone(), hash.clone());
                Ok(())
            }
        }
    }

    async fn resolve_intent_address(
        &self,
        address: &IntentAddress,
    ) -> StorageResult<Option<IntentHash>> {
        let guard = self
            .addresses
            .read()
            .map_err(|_| StorageError::Backend("address index lock poisoned".to_string()))?;
        Ok(guard.get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn agent() -> Agent {
        Agent::new(
            AgentAddress("agent-1".into()),
            "pubkey",
            "env:ED25519_PRIVATE_KEY",
            "owner-1",
            Utc::now(),
        )
        .with_metadata_uri("https://agents.example/1.json")
    }

    fn intent() -> Intent {
        let now = Utc::now();
        Intent {
            hash: IntentHash::generate(),
            agent_address: AgentAddress("agent-1".into()),
            user: "user-1".into(),
            user_signature: "user-sig".into(),
            max_amount: 1_000_000,
            merchant: "merchant-1".into(),
            created_at: now,
            expires_at: now + Duration::seconds(3600),
            executed: false,
            revoked: false,
            execution_ref: None,
        }
    }

    #[tokio::test]
    async fn agent_round_trips_verbatim() {
        let store = InMemoryTapStore::new();
        let agent = agent();
        store.upsert_agent(agent.clone()).await.unwrap();
        assert_eq!(store.get_agent(&agent.address).await.unwrap(), Some(agent));
    }

    #[tokio::test]
    async fn partial_update_changes_only_named_field() {
        let store = InMemoryTapStore::new();
        let agent = agent();
        store.upsert_agent(agent.clone()).await.unwrap();

        let updated = store
            .update_agent(&agent.address, AgentPatch::reputation(10))
            .await
            .unwrap();

        let mut expected = agent;
        expected.reputation_score = 10;
        assert_eq!(updated, expected);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_intent() {
        let store = InMemoryTapStore::new();
        let mut intent = intent();
        store.upsert_intent(intent.clone()).await.unwrap();
        intent.merchant = "merchant-2".into();
        store.upsert_intent(intent.clone()).await.unwrap();
        assert_eq!(
            store.get_intent(&intent.hash).await.unwrap().unwrap().merchant,
            "merchant-2"
        );
    }

    #[tokio::test]
    async fn upsert_rejects_inverted_window() {
        let store = InMemoryTapStore::new();
        let mut intent = intent();
        intent.expires_at = intent.created_at;
        assert!(matches!(
            store.upsert_intent(intent).await,
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn updating_missing_records_is_not_found() {
        let store = InMemoryTapStore::new();
        assert!(matches!(
            store
                .update_agent(&AgentAddress("nobody".into()), AgentPatch::reputation(1))
                .await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store
                .update_intent(&IntentHash::generate(), IntentPatch::revoked())
                .await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn address_index_refuses_remapping() {
        let store = InMemoryTapStore::new();
        let address = IntentAddress("intent-addr".into());
        let first = IntentHash::generate();
        store.index_intent_address(&address, &first).await.unwrap();
        store.index_intent_address(&address, &first).await.unwrap();
        assert!(matches!(
            store
                .index_intent_address(&address, &IntentHash::generate())
                .await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(
            store.resolve_intent_address(&address).await.unwrap(),
            Some(first)
        );
    }
}
