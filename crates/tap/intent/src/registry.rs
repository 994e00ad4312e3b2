use std::sync::Arc;
use std::time::Duration;
use tap_ledger::Ledger;
use tap_signer::AgentKeypair;
use tap_store::{AgentPatch, TapStore};
use tap_types::{Agent, AgentAddress, Clock, TapError, TapResult};
use tracing::{info, warn};

use crate::bounded::ledger_call;

/// Arguments for [`AgentRegistry::register`].
#[derive(Debug, Clone)]
pub struct RegisterAgent<'a> {
    pub owner: String,
    pub keypair: &'a AgentKeypair,
    /// Where the signing secret lives locally, e.g. `env:ED25519_PRIVATE_KEY`.
    pub private_key_ref: String,
    pub metadata_uri: String,
}

/// Registers agents on the ledger and keeps their local records.
pub struct AgentRegistry {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TapStore>,
    clock: Arc<dyn Clock>,
    ledger_timeout: Duration,
}

impl AgentRegistry {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TapStore>,
        clock: Arc<dyn Clock>,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
            ledger_timeout,
        }
    }

    /// Register the agent's public key and mirror a fresh record.
    pub async fn register(&self, request: RegisterAgent<'_>) -> TapResult<Agent> {
        if request.owner.trim().is_empty() {
            return Err(TapError::InvalidInput("owner is empty".to_string()));
        }
        let identity = request.keypair.public_key_bytes();
        let address = ledger_call(
            "register_agent",
            self.ledger_timeout,
            self.ledger.register_agent(&identity),
        )
        .await?;

        let agent = Agent::new(
            address,
            request.keypair.public_base58(),
            request.private_key_ref,
            request.owner,
            self.clock.now(),
        )
        .with_metadata_uri(request.metadata_uri);
        info!(agent = %agent.address, owner = %agent.owner, "agent registered");

        if let Err(e) = self.store.upsert_agent(agent.clone()).await {
            warn!(
                agent = %agent.address,
                error = %e,
                "agent registered on ledger but local mirror write failed"
            );
        }
        Ok(agent)
    }

    /// Mark an agent inactive. Agents are never deleted.
    pub async fn deactivate(&self, address: &AgentAddress) -> TapResult<Agent> {
        let patch = AgentPatch {
            is_active: Some(false),
            ..AgentPatch::default()
        };
        let agent = self.store.update_agent(address, patch).await?;
        info!(agent = %address, "agent deactivated");
        Ok(agent)
    }

    pub async fn get(&self, address: &AgentAddress) -> TapResult<Agent> {
        self.store
            .get_agent(address)
            .await?
            .ok_or_else(|| TapError::NotFound(format!("agent {address}")))
    }
}
