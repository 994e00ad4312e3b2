use std::sync::Arc;
use tap_intent::{
    AgentRegistry, IntentManager, IntentManagerConfig, ReputationConfig, ReputationTracker,
};
use tap_ledger::Ledger;
use tap_signer::RequestSigner;
use tap_store::TapStore;
use tap_types::Clock;

/// Services the tools run against.
pub struct ToolContext {
    pub manager: IntentManager,
    pub agents: AgentRegistry,
    pub reputation: ReputationTracker,
    pub store: Arc<dyn TapStore>,
    pub clock: Arc<dyn Clock>,
    /// Present only when a signing identity is configured.
    pub signer: Option<RequestSigner>,
}

impl ToolContext {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TapStore>,
        clock: Arc<dyn Clock>,
        intent_config: IntentManagerConfig,
        reputation_config: ReputationConfig,
    ) -> Self {
        let agents = AgentRegistry::new(
            ledger.clone(),
            store.clone(),
            clock.clone(),
            intent_config.ledger_timeout,
        );
        let reputation = ReputationTracker::new(ledger.clone(), store.clone(), reputation_config);
        let manager = IntentManager::new(ledger, store.clone(), clock.clone(), intent_config);
        Self {
            manager,
            agents,
            reputation,
            store,
            clock,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }
}
