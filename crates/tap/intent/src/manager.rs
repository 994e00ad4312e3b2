use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tap_ledger::{IntentAccount, Ledger, RecordIntentRequest, RecordedIntent, SettlementAuthorization};
use tap_signer::AgentKeypair;
use tap_store::{AgentPatch, IntentPatch, TapStore};
use tap_types::{
    AgentAddress, Amount, Clock, Intent, IntentAddress, IntentHash, IntentStatus, TapError,
    TapResult,
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::bounded::{is_unreachable, ledger_call};
use crate::config::{IntentManagerConfig, ReadMode};

/// Arguments for [`IntentManager::record_intent`].
#[derive(Debug, Clone)]
pub struct RecordIntent {
    pub agent: AgentAddress,
    pub hash: IntentHash,
    pub max_amount: Amount,
    pub action: String,
    pub ttl_seconds: i64,
    /// Authorizing identity, mirrored for audit.
    pub user: String,
    pub user_signature: String,
    pub merchant: String,
}

impl RecordIntent {
    pub fn new(
        agent: AgentAddress,
        hash: IntentHash,
        max_amount: Amount,
        action: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            agent,
            hash,
            max_amount,
            action: action.into(),
            ttl_seconds,
            user: String::new(),
            user_signature: String::new(),
            merchant: String::new(),
        }
    }

    pub fn authorized_by(mut self, user: impl Into<String>, signature: impl Into<String>) -> Self {
        self.user = user.into();
        self.user_signature = signature.into();
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = merchant.into();
        self
    }
}

/// Arguments for [`IntentManager::execute_intent`].
///
/// The secret is only used to sign the settlement authorization locally.
#[derive(Clone)]
pub struct ExecuteIntent {
    pub action_id: String,
    pub intent_address: IntentAddress,
    pub agent: AgentAddress,
    pub amount: Amount,
    pub agent_secret: Zeroizing<String>,
    pub agent_public_key: String,
}

impl fmt::Debug for ExecuteIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteIntent")
            .field("action_id", &self.action_id)
            .field("intent_address", &self.intent_address)
            .field("agent", &self.agent)
            .field("amount", &self.amount)
            .field("agent_public_key", &self.agent_public_key)
            .finish_non_exhaustive()
    }
}

/// Owns the intent lifecycle: record, verify, execute, revoke.
///
/// No local locking: at most one execution per intent is guaranteed by the
/// ledger's atomic transition, and the manager only avoids wasted calls.
pub struct IntentManager {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TapStore>,
    clock: Arc<dyn Clock>,
    config: IntentManagerConfig,
}

impl IntentManager {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TapStore>,
        clock: Arc<dyn Clock>,
        config: IntentManagerConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &IntentManagerConfig {
        &self.config
    }

    /// Fresh intent hash from the OS CSPRNG.
    pub fn generate_intent_hash(&self) -> IntentHash {
        IntentHash::generate()
    }

    /// Record an intent on the ledger, then mirror it locally.
    pub async fn record_intent(&self, request: RecordIntent) -> TapResult<RecordedIntent> {
        if request.ttl_seconds <= 0 {
            return Err(TapError::InvalidInput(format!(
                "ttl_seconds must be positive, got {}",
                request.ttl_seconds
            )));
        }
        let expiry = Duration::try_seconds(request.ttl_seconds)
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl));
        if expiry.is_none() {
            return Err(TapError::InvalidInput(format!(
                "ttl_seconds {} is out of range",
                request.ttl_seconds
            )));
        }
        if request.action.trim().is_empty() {
            return Err(TapError::InvalidInput("action is empty".to_string()));
        }

        let ledger_request = RecordIntentRequest {
            agent: request.agent.clone(),
            hash: request.hash.clone(),
            max_amount: request.max_amount,
            action: request.action.clone(),
            ttl_seconds: request.ttl_seconds,
        };
        let recorded = ledger_call(
            "record_intent",
            self.config.ledger_timeout,
            self.ledger.record_intent(ledger_request),
        )
        .await?;
        info!(
            intent_hash = %request.hash,
            intent_address = %recorded.address,
            agent = %request.agent,
            max_amount = request.max_amount,
            expires_at = %recorded.expires_at,
            "intent recorded"
        );

        let mirrored = Intent {
            hash: request.hash,
            agent_address: request.agent,
            user: request.user,
            user_signature: request.user_signature,
            max_amount: request.max_amount,
            merchant: request.merchant,
            created_at: recorded.created_at,
            expires_at: recorded.expires_at,
            executed: false,
            revoked: false,
            execution_ref: None,
        };
        if let Err(e) = self.mirror_new_intent(&recorded.address, mirrored).await {
            warn!(
                intent_address = %recorded.address,
                error = %e,
                "intent recorded on ledger but local mirror write failed"
            );
        }
        Ok(recorded)
    }

    /// Read-only status of an intent. Expiry is computed, never written.
    pub async fn verify_intent(&self, address: &IntentAddress) -> TapResult<IntentStatus> {
        let now = self.clock.now();
        match ledger_call(
            "verify_intent",
            self.config.ledger_timeout,
            self.ledger.verify_intent(address),
        )
        .await
        {
            Ok(Some(account)) => Ok(account.state().status_at(now)),
            Ok(None) => Ok(IntentStatus::NotFound),
            Err(e) if self.config.read_mode == ReadMode::AllowMirrorFallback && is_unreachable(&e) => {
                warn!(intent_address = %address, error = %e, "ledger unreachable, answering from mirror");
                Ok(self
                    .mirrored_intent(address)
                    .await?
                    .map(|intent| intent.status_at(now))
                    .unwrap_or(IntentStatus::NotFound))
            }
            Err(e) => Err(e),
        }
    }

    /// Settle an intent for `amount`.
    ///
    /// Locally detectable violations fail before any ledger call. Otherwise
    /// the eligibility rule is re-checked against the ledger record, the
    /// settlement is signed with the agent key and submitted, and the mirror
    /// is marked executed. A timeout here does not mean nothing was settled;
    /// call [`Self::verify_intent`] before retrying.
    pub async fn execute_intent(&self, request: ExecuteIntent) -> TapResult<String> {
        let address = &request.intent_address;
        let label = address.as_str();

        let mirrored = self.mirrored_intent(address).await?;
        if let Some(intent) = &mirrored {
            if intent.agent_address != request.agent {
                return Err(TapError::InvalidInput(format!(
                    "intent {address} belongs to agent {}",
                    intent.agent_address
                )));
            }
            intent
                .state()
                .check_execution(label, request.amount, self.clock.now())?;
        }

        let keypair = AgentKeypair::from_base58(&request.agent_secret, &request.agent_public_key)?;

        let account = self.ledger_account(address).await?;
        if account.agent != request.agent {
            return Err(TapError::InvalidInput(format!(
                "intent {address} belongs to agent {}",
                account.agent
            )));
        }
        if let Err(e) = account
            .state()
            .check_execution(label, request.amount, self.clock.now())
        {
            self.reconcile_terminal(&account, mirrored.as_ref()).await;
            return Err(e);
        }

        let authorization = SettlementAuthorization::sign(
            &keypair,
            request.action_id.clone(),
            address.clone(),
            request.agent.clone(),
            request.amount,
        );
        let execution_ref = match ledger_call(
            "execute_intent",
            self.config.ledger_timeout,
            self.ledger.execute_intent(authorization),
        )
        .await
        {
            Ok(reference) => reference,
            Err(e) => {
                if is_unreachable(&e) {
                    warn!(
                        intent_address = %address,
                        "settlement outcome unknown; verify the intent before retrying"
                    );
                }
                return Err(e);
            }
        };
        info!(
            intent_address = %address,
            agent = %request.agent,
            amount = request.amount,
            action_id = %request.action_id,
            execution_ref = %execution_ref,
            "intent executed"
        );

        let patched = match mirrored {
            Some(_) => self
                .store
                .update_intent(&account.hash, IntentPatch::executed(execution_ref.clone()))
                .await
                .map(|_| ())
                .map_err(TapError::from),
            None => {
                let mut intent = intent_from_account(&account);
                intent.executed = true;
                intent.execution_ref = Some(execution_ref.clone());
                self.mirror_new_intent(address, intent).await
            }
        };
        if let Err(e) = patched {
            warn!(
                intent_address = %address,
                error = %e,
                "intent executed on ledger but local mirror update failed"
            );
        }
        Ok(execution_ref)
    }

    /// Revoke an intent that has not been executed.
    pub async fn revoke_intent(&self, address: &IntentAddress) -> TapResult<()> {
        let label = address.as_str();
        let mirrored = self.mirrored_intent(address).await?;
        if let Some(intent) = &mirrored {
            intent.state().check_revocation(label)?;
        }

        let account = self.ledger_account(address).await?;
        if let Err(e) = account.state().check_revocation(label) {
            self.reconcile_terminal(&account, mirrored.as_ref()).await;
            return Err(e);
        }

        ledger_call(
            "revoke_intent",
            self.config.ledger_timeout,
            self.ledger.revoke_intent(address),
        )
        .await?;
        info!(intent_address = %address, "intent revoked");

        let patched = match mirrored {
            Some(_) => self
                .store
                .update_intent(&account.hash, IntentPatch::revoked())
                .await
                .map(|_| ())
                .map_err(TapError::from),
            None => {
                let mut intent = intent_from_account(&account);
                intent.revoked = true;
                self.mirror_new_intent(address, intent).await
            }
        };
        if let Err(e) = patched {
            warn!(
                intent_address = %address,
                error = %e,
                "intent revoked on ledger but local mirror update failed"
            );
        }
        Ok(())
    }

    /// Overwrite the mirrored lifecycle flags with ledger truth.
    pub async fn reconcile_intent(&self, address: &IntentAddress) -> TapResult<Intent> {
        let account = self.ledger_account(address).await?;
        self.reconcile_from(&account).await
    }

    /// Local mirror of the intent behind `address`, if indexed.
    pub async fn mirrored_intent(&self, address: &IntentAddress) -> TapResult<Option<Intent>> {
        let Some(hash) = self.store.resolve_intent_address(address).await? else {
            return Ok(None);
        };
        Ok(self.store.get_intent(&hash).await?)
    }

    async fn ledger_account(&self, address: &IntentAddress) -> TapResult<IntentAccount> {
        ledger_call(
            "verify_intent",
            self.config.ledger_timeout,
            self.ledger.verify_intent(address),
        )
        .await?
        .ok_or_else(|| TapError::NotFound(format!("intent {address}")))
    }

    async fn mirror_new_intent(&self, address: &IntentAddress, intent: Intent) -> TapResult<()> {
        let hash = intent.hash.clone();
        let agent = intent.agent_address.clone();
        let existed = self.store.get_intent(&hash).await?.is_some();
        self.store.upsert_intent(intent).await?;
        self.store.index_intent_address(address, &hash).await?;
        if !existed {
            self.bump_total_intents(&agent).await?;
        }
        Ok(())
    }

    async fn bump_total_intents(&self, agent: &AgentAddress) -> TapResult<()> {
        if let Some(current) = self.store.get_agent(agent).await? {
            let patch = AgentPatch {
                total_intents: Some(current.total_intents.saturating_add(1)),
                ..AgentPatch::default()
            };
            self.store.update_agent(agent, patch).await?;
        }
        Ok(())
    }

    /// Best-effort catch-up when the ledger shows a terminal state the mirror lacks.
    async fn reconcile_terminal(&self, account: &IntentAccount, mirrored: Option<&Intent>) {
        let lagging = match mirrored {
            Some(intent) => intent.executed != account.executed || intent.revoked != account.revoked,
            None => false,
        };
        if !lagging {
            return;
        }
        if let Err(e) = self.reconcile_from(account).await {
            warn!(intent_address = %account.address, error = %e, "mirror reconciliation failed");
        }
    }

    async fn reconcile_from(&self, account: &IntentAccount) -> TapResult<Intent> {
        let mut intent = match self.mirrored_intent(&account.address).await? {
            Some(existing) => existing,
            None => intent_from_account(account),
        };
        intent.executed = account.executed;
        intent.revoked = account.revoked;
        intent.execution_ref = account.execution_ref.clone();
        intent.expires_at = account.expires_at;
        intent.max_amount = account.max_amount;
        self.mirror_new_intent(&account.address, intent.clone()).await?;
        debug!(intent_address = %account.address, "mirror reconciled with ledger");
        Ok(intent)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

fn intent_from_account(account: &IntentAccount) -> Intent {
    Intent {
        hash: account.hash.clone(),
        agent_address: account.agent.clone(),
        user: String::new(),
        user_signature: String::new(),
        max_amount: account.max_amount,
        merchant: String::new(),
        created_at: account.created_at,
        expires_at: account.expires_at,
        executed: account.executed,
        revoked: account.revoked,
        execution_ref: account.execution_ref.clone(),
    }
}
