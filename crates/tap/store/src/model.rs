use serde::{Deserialize, Serialize};
use tap_types::{Agent, Intent, StorageError, StorageResult, TapError};

/// Partial update of an agent's mutable fields.
///
/// Identity fields (`address`, keys, `owner`, `registered_at`) are not
/// patchable. Unknown field names fail deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentPatch {
    #[serde(default, alias = "reputationScore", skip_serializing_if = "Option::is_none")]
    pub reputation_score: Option<i64>,
    #[serde(default, alias = "isActive", skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, alias = "totalIntents", skip_serializing_if = "Option::is_none")]
    pub total_intents: Option<u64>,
    #[serde(default, alias = "successfulTxns", skip_serializing_if = "Option::is_none")]
    pub successful_txns: Option<u64>,
    #[serde(default, alias = "failedTxns", skip_serializing_if = "Option::is_none")]
    pub failed_txns: Option<u64>,
    #[serde(default, alias = "metadataUri", skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
}

impl AgentPatch {
    pub fn reputation(score: i64) -> Self {
        Self {
            reputation_score: Some(score),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.is_empty() {
            return Err(StorageError::InvalidInput(
                "agent patch names no fields".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge named fields into `agent`, leaving the rest untouched.
    pub fn apply(&self, agent: &mut Agent) {
        if let Some(score) = self.reputation_score {
            agent.reputation_score = score;
        }
        if let Some(active) = self.is_active {
            agent.is_active = active;
        }
        if let Some(total) = self.total_intents {
            agent.total_intents = total;
        }
        if let Some(ok) = self.successful_txns {
            agent.successful_txns = ok;
        }
        if let Some(failed) = self.failed_txns {
            agent.failed_txns = failed;
        }
        if let Some(uri) = &self.metadata_uri {
            agent.metadata_uri = uri.clone();
        }
    }
}

/// Partial update of an intent's lifecycle flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    #[serde(
        default,
        alias = "executionRef",
        alias = "execution_tx",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_ref: Option<String>,
}

impl IntentPatch {
    pub fn executed(execution_ref: impl Into<String>) -> Self {
        Self {
            executed: Some(true),
            revoked: None,
            execution_ref: Some(execution_ref.into()),
        }
    }

    pub fn revoked() -> Self {
        Self {
            executed: None,
            revoked: Some(true),
            execution_ref: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Produce the patched intent, refusing transitions that leave a
    /// terminal state or combine both terminal flags.
    pub fn apply(&self, current: &Intent) -> StorageResult<Intent> {
        if self.is_empty() {
            return Err(StorageError::InvalidInput(
                "intent patch names no fields".to_string(),
            ));
        }
        if current.executed && self.executed == Some(false) {
            return Err(StorageError::InvariantViolation(format!(
                "intent {} is executed and cannot be un-executed",
                current.hash
            )));
        }
        if current.revoked && self.revoked == Some(false) {
            return Err(StorageError::InvariantViolation(format!(
                "intent {} is revoked and cannot be un-revoked",
                current.hash
            )));
        }

        let mut next = current.clone();
        if let Some(executed) = self.executed {
            next.executed = executed;
        }
        if let Some(revoked) = self.revoked {
            next.revoked = revoked;
        }
        if let Some(reference) = &self.execution_ref {
            if current.execution_ref.as_deref().is_some_and(|r| r != reference) {
                return Err(StorageError::InvariantViolation(format!(
                    "intent {} already carries execution reference",
                    current.hash
                )));
            }
            next.execution_ref = Some(reference.clone());
        }

        if next.executed && next.revoked {
            return Err(StorageError::InvariantViolation(format!(
                "intent {} cannot be both executed and revoked",
                current.hash
            )));
        }
        if next.execution_ref.is_some() && !next.executed {
            return Err(StorageError::InvariantViolation(format!(
                "intent {} has an execution reference but is not executed",
                current.hash
            )));
        }
        Ok(next)
    }
}

/// Checks that `next` may fully replace the stored `current`.
///
/// Executed or revoked records keep their flags and terms. An execution
/// reference may be filled in once and never changed or dropped. Audit
/// fields (user, signature, merchant) stay writable.
pub(crate) fn check_replacement(current: &Intent, next: &Intent) -> StorageResult<()> {
    if !current.executed && !current.revoked {
        return Ok(());
    }
    let flags = IntentPatch {
        executed: Some(next.executed),
        revoked: Some(next.revoked),
        execution_ref: next.execution_ref.clone(),
    };
    let merged = flags.apply(current)?;
    if merged.execution_ref != next.execution_ref {
        return Err(StorageError::InvariantViolation(format!(
            "intent {} cannot drop its execution reference",
            current.hash
        )));
    }
    if current.agent_address != next.agent_address
        || current.max_amount != next.max_amount
        || current.created_at != next.created_at
        || current.expires_at != next.expires_at
    {
        return Err(StorageError::InvariantViolation(format!(
            "intent {} is settled or withdrawn and its terms are fixed",
            current.hash
        )));
    }
    Ok(())
}

/// Record-level checks shared by every backend's upsert.
pub(crate) fn validate_intent(intent: &Intent) -> StorageResult<()> {
    intent.validate().map_err(|e| match e {
        TapError::InvalidInput(msg) => StorageError::InvalidInput(msg),
        other => StorageError::InvalidInput(other.to_string()),
    })
}
