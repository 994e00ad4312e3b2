use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tap_ledger::Ledger;
use tap_store::{AgentPatch, TapStore};
use tap_types::{AgentAddress, TapResult};
use tracing::{info, warn};

use crate::bounded::ledger_call;
use crate::config::ReputationConfig;

/// Why a score changed. Transaction outcomes also bump the agent's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationReason {
    SuccessfulTransaction,
    FailedTransaction,
    Adjustment(String),
}

impl ReputationReason {
    /// Lenient parse used by outer surfaces; unknown text is an adjustment note.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "successful_transaction" | "success" | "successful" => Self::SuccessfulTransaction,
            "failed_transaction" | "failure" | "failed" => Self::FailedTransaction,
            _ => Self::Adjustment(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SuccessfulTransaction => "successful_transaction",
            Self::FailedTransaction => "failed_transaction",
            Self::Adjustment(note) => note,
        }
    }
}

impl fmt::Display for ReputationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies score deltas on the ledger and mirrors them locally.
///
/// Scores do not gate execution.
pub struct ReputationTracker {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TapStore>,
    config: ReputationConfig,
}

impl ReputationTracker {
    pub fn new(ledger: Arc<dyn Ledger>, store: Arc<dyn TapStore>, config: ReputationConfig) -> Self {
        Self {
            ledger,
            store,
            config,
        }
    }

    /// Apply `delta` on the ledger, then mirror the ledger's new score and
    /// bump the outcome counter. Returns the new score.
    pub async fn update_reputation(
        &self,
        agent: &AgentAddress,
        delta: i64,
        reason: ReputationReason,
    ) -> TapResult<i64> {
        ledger_call(
            "update_reputation",
            self.config.ledger_timeout,
            self.ledger.update_reputation(agent, delta, reason.as_str()),
        )
        .await?;

        let mirrored = self.store.get_agent(agent).await?;
        let score = match self.get_agent_score(agent).await {
            Ok(score) => score,
            Err(e) => {
                let fallback = mirrored
                    .as_ref()
                    .map(|a| a.reputation_score.saturating_add(delta))
                    .unwrap_or(delta);
                warn!(agent = %agent, error = %e, fallback, "score read-back failed");
                fallback
            }
        };
        info!(agent = %agent, delta, reason = %reason, score, "reputation updated");

        let Some(current) = mirrored else {
            warn!(agent = %agent, "reputation updated for an agent missing from the mirror");
            return Ok(score);
        };
        let mut patch = AgentPatch::reputation(score);
        match reason {
            ReputationReason::SuccessfulTransaction => {
                patch.successful_txns = Some(current.successful_txns.saturating_add(1));
            }
            ReputationReason::FailedTransaction => {
                patch.failed_txns = Some(current.failed_txns.saturating_add(1));
            }
            ReputationReason::Adjustment(_) => {}
        }
        if let Err(e) = self.store.update_agent(agent, patch).await {
            warn!(agent = %agent, error = %e, "reputation mirror update failed");
        }
        Ok(score)
    }

    /// Apply the configured success or failure delta.
    pub async fn record_outcome(&self, agent: &AgentAddress, success: bool) -> TapResult<i64> {
        if success {
            self.update_reputation(
                agent,
                self.config.success_delta,
                ReputationReason::SuccessfulTransaction,
            )
            .await
        } else {
            self.update_reputation(
                agent,
                self.config.failure_delta,
                ReputationReason::FailedTransaction,
            )
            .await
        }
    }

    /// Ledger truth for the agent's score.
    pub async fn get_agent_score(&self, agent: &AgentAddress) -> TapResult<i64> {
        ledger_call(
            "get_agent_score",
            self.config.ledger_timeout,
            self.ledger.get_agent_score(agent),
        )
        .await
    }
}
