use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentAddress, Amount, IntentHash, TapError};

/// Read-time classification of an intent.
///
/// Only `Executed` and `Revoked` are stored; `Active` and `Expired` are
/// recomputed from the clock on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Active,
    Executed,
    Revoked,
    Expired,
    NotFound,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Executed => "executed",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Revoked)
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authorization-relevant part of an intent, wherever it was read from.
///
/// Both the local mirror and the ledger account reduce to this, so a single
/// eligibility rule covers the pre-flight check and the ledger re-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentState {
    pub max_amount: Amount,
    pub expires_at: DateTime<Utc>,
    pub executed: bool,
    pub revoked: bool,
}

impl IntentState {
    pub fn status_at(&self, now: DateTime<Utc>) -> IntentStatus {
        if self.executed {
            IntentStatus::Executed
        } else if self.revoked {
            IntentStatus::Revoked
        } else if now >= self.expires_at {
            IntentStatus::Expired
        } else {
            IntentStatus::Active
        }
    }

    /// Eligibility for settling `amount` at `now`.
    ///
    /// Amount bound is inclusive; expiry is exclusive (`now == expires_at` is expired).
    pub fn check_execution(
        &self,
        label: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), TapError> {
        if self.executed {
            return Err(TapError::AlreadyExecuted(label.to_string()));
        }
        if self.revoked {
            return Err(TapError::AlreadyRevoked(label.to_string()));
        }
        if now >= self.expires_at {
            return Err(TapError::ExpiredIntent(label.to_string()));
        }
        if amount > self.max_amount {
            return Err(TapError::AmountExceeded {
                requested: amount,
                max_amount: self.max_amount,
            });
        }
        Ok(())
    }

    /// Revocation is allowed until the intent has been executed.
    pub fn check_revocation(&self, label: &str) -> Result<(), TapError> {
        if self.executed {
            return Err(TapError::AlreadyExecuted(label.to_string()));
        }
        if self.revoked {
            return Err(TapError::AlreadyRevoked(label.to_string()));
        }
        Ok(())
    }
}

/// A single bounded authorization for one agent action, as mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub hash: IntentHash,
    pub agent_address: AgentAddress,
    pub user: String,
    pub user_signature: String,
    pub max_amount: Amount,
    pub merchant: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub executed: bool,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub execution_ref: Option<String>,
}

impl Intent {
    /// Validate the record-level invariants that hold regardless of time.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.expires_at <= self.created_at {
            return Err(TapError::InvalidInput(format!(
                "intent {} expires_at must be after created_at",
                self.hash
            )));
        }
        if self.executed && self.revoked {
            return Err(TapError::InvalidInput(format!(
                "intent {} cannot be both executed and revoked",
                self.hash
            )));
        }
        if self.execution_ref.is_some() && !self.executed {
            return Err(TapError::InvalidInput(format!(
                "intent {} has an execution reference but is not executed",
                self.hash
            )));
        }
        Ok(())
    }

    pub fn state(&self) -> IntentState {
        IntentState {
            max_amount: self.max_amount,
            expires_at: self.expires_at,
            executed: self.executed,
            revoked: self.revoked,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> IntentStatus {
        self.state().status_at(now)
    }
}
