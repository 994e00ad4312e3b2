//! Identifier types for agents and intents.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TapError;

/// Ledger-derived address of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentAddress(pub String);

impl AgentAddress {
    /// Wrap an address, rejecting blank input.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TapError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TapError::InvalidInput("agent address is empty".into()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TapError::InvalidInput(format!(
                "agent address `{trimmed}` contains whitespace"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger-derived address of a recorded intent account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentAddress(pub String);

impl IntentAddress {
    pub fn parse(raw: impl Into<String>) -> Result<Self, TapError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(TapError::InvalidInput(format!(
                "malformed intent address `{trimmed}`"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a single intent.
///
/// Always 64 lowercase hex characters (256 bits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentHash(String);

impl IntentHash {
    pub const HEX_LEN: usize = 64;

    /// Fresh, unpredictable hash drawn from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Content-derived hash over the inputs that define an intent.
    pub fn derive(
        agent: &AgentAddress,
        action: &str,
        nonce: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tap-intent-hash\n");
        for part in [
            agent.as_str(),
            action,
            nonce,
            &timestamp.timestamp_millis().to_string(),
        ] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Accept an externally supplied hash after shape validation.
    pub fn parse(raw: &str) -> Result<Self, TapError> {
        let raw = raw.trim();
        if raw.len() != Self::HEX_LEN || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TapError::InvalidInput(format!(
                "intent hash must be {} hex characters",
                Self::HEX_LEN
            )));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_hashes_are_distinct() {
        let hashes: HashSet<_> = (0..10_000).map(|_| IntentHash::generate()).collect();
        assert_eq!(hashes.len(), 10_000);
    }

    #[test]
    fn generated_hash_parses_back() {
        let hash = IntentHash::generate();
        assert_eq!(hash.as_str().len(), IntentHash::HEX_LEN);
        assert_eq!(IntentHash::parse(hash.as_str()).unwrap(), hash);
    }

    #[test]
    fn derived_hash_binds_every_input() {
        let agent = AgentAddress::parse("agentX").unwrap();
        let at = Utc::now();
        let base = IntentHash::derive(&agent, "checkout", "n-1", at);
        assert_eq!(base, IntentHash::derive(&agent, "checkout", "n-1", at));
        assert_ne!(base, IntentHash::derive(&agent, "checkout", "n-2", at));
        assert_ne!(base, IntentHash::derive(&agent, "lookup", "n-1", at));
        // length prefixes keep field boundaries unambiguous
        assert_ne!(
            IntentHash::derive(&agent, "ab", "c", at),
            IntentHash::derive(&agent, "a", "bc", at)
        );
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        assert!(AgentAddress::parse("  ").is_err());
        assert!(AgentAddress::parse("has space").is_err());
        assert!(IntentAddress::parse("").is_err());
        assert!(IntentHash::parse("abc").is_err());
        assert!(IntentHash::parse(&"z".repeat(64)).is_err());
    }
}
