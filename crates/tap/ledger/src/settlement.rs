use serde::{Deserialize, Serialize};
use tap_signer::{verify_signature, AgentKeypair};
use tap_types::{AgentAddress, Amount, IntentAddress, TapError};

const DOMAIN: &str = "tap-settlement";

/// Proof that the agent's key holder approved one settlement.
///
/// Carries the public key and an Ed25519 signature over the settlement
/// message; the agent secret itself never leaves the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementAuthorization {
    pub action_id: String,
    pub intent_address: IntentAddress,
    pub agent: AgentAddress,
    pub amount: Amount,
    /// Base58 Ed25519 public key.
    pub public_key: String,
    /// Base58 Ed25519 signature over [`Self::message`].
    pub signature: String,
}

impl SettlementAuthorization {
    pub fn sign(
        keypair: &AgentKeypair,
        action_id: impl Into<String>,
        intent_address: IntentAddress,
        agent: AgentAddress,
        amount: Amount,
    ) -> Self {
        let action_id = action_id.into();
        let message = Self::message(&action_id, &intent_address, &agent, amount);
        let signature = keypair.sign_bytes(message.as_bytes());
        Self {
            action_id,
            intent_address,
            agent,
            amount,
            public_key: keypair.public_base58(),
            signature: bs58::encode(signature.to_bytes()).into_string(),
        }
    }

    /// Canonical message: one field per line, no trailing newline.
    pub fn message(
        action_id: &str,
        intent_address: &IntentAddress,
        agent: &AgentAddress,
        amount: Amount,
    ) -> String {
        format!("{DOMAIN}\n{action_id}\n{intent_address}\n{agent}\n{amount}")
    }

    /// Check the signature against the carried public key.
    pub fn verify(&self) -> Result<(), TapError> {
        let message = Self::message(&self.action_id, &self.intent_address, &self.agent, self.amount);
        verify_signature(&message, &self.signature, &self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorization(keypair: &AgentKeypair) -> SettlementAuthorization {
        SettlementAuthorization::sign(
            keypair,
            "checkout-1",
            IntentAddress("intent-1".into()),
            AgentAddress("agent-1".into()),
            500,
        )
    }

    #[test]
    fn signed_authorization_verifies() {
        let keypair = AgentKeypair::generate();
        assert!(authorization(&keypair).verify().is_ok());
    }

    #[test]
    fn altered_amount_fails_verification() {
        let keypair = AgentKeypair::generate();
        let mut auth = authorization(&keypair);
        auth.amount += 1;
        assert!(auth.verify().is_err());
    }

    #[test]
    fn serialized_form_has_no_secret() {
        let keypair = AgentKeypair::generate();
        let json = serde_json::to_string(&authorization(&keypair)).unwrap();
        assert!(!json.contains(keypair.secret_base58().as_str()));
    }
}
