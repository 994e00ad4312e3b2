use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use tap_types::TapError;
use zeroize::Zeroizing;

/// Decoded keypair length: 32-byte seed followed by the 32-byte public key.
pub const KEYPAIR_LENGTH: usize = ed25519_dalek::KEYPAIR_LENGTH;

pub const PUBLIC_KEY_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// An agent's Ed25519 signing identity.
///
/// Keys travel as Base58 strings. Decoding enforces exact lengths before any
/// cryptographic operation is attempted.
#[derive(Clone)]
pub struct AgentKeypair {
    signing: SigningKey,
}

impl AgentKeypair {
    /// Fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Decode a 64-byte Base58 keypair and check it against a Base58 public key.
    pub fn from_base58(secret: &str, public: &str) -> Result<Self, TapError> {
        let keypair = Self::from_secret_base58(secret)?;
        let public_bytes = decode_exact::<PUBLIC_KEY_LENGTH>("public key", public)?;
        if keypair.signing.verifying_key().as_bytes() != &*public_bytes {
            return Err(TapError::InvalidKeyMaterial(
                "public key does not belong to the supplied keypair".into(),
            ));
        }
        Ok(keypair)
    }

    /// Decode a 64-byte Base58 keypair.
    pub fn from_secret_base58(secret: &str) -> Result<Self, TapError> {
        let bytes = decode_exact::<KEYPAIR_LENGTH>("private key", secret)?;
        let signing = SigningKey::from_keypair_bytes(&bytes).map_err(|_| {
            TapError::InvalidKeyMaterial("keypair halves do not match".into())
        })?;
        Ok(Self { signing })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.signing.verifying_key().to_bytes()
    }

    pub fn public_base58(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// Base58 export of the full 64-byte keypair.
    pub fn secret_base58(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing.to_keypair_bytes());
        Zeroizing::new(bs58::encode(&*bytes).into_string())
    }

    pub fn sign_bytes(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for AgentKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKeypair")
            .field("public", &self.public_base58())
            .finish_non_exhaustive()
    }
}

pub(crate) fn decode_exact<const N: usize>(
    what: &str,
    encoded: &str,
) -> Result<Zeroizing<[u8; N]>, TapError> {
    let decoded = Zeroizing::new(
        bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| TapError::InvalidKeyMaterial(format!("{what} is not base58: {e}")))?,
    );
    if decoded.len() != N {
        return Err(TapError::InvalidKeyMaterial(format!(
            "{what} must decode to {N} bytes, got {}",
            decoded.len()
        )));
    }
    let mut out = Zeroizing::new([0u8; N]);
    out.copy_from_slice(&decoded);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58_export_round_trips() {
        let keypair = AgentKeypair::generate();
        let restored =
            AgentKeypair::from_base58(&keypair.secret_base58(), &keypair.public_base58()).unwrap();
        assert_eq!(restored.public_key_bytes(), keypair.public_key_bytes());
    }

    #[test]
    fn wrong_length_secret_is_rejected() {
        let short = bs58::encode([7u8; 32]).into_string();
        assert!(matches!(
            AgentKeypair::from_secret_base58(&short),
            Err(TapError::InvalidKeyMaterial(_))
        ));
        let long = bs58::encode([7u8; 65]).into_string();
        assert!(matches!(
            AgentKeypair::from_secret_base58(&long),
            Err(TapError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let a = AgentKeypair::generate();
        let b = AgentKeypair::generate();
        assert!(matches!(
            AgentKeypair::from_base58(&a.secret_base58(), &b.public_base58()),
            Err(TapError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn debug_output_hides_secret() {
        let keypair = AgentKeypair::generate();
        let rendered = format!("{keypair:?}");
        assert!(!rendered.contains(keypair.secret_base58().as_str()));
    }
}
