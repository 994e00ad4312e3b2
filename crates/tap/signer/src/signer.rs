use chrono::Duration;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::sync::Arc;
use tap_types::{Clock, SystemClock, TapError};
use tracing::debug;
use uuid::Uuid;

use crate::base::SignatureParams;
use crate::components::UrlComponents;
use crate::keys::{decode_exact, AgentKeypair};
use crate::PUBLIC_KEY_LENGTH;

pub const SIGNATURE_INPUT_HEADER: &str = "Signature-Input";
pub const SIGNATURE_HEADER: &str = "Signature";

/// Signing defaults for one agent identity.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub key_id: String,
    /// Width of the `created..expires` window.
    pub validity: Duration,
    /// Signature label used in both headers.
    pub label: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            key_id: "primary-ed25519".to_string(),
            validity: Duration::minutes(8),
            label: "sig2".to_string(),
        }
    }
}

/// The two header values to attach to an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature_input: String,
    pub signature: String,
}

impl SignatureHeaders {
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (SIGNATURE_INPUT_HEADER, self.signature_input.as_str()),
            (SIGNATURE_HEADER, self.signature.as_str()),
        ]
    }

    /// Base58 signature value between the `:` delimiters.
    pub fn signature_value(&self) -> Option<&str> {
        let (_, rest) = self.signature.split_once("=:")?;
        rest.strip_suffix(':')
    }
}

/// Sign request metadata with an already decoded keypair.
pub fn sign(params: &SignatureParams, keypair: &AgentKeypair) -> Result<SignatureHeaders, TapError> {
    sign_labeled(params, keypair, "sig2")
}

/// Decode Base58 key material, then sign.
///
/// Key lengths are checked before anything is signed.
pub fn sign_with_base58(
    params: &SignatureParams,
    private_key: &str,
    public_key: &str,
) -> Result<SignatureHeaders, TapError> {
    let keypair = AgentKeypair::from_base58(private_key, public_key)?;
    sign(params, &keypair)
}

fn sign_labeled(
    params: &SignatureParams,
    keypair: &AgentKeypair,
    label: &str,
) -> Result<SignatureHeaders, TapError> {
    params.validate()?;
    let base = params.signature_base();
    debug!(
        authority = %params.authority,
        path = %params.path,
        key_id = %params.key_id,
        tag = %params.tag,
        "signing request"
    );
    let signature = keypair.sign_bytes(base.as_bytes());
    Ok(SignatureHeaders {
        signature_input: format!("{label}={}", params.serialize_params()),
        signature: format!(
            "{label}=:{}:",
            bs58::encode(signature.to_bytes()).into_string()
        ),
    })
}

/// Check a Base58 signature over a signature base.
///
/// Provided for verifying parties; nothing in the signing path calls it.
pub fn verify_signature(
    signature_base: &str,
    signature_base58: &str,
    public_key_base58: &str,
) -> Result<(), TapError> {
    let public = decode_exact::<PUBLIC_KEY_LENGTH>("public key", public_key_base58)?;
    let key = VerifyingKey::from_bytes(&public)
        .map_err(|e| TapError::InvalidKeyMaterial(format!("bad public key: {e}")))?;
    let raw = decode_exact::<{ ed25519_dalek::SIGNATURE_LENGTH }>("signature", signature_base58)?;
    let signature = Signature::from_bytes(&raw);
    key.verify(signature_base.as_bytes(), &signature)
        .map_err(|_| TapError::InvalidInput("signature does not match base".into()))
}

/// A signed request ready to be sent.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: String,
    pub components: UrlComponents,
    pub params: SignatureParams,
    pub headers: SignatureHeaders,
}

/// Signs outbound requests for a single agent identity.
#[derive(Clone)]
pub struct RequestSigner {
    keypair: AgentKeypair,
    config: SignerConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("keypair", &self.keypair)
            .field("config", &self.config)
            .finish()
    }
}

impl RequestSigner {
    pub fn new(keypair: AgentKeypair) -> Self {
        Self::with_config(keypair, SignerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(keypair: AgentKeypair, config: SignerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            keypair,
            config,
            clock,
        }
    }

    pub fn keypair(&self) -> &AgentKeypair {
        &self.keypair
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Sign a request to `url` with a fresh nonce and the configured window.
    pub fn sign_url(&self, url: &str, tag: &str) -> Result<SignedRequest, TapError> {
        let components = UrlComponents::parse(url)?;
        let created = self.clock.now().timestamp();
        let params = SignatureParams {
            authority: components.authority.clone(),
            path: components.path.clone(),
            key_id: self.config.key_id.clone(),
            nonce: Uuid::new_v4().to_string(),
            created,
            expires: created + self.config.validity.num_seconds(),
            tag: tag.to_string(),
        };
        let headers = sign_labeled(&params, &self.keypair, &self.config.label)?;
        Ok(SignedRequest {
            url: url.to_string(),
            components,
            params,
            headers,
        })
    }
}
