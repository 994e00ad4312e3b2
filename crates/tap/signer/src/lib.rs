//! TAP Signer - the request-signing half of intent-scoped authorization.
//!
//! Every outbound request an agent makes on a user's behalf carries two
//! headers: `Signature-Input`, naming the covered components and parameters,
//! and `Signature`, an Ed25519 signature over the canonical base
//!
//! ```text
//! "@authority": <authority>
//! "@path": <path>
//! "@signature-params": ("@authority" "@path"); created=..; expires=..; keyId=".."; alg="ed25519"; nonce=".."; tag=".."
//! ```
//!
//! Signing is a pure function of its inputs: no shared state, no per-call
//! randomness beyond the caller-chosen nonce. Enforcing the validity window
//! and nonce freshness is the verifying party's job.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod base;
mod keys;
mod signer;
mod components;

pub use base::{SignatureParams, ALGORITHM, COVERED_COMPONENTS};
pub use keys::{AgentKeypair, KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH};
pub use signer::{
    sign, sign_with_base58, verify_signature, RequestSigner, SignatureHeaders, SignedRequest,
    SignerConfig, SIGNATURE_HEADER, SIGNATURE_INPUT_HEADER,
};
pub use components::UrlComponents;

/// Tag for product lookups and other browsing on a user's behalf.
pub const TAG_BROWSER_AUTH: &str = "agent-browser-auth";

/// Tag for checkout and payment requests.
pub const TAG_PAYER_AUTH: &str = "agent-payer-auth";
