//! Key generation and request signing. Neither touches the store or the ledger.

use serde_json::json;
use std::sync::Arc;
use tap_signer::{AgentKeypair, RequestSigner};
use tap_types::SystemClock;

use crate::config::Settings;
use crate::output::print_json;

pub fn keygen() -> anyhow::Result<()> {
    let keypair = AgentKeypair::generate();
    let secret = keypair.secret_base58();
    print_json(&json!({
        "public_key": keypair.public_base58(),
        "private_key": secret.as_str(),
    }))?;
    eprintln!("export ED25519_PRIVATE_KEY and ED25519_PUBLIC_KEY to use this identity");
    Ok(())
}

pub fn sign(settings: &Settings, url: &str, tag: &str) -> anyhow::Result<()> {
    let keypair = settings.require_keypair()?;
    let signer = RequestSigner::with_config(
        keypair.clone(),
        settings.signer.clone(),
        Arc::new(SystemClock),
    );
    let signed = signer.sign_url(url, tag)?;
    let mut headers = serde_json::Map::new();
    for (name, value) in signed.headers.pairs() {
        headers.insert(name.to_string(), json!(value));
    }
    print_json(&json!({
        "url": signed.url,
        "base_url": signed.components.base_url,
        "nonce": signed.params.nonce,
        "created": signed.params.created,
        "expires": signed.params.expires,
        "headers": headers,
    }))
}
