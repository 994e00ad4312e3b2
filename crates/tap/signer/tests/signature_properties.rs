//! Property tests for the request signer: determinism, binding of every
//! covered field, and the key-length guard.

use proptest::prelude::*;
use tap_signer::*;
use tap_types::TapError;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_params() -> impl Strategy<Value = SignatureParams> {
    (
        "[a-z]{1,12}\\.example(:[0-9]{2,5})?",
        "/[a-z0-9/]{1,24}",
        "[a-z0-9-]{4,20}",
        "[a-f0-9]{8,32}",
        1_600_000_000i64..1_900_000_000,
        1i64..10_000,
        prop_oneof![Just(TAG_BROWSER_AUTH), Just(TAG_PAYER_AUTH)],
    )
        .prop_map(|(authority, path, key_id, nonce, created, width, tag)| SignatureParams {
            authority,
            path,
            key_id,
            nonce,
            created,
            expires: created + width,
            tag: tag.to_string(),
        })
}

/// Replace the character at `index % len` with a different ASCII letter.
fn flip(value: &str, index: usize) -> String {
    let mut bytes = value.as_bytes().to_vec();
    let i = index % bytes.len();
    bytes[i] = if bytes[i] == b'q' { b'z' } else { b'q' };
    String::from_utf8(bytes).unwrap()
}

fn mutate(params: &SignatureParams, field: u8, index: usize) -> SignatureParams {
    let mut out = params.clone();
    match field % 6 {
        0 => out.authority = flip(&params.authority, index),
        1 => out.path = flip(&params.path, index),
        2 => out.nonce = flip(&params.nonce, index),
        3 => out.created -= 1,
        4 => out.expires += 1,
        _ => out.tag = flip(&params.tag, index),
    }
    out
}

fn signature_of(headers: &SignatureHeaders) -> String {
    headers.signature_value().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn signing_is_deterministic(params in arb_params()) {
        let keypair = AgentKeypair::generate();
        let first = sign(&params, &keypair).unwrap();
        let second = sign(&params, &keypair).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn signature_verifies_against_its_own_base(params in arb_params()) {
        let keypair = AgentKeypair::generate();
        let headers = sign(&params, &keypair).unwrap();
        prop_assert!(verify_signature(
            &params.signature_base(),
            &signature_of(&headers),
            &keypair.public_base58(),
        )
        .is_ok());
    }

    #[test]
    fn any_changed_field_breaks_verification(
        params in arb_params(),
        field in any::<u8>(),
        index in any::<usize>(),
    ) {
        let keypair = AgentKeypair::generate();
        let tampered = mutate(&params, field, index);
        prop_assume!(tampered != params);

        let headers = sign(&tampered, &keypair).unwrap();
        let result = verify_signature(
            &params.signature_base(),
            &signature_of(&headers),
            &keypair.public_base58(),
        );
        prop_assert!(result.is_err());
    }

    #[test]
    fn wrong_length_private_key_is_rejected(
        params in arb_params(),
        len in (0usize..128).prop_filter("keypair length", |n| *n != KEYPAIR_LENGTH),
    ) {
        let keypair = AgentKeypair::generate();
        let secret = bs58::encode(vec![42u8; len]).into_string();
        let result = sign_with_base58(&params, &secret, &keypair.public_base58());
        prop_assert!(matches!(result, Err(TapError::InvalidKeyMaterial(_))));
    }
}

#[test]
fn base58_keys_sign_identically_to_decoded_keypair() {
    let keypair = AgentKeypair::generate();
    let params = SignatureParams {
        authority: "localhost:3001".into(),
        path: "/product/1".into(),
        key_id: "primary-ed25519".into(),
        nonce: "e8f5a3c1".into(),
        created: 1_735_689_600,
        expires: 1_735_690_080,
        tag: TAG_BROWSER_AUTH.into(),
    };

    let direct = sign(&params, &keypair).unwrap();
    let decoded = sign_with_base58(&params, &keypair.secret_base58(), &keypair.public_base58())
        .unwrap();

    assert_eq!(direct, decoded);
    assert_eq!(
        direct.signature_input,
        "sig2=(\"@authority\" \"@path\"); created=1735689600; expires=1735690080; \
         keyId=\"primary-ed25519\"; alg=\"ed25519\"; nonce=\"e8f5a3c1\"; tag=\"agent-browser-auth\""
    );
}

#[test]
fn invalid_params_fail_before_signing() {
    let keypair = AgentKeypair::generate();
    let params = SignatureParams {
        authority: "localhost:3001".into(),
        path: "/product/1".into(),
        key_id: "primary-ed25519".into(),
        nonce: "n1".into(),
        created: 100,
        expires: 100,
        tag: TAG_BROWSER_AUTH.into(),
    };
    assert!(matches!(sign(&params, &keypair), Err(TapError::InvalidInput(_))));
}
