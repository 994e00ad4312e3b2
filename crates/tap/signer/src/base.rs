use tap_types::TapError;

/// Components covered by every signature, in signing order.
pub const COVERED_COMPONENTS: [&str; 2] = ["@authority", "@path"];

/// Fixed signature algorithm label.
pub const ALGORITHM: &str = "ed25519";

/// Request metadata bound into a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    pub authority: String,
    pub path: String,
    pub key_id: String,
    pub nonce: String,
    /// Unix seconds.
    pub created: i64,
    /// Unix seconds.
    pub expires: i64,
    pub tag: String,
}

impl SignatureParams {
    /// Reject values that would make the base or the headers ambiguous.
    pub fn validate(&self) -> Result<(), TapError> {
        if self.authority.is_empty() {
            return Err(TapError::InvalidInput("authority is empty".into()));
        }
        if self.path.is_empty() {
            return Err(TapError::InvalidInput("path is empty".into()));
        }
        for (name, value) in [("authority", &self.authority), ("path", &self.path)] {
            if value.contains(['\n', '\r']) {
                return Err(TapError::InvalidInput(format!(
                    "{name} must be a single line"
                )));
            }
        }
        for (name, value) in [
            ("keyId", &self.key_id),
            ("nonce", &self.nonce),
            ("tag", &self.tag),
        ] {
            if value.is_empty() {
                return Err(TapError::InvalidInput(format!("{name} is empty")));
            }
            if value.contains(['"', '\n', '\r', ';']) {
                return Err(TapError::InvalidInput(format!(
                    "{name} contains a reserved character"
                )));
            }
        }
        if self.expires <= self.created {
            return Err(TapError::InvalidInput(format!(
                "expires ({}) must be after created ({})",
                self.expires, self.created
            )));
        }
        Ok(())
    }

    /// Serialized `@signature-params` value; also the body of `Signature-Input`.
    pub fn serialize_params(&self) -> String {
        let components = COVERED_COMPONENTS
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "({components}); created={}; expires={}; keyId=\"{}\"; alg=\"{ALGORITHM}\"; nonce=\"{}\"; tag=\"{}\"",
            self.created, self.expires, self.key_id, self.nonce, self.tag
        )
    }

    /// Canonical signature base: three lines, no trailing newline.
    pub fn signature_base(&self) -> String {
        [
            format!("\"@authority\": {}", self.authority),
            format!("\"@path\": {}", self.path),
            format!("\"@signature-params\": {}", self.serialize_params()),
        ]
        .join("\n")
    }
}
