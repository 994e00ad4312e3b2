use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tap_signer::{SIGNATURE_HEADER, SIGNATURE_INPUT_HEADER, TAG_BROWSER_AUTH};

use crate::args::decode;
use crate::context::ToolContext;
use crate::error::{ToolError, ToolOutcome};
use crate::registry::ToolHandler;
use crate::types::{ToolAnnotations, ToolSpec};

pub(crate) fn handlers() -> Vec<Arc<dyn ToolHandler>> {
    vec![Arc::new(SignRequestTool::new())]
}

struct SignRequestTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SignRequestArgs {
    url: String,
    #[serde(default)]
    tag: Option<String>,
}

impl SignRequestTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "sign_request",
                "Produce Signature-Input and Signature headers for an outbound request to a URL",
                json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "format": "uri" },
                        "tag": {
                            "type": "string",
                            "description": "agent-browser-auth (default) or agent-payer-auth"
                        }
                    },
                    "required": ["url"]
                }),
                ToolAnnotations::read_only().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for SignRequestTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: SignRequestArgs = decode(arguments)?;
        let signer = ctx
            .signer
            .as_ref()
            .ok_or_else(|| ToolError::NotConfigured("no signing identity loaded".to_string()))?;
        let tag = args.tag.unwrap_or_else(|| TAG_BROWSER_AUTH.to_string());
        let signed = signer.sign_url(&args.url, &tag)?;
        Ok(json!({
            "url": signed.url,
            "authority": signed.components.authority,
            "path": signed.components.path,
            "base_url": signed.components.base_url,
            "key_id": signed.params.key_id,
            "nonce": signed.params.nonce,
            "created": signed.params.created,
            "expires": signed.params.expires,
            "tag": signed.params.tag,
            "headers": {
                SIGNATURE_INPUT_HEADER: signed.headers.signature_input,
                SIGNATURE_HEADER: signed.headers.signature,
            },
        }))
    }
}
