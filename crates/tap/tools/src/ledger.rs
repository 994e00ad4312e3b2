//! Tools backed by the ledger: registration, intent lifecycle, reputation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tap_intent::{ExecuteIntent, RecordIntent, RegisterAgent, ReputationReason};
use tap_signer::AgentKeypair;
use zeroize::Zeroizing;

use crate::args::{self, decode, encode};
use crate::context::ToolContext;
use crate::error::ToolOutcome;
use crate::registry::ToolHandler;
use crate::types::{ToolAnnotations, ToolSpec};

pub(crate) fn handlers() -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(RegisterAgentTool::new()),
        Arc::new(RecordIntentTool::new()),
        Arc::new(VerifyIntentTool::new()),
        Arc::new(ExecuteIntentTool::new()),
        Arc::new(RevokeIntentTool::new()),
        Arc::new(UpdateReputationTool::new()),
        Arc::new(GetAgentScoreTool::new()),
    ]
}

struct RegisterAgentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterAgentArgs {
    owner: String,
    private_key: String,
    public_key: String,
    #[serde(default)]
    private_key_ref: Option<String>,
    #[serde(default)]
    metadata_uri: Option<String>,
}

impl RegisterAgentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "register_agent",
                "Register an agent's Ed25519 public key on the ledger and store its record locally",
                json!({
                    "type": "object",
                    "properties": {
                        "owner": { "type": "string", "description": "Owner wallet or identifier" },
                        "private_key": { "type": "string", "description": "Base58 64-byte keypair; used locally only" },
                        "public_key": { "type": "string", "description": "Base58 32-byte public key" },
                        "private_key_ref": { "type": "string", "description": "Where the secret is kept, stored instead of the secret" },
                        "metadata_uri": { "type": "string" }
                    },
                    "required": ["owner", "private_key", "public_key"]
                }),
                ToolAnnotations::mutating(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for RegisterAgentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: RegisterAgentArgs = decode(arguments)?;
        let secret = Zeroizing::new(args.private_key);
        let keypair = AgentKeypair::from_base58(&secret, &args.public_key)?;
        let agent = ctx
            .agents
            .register(RegisterAgent {
                owner: args.owner,
                keypair: &keypair,
                private_key_ref: args
                    .private_key_ref
                    .unwrap_or_else(|| "held-by-caller".to_string()),
                metadata_uri: args.metadata_uri.unwrap_or_default(),
            })
            .await?;
        encode(&agent)
    }
}

struct RecordIntentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordIntentArgs {
    agent: String,
    max_amount: i64,
    action: String,
    ttl_seconds: i64,
    #[serde(default)]
    intent_hash: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    user_signature: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
}

impl RecordIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "record_intent",
                "Record a bounded, time-limited intent for an agent before it acts",
                json!({
                    "type": "object",
                    "properties": {
                        "agent": { "type": "string", "description": "Agent address" },
                        "max_amount": { "type": "integer", "minimum": 0, "description": "Upper bound in the smallest currency unit" },
                        "action": { "type": "string", "description": "Action label, e.g. checkout" },
                        "ttl_seconds": { "type": "integer", "minimum": 1 },
                        "intent_hash": { "type": "string", "description": "64 hex chars; generated when omitted" },
                        "user": { "type": "string" },
                        "user_signature": { "type": "string" },
                        "merchant": { "type": "string" }
                    },
                    "required": ["agent", "max_amount", "action", "ttl_seconds"]
                }),
                ToolAnnotations::mutating(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for RecordIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: RecordIntentArgs = decode(arguments)?;
        let max_amount = args::amount("max_amount", args.max_amount)?;
        let ttl_seconds = args::positive_ttl(args.ttl_seconds)?;
        let hash = match args::non_empty(args.intent_hash) {
            Some(raw) => args::intent_hash(&raw)?,
            None => ctx.manager.generate_intent_hash(),
        };

        let request = RecordIntent::new(
            args::agent(args.agent)?,
            hash.clone(),
            max_amount,
            args.action,
            ttl_seconds,
        )
        .authorized_by(
            args.user.unwrap_or_default(),
            args.user_signature.unwrap_or_default(),
        )
        .with_merchant(args.merchant.unwrap_or_default());

        let recorded = ctx.manager.record_intent(request).await?;
        Ok(json!({
            "intent_hash": hash,
            "intent_address": recorded.address,
            "created_at": recorded.created_at,
            "expires_at": recorded.expires_at,
        }))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentAddressArgs {
    intent_address: String,
}

fn intent_address_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "intent_address": { "type": "string", "description": "Ledger address of the intent" }
        },
        "required": ["intent_address"]
    })
}

struct VerifyIntentTool {
    spec: ToolSpec,
}

impl VerifyIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "verify_intent",
                "Report whether an intent is active, executed, revoked, expired or unknown",
                intent_address_schema(),
                ToolAnnotations::read_only(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for VerifyIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: IntentAddressArgs = decode(arguments)?;
        let address = args::intent_address(args.intent_address)?;
        let status = ctx.manager.verify_intent(&address).await?;
        Ok(json!({ "intent_address": address, "status": status }))
    }
}

struct ExecuteIntentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteIntentArgs {
    action_id: String,
    intent_address: String,
    agent: String,
    amount: i64,
    private_key: String,
    public_key: String,
}

impl ExecuteIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "execute_intent",
                "Settle an active intent for an amount within its bound; at most once per intent",
                json!({
                    "type": "object",
                    "properties": {
                        "action_id": { "type": "string", "description": "Caller's id for the guarded action, e.g. an order id" },
                        "intent_address": { "type": "string" },
                        "agent": { "type": "string" },
                        "amount": { "type": "integer", "minimum": 0 },
                        "private_key": { "type": "string", "description": "Base58 keypair; signs the settlement locally" },
                        "public_key": { "type": "string" }
                    },
                    "required": ["action_id", "intent_address", "agent", "amount", "private_key", "public_key"]
                }),
                ToolAnnotations::destructive(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for ExecuteIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: ExecuteIntentArgs = decode(arguments)?;
        let secret = Zeroizing::new(args.private_key);
        let request = ExecuteIntent {
            action_id: args.action_id,
            intent_address: args::intent_address(args.intent_address)?,
            agent: args::agent(args.agent)?,
            amount: args::amount("amount", args.amount)?,
            agent_secret: secret,
            agent_public_key: args.public_key,
        };
        let address = request.intent_address.clone();
        let execution_ref = ctx.manager.execute_intent(request).await?;
        Ok(json!({ "intent_address": address, "execution_ref": execution_ref }))
    }
}

struct RevokeIntentTool {
    spec: ToolSpec,
}

impl RevokeIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "revoke_intent",
                "Revoke an intent that has not been executed",
                intent_address_schema(),
                ToolAnnotations::destructive(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for RevokeIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: IntentAddressArgs = decode(arguments)?;
        let address = args::intent_address(args.intent_address)?;
        ctx.manager.revoke_intent(&address).await?;
        Ok(json!({ "intent_address": address, "revoked": true }))
    }
}

struct UpdateReputationTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateReputationArgs {
    agent: String,
    delta: i64,
    reason: String,
}

impl UpdateReputationTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "update_reputation",
                "Apply a signed reputation delta to an agent",
                json!({
                    "type": "object",
                    "properties": {
                        "agent": { "type": "string" },
                        "delta": { "type": "integer" },
                        "reason": {
                            "type": "string",
                            "description": "successful_transaction, failed_transaction, or free text"
                        }
                    },
                    "required": ["agent", "delta", "reason"]
                }),
                ToolAnnotations::mutating(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for UpdateReputationTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: UpdateReputationArgs = decode(arguments)?;
        let agent = args::agent(args.agent)?;
        let reason = ReputationReason::parse(&args.reason);
        let score = ctx
            .reputation
            .update_reputation(&agent, args.delta, reason)
            .await?;
        Ok(json!({ "agent": agent, "score": score }))
    }
}

struct GetAgentScoreTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentArgs {
    agent: String,
}

impl GetAgentScoreTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "get_agent_score",
                "Read an agent's reputation score from the ledger",
                json!({
                    "type": "object",
                    "properties": { "agent": { "type": "string" } },
                    "required": ["agent"]
                }),
                ToolAnnotations::read_only(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for GetAgentScoreTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: AgentArgs = decode(arguments)?;
        let agent = args::agent(args.agent)?;
        let score = ctx.reputation.get_agent_score(&agent).await?;
        Ok(json!({ "agent": agent, "score": score }))
    }
}
