//! Direct access to the local mirror.
//!
//! These tools never consult the ledger. Reads return `null` for unknown
//! records instead of failing.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tap_store::{AgentPatch, IntentPatch};
use tap_types::{Agent, Intent};
use tracing::info;

use crate::args::{self, decode, encode};
use crate::context::ToolContext;
use crate::error::{ToolError, ToolOutcome};
use crate::registry::ToolHandler;
use crate::types::{ToolAnnotations, ToolSpec};

pub(crate) fn handlers() -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(SaveAgentTool::new()),
        Arc::new(GetAgentTool::new()),
        Arc::new(UpdateAgentTool::new()),
        Arc::new(SaveIntentTool::new()),
        Arc::new(GetIntentTool::new()),
        Arc::new(UpdateIntentStatusTool::new()),
    ]
}

struct SaveAgentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveAgentArgs {
    #[serde(alias = "address")]
    agent_pda: String,
    public_key: String,
    #[serde(alias = "private_key_ref")]
    private_key: String,
    owner: String,
    #[serde(default)]
    reputation_score: Option<i64>,
    #[serde(default)]
    registered_at: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    total_intents: Option<i64>,
    #[serde(default)]
    successful_txns: Option<i64>,
    #[serde(default)]
    failed_txns: Option<i64>,
    #[serde(default)]
    metadata_uri: Option<String>,
}

impl SaveAgentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "save_agent_to_db",
                "Insert or replace an agent record in the local store",
                json!({
                    "type": "object",
                    "properties": {
                        "agent_pda": { "type": "string", "description": "Agent address" },
                        "public_key": { "type": "string" },
                        "private_key": { "type": "string", "description": "Local signing material or a reference to it" },
                        "owner": { "type": "string" },
                        "reputation_score": { "type": "integer" },
                        "registered_at": { "type": "string", "format": "date-time" },
                        "is_active": { "type": "boolean" },
                        "total_intents": { "type": "integer", "minimum": 0 },
                        "successful_txns": { "type": "integer", "minimum": 0 },
                        "failed_txns": { "type": "integer", "minimum": 0 },
                        "metadata_uri": { "type": "string" }
                    },
                    "required": ["agent_pda", "public_key", "private_key", "owner"]
                }),
                ToolAnnotations::mutating().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for SaveAgentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: SaveAgentArgs = decode(arguments)?;
        let registered_at = match args::non_empty(args.registered_at) {
            Some(raw) => args::timestamp("registered_at", &raw)?,
            None => ctx.clock.now(),
        };
        let agent = Agent {
            address: args::agent(args.agent_pda)?,
            public_key: args.public_key,
            private_key_ref: args.private_key,
            owner: args.owner,
            reputation_score: args.reputation_score.unwrap_or_default(),
            registered_at,
            is_active: args.is_active.unwrap_or(true),
            total_intents: args::counter("total_intents", args.total_intents)?,
            successful_txns: args::counter("successful_txns", args.successful_txns)?,
            failed_txns: args::counter("failed_txns", args.failed_txns)?,
            metadata_uri: args.metadata_uri.unwrap_or_default(),
        };
        ctx.store.upsert_agent(agent.clone()).await?;
        info!(agent = %agent.address, "agent saved to local store");
        encode(&agent)
    }
}

struct GetAgentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentLookupArgs {
    #[serde(alias = "address")]
    agent_pda: String,
}

impl GetAgentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "get_agent_from_db",
                "Read an agent record from the local store; null when absent",
                json!({
                    "type": "object",
                    "properties": { "agent_pda": { "type": "string" } },
                    "required": ["agent_pda"]
                }),
                ToolAnnotations::read_only().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for GetAgentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: AgentLookupArgs = decode(arguments)?;
        let agent = ctx.store.get_agent(&args::agent(args.agent_pda)?).await?;
        encode(&agent)
    }
}

struct UpdateAgentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateAgentArgs {
    #[serde(alias = "address")]
    agent_pda: String,
    /// An object, or a string holding one.
    updates: Value,
}

impl UpdateAgentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "update_agent_in_db",
                "Apply a partial update to a stored agent. Only reputation_score, is_active, \
                 total_intents, successful_txns, failed_txns and metadata_uri may change",
                json!({
                    "type": "object",
                    "properties": {
                        "agent_pda": { "type": "string" },
                        "updates": {
                            "type": ["object", "string"],
                            "description": "Fields to change, as an object or a JSON string such as '{\"reputation_score\": 10}'"
                        }
                    },
                    "required": ["agent_pda", "updates"]
                }),
                ToolAnnotations::mutating().local(),
            ),
        }
    }
}

fn agent_patch(updates: Value) -> ToolOutcome<AgentPatch> {
    let updates = match updates {
        Value::String(raw) => serde_json::from_str::<Value>(&raw)
            .map_err(|e| ToolError::InvalidArguments(format!("updates is not valid JSON: {e}")))?,
        other => other,
    };
    if !updates.is_object() {
        return Err(ToolError::InvalidArguments(
            "updates must be a JSON object".to_string(),
        ));
    }
    let patch: AgentPatch = serde_json::from_value(updates)
        .map_err(|e| ToolError::InvalidArguments(format!("updates: {e}")))?;
    patch.validate()?;
    Ok(patch)
}

#[async_trait]
impl ToolHandler for UpdateAgentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: UpdateAgentArgs = decode(arguments)?;
        let address = args::agent(args.agent_pda)?;
        let patch = agent_patch(args.updates)?;
        let agent = ctx.store.update_agent(&address, patch).await?;
        encode(&agent)
    }
}

struct SaveIntentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveIntentArgs {
    intent_hash: String,
    #[serde(alias = "agent")]
    agent_id: String,
    user: String,
    user_signature: String,
    max_amount: i64,
    merchant: String,
    #[serde(default)]
    created_at: Option<String>,
    expires_at: String,
    #[serde(default)]
    executed: Option<bool>,
    #[serde(default)]
    revoked: Option<bool>,
    #[serde(default, alias = "execution_ref")]
    execution_tx: Option<String>,
    /// Ledger address to index, when known.
    #[serde(default)]
    intent_address: Option<String>,
}

impl SaveIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "save_intent_to_db",
                "Insert or replace an intent record in the local store",
                json!({
                    "type": "object",
                    "properties": {
                        "intent_hash": { "type": "string", "description": "64 hex chars" },
                        "agent_id": { "type": "string" },
                        "user": { "type": "string" },
                        "user_signature": { "type": "string" },
                        "max_amount": { "type": "integer", "minimum": 0 },
                        "merchant": { "type": "string" },
                        "created_at": { "type": "string", "format": "date-time" },
                        "expires_at": { "type": "string", "format": "date-time" },
                        "executed": { "type": "boolean" },
                        "revoked": { "type": "boolean" },
                        "execution_tx": { "type": "string", "description": "Empty means none" },
                        "intent_address": { "type": "string" }
                    },
                    "required": ["intent_hash", "agent_id", "user", "user_signature", "max_amount", "merchant", "expires_at"]
                }),
                ToolAnnotations::mutating().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for SaveIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: SaveIntentArgs = decode(arguments)?;
        let created_at = match args::non_empty(args.created_at) {
            Some(raw) => args::timestamp("created_at", &raw)?,
            None => ctx.clock.now(),
        };
        let intent = Intent {
            hash: args::intent_hash(&args.intent_hash)?,
            agent_address: args::agent(args.agent_id)?,
            user: args.user,
            user_signature: args.user_signature,
            max_amount: args::amount("max_amount", args.max_amount)?,
            merchant: args.merchant,
            created_at,
            expires_at: args::timestamp("expires_at", &args.expires_at)?,
            executed: args.executed.unwrap_or(false),
            revoked: args.revoked.unwrap_or(false),
            execution_ref: args::non_empty(args.execution_tx),
        };
        let address = args::non_empty(args.intent_address)
            .map(args::intent_address)
            .transpose()?;

        ctx.store.upsert_intent(intent.clone()).await?;
        if let Some(address) = &address {
            ctx.store.index_intent_address(address, &intent.hash).await?;
        }
        info!(intent_hash = %intent.hash, "intent saved to local store");
        encode(&intent)
    }
}

struct GetIntentTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IntentLookupArgs {
    intent_hash: String,
}

impl GetIntentTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "get_intent_from_db",
                "Read an intent record from the local store; null when absent",
                json!({
                    "type": "object",
                    "properties": { "intent_hash": { "type": "string" } },
                    "required": ["intent_hash"]
                }),
                ToolAnnotations::read_only().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for GetIntentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: IntentLookupArgs = decode(arguments)?;
        let intent = ctx
            .store
            .get_intent(&args::intent_hash(&args.intent_hash)?)
            .await?;
        encode(&intent)
    }
}

struct UpdateIntentStatusTool {
    spec: ToolSpec,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateIntentStatusArgs {
    intent_hash: String,
    executed: bool,
    revoked: bool,
    #[serde(default, alias = "execution_ref")]
    execution_tx: Option<String>,
}

impl UpdateIntentStatusTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "update_intent_status_in_db",
                "Set the lifecycle flags of a stored intent. Terminal flags cannot be cleared \
                 and an intent cannot be both executed and revoked",
                json!({
                    "type": "object",
                    "properties": {
                        "intent_hash": { "type": "string" },
                        "executed": { "type": "boolean" },
                        "revoked": { "type": "boolean" },
                        "execution_tx": { "type": "string", "description": "Empty means none" }
                    },
                    "required": ["intent_hash", "executed", "revoked"]
                }),
                ToolAnnotations::mutating().local(),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for UpdateIntentStatusTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value> {
        let args: UpdateIntentStatusArgs = decode(arguments)?;
        let hash = args::intent_hash(&args.intent_hash)?;
        let patch = IntentPatch {
            executed: Some(args.executed),
            revoked: Some(args.revoked),
            execution_ref: args::non_empty(args.execution_tx),
        };
        let intent = ctx.store.update_intent(&hash, patch).await?;
        encode(&intent)
    }
}
