use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ToolContext;
use crate::error::{ToolError, ToolOutcome};
use crate::types::{ToolCall, ToolResult, ToolSpec};
use crate::{db, ledger, signing};

/// One named tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn call(&self, ctx: &ToolContext, arguments: Value) -> ToolOutcome<Value>;
}

/// Name-indexed tool table bound to a [`ToolContext`].
pub struct ToolRegistry {
    context: Arc<ToolContext>,
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self {
            context,
            handlers: BTreeMap::new(),
        }
    }

    /// Registry with every built-in tool.
    pub fn standard(context: Arc<ToolContext>) -> Self {
        let mut registry = Self::new(context);
        for handler in ledger::handlers()
            .into_iter()
            .chain(signing::handlers())
            .chain(db::handlers())
        {
            registry.register(handler);
        }
        registry
    }

    /// Add a tool; a later registration under the same name replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.spec().name.clone();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(tool = %name, "tool registration replaced an existing handler");
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    /// Specs in name order.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.handlers.values().map(|h| h.spec().clone()).collect()
    }

    /// Run a tool. Every failure comes back as an error result.
    pub async fn invoke(&self, call: ToolCall) -> ToolResult {
        debug!(tool = %call.name, "tool call");
        let outcome = match self.handlers.get(&call.name) {
            Some(handler) => handler.call(&self.context, call.arguments).await,
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };
        match outcome {
            Ok(value) => ToolResult::json(value),
            Err(e) => {
                info!(tool = %call.name, kind = e.kind(), error = %e, "tool call failed");
                ToolResult::failure(e.kind(), e.to_string())
            }
        }
    }
}
