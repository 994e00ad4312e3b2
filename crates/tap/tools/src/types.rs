use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named capability with its argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the `arguments` object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(default)]
    pub annotations: ToolAnnotations,
}

impl ToolSpec {
    pub fn new(
        name: &str,
        description: &str,
        input_schema: Value,
        annotations: ToolAnnotations,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            annotations,
        }
    }
}

/// Behaviour hints for orchestration code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(rename = "readOnlyHint", skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Irreversible effect on the ledger (settlement, revocation).
    #[serde(rename = "destructiveHint", skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Touches only the local mirror.
    #[serde(rename = "x-tap-local", skip_serializing_if = "Option::is_none")]
    pub local_only: Option<bool>,
}

impl ToolAnnotations {
    pub fn read_only() -> Self {
        Self {
            read_only_hint: Some(true),
            ..Self::default()
        }
    }

    pub fn mutating() -> Self {
        Self {
            read_only_hint: Some(false),
            ..Self::default()
        }
    }

    pub fn destructive() -> Self {
        Self {
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            local_only: None,
        }
    }

    pub fn local(mut self) -> Self {
        self.local_only = Some(true);
        self
    }
}

/// A request to run one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Json { json: Value },
}

/// Structured outcome of a tool call. Failures are results too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(rename = "isError")]
    pub is_error: bool,
    pub content: Vec<ToolContent>,
}

impl ToolResult {
    pub fn json(value: Value) -> Self {
        Self {
            is_error: false,
            content: vec![ToolContent::Json { json: value }],
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_error: true,
            content: vec![
                ToolContent::Json {
                    json: serde_json::json!({ "error": kind, "message": message }),
                },
                ToolContent::Text { text: message },
            ],
        }
    }

    /// First JSON block, if any.
    pub fn structured(&self) -> Option<&Value> {
        self.content.iter().find_map(|block| match block {
            ToolContent::Json { json } => Some(json),
            ToolContent::Text { .. } => None,
        })
    }

    /// Error tag of a failed result.
    pub fn error_kind(&self) -> Option<&str> {
        if !self.is_error {
            return None;
        }
        self.structured()?.get("error")?.as_str()
    }
}
