//! TAP Tools - the named tool-calling surface.
//!
//! Each capability is exposed as a tool with a JSON-Schema description of its
//! arguments. An orchestration layer lists the tools, picks one, and calls it
//! with a JSON object; the answer is always a [`ToolResult`], with failures
//! reported as error results carrying the core's error tag (`InvalidInput`,
//! `ExpiredIntent`, `LedgerUnavailable`, ...).
//!
//! ```text
//! register_agent  record_intent  verify_intent  execute_intent  revoke_intent
//! update_reputation  get_agent_score  sign_request
//! save_agent_to_db  get_agent_from_db  update_agent_in_db
//! save_intent_to_db  get_intent_from_db  update_intent_status_in_db
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod args;
mod context;
mod db;
mod error;
mod ledger;
mod registry;
mod signing;
mod types;

pub use context::ToolContext;
pub use error::{ToolError, ToolOutcome};
pub use registry::{ToolHandler, ToolRegistry};
pub use types::{ToolAnnotations, ToolCall, ToolContent, ToolResult, ToolSpec};
