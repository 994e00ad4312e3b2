use anyhow::{anyhow, Context};
use clap::Subcommand;
use tap_tools::ToolCall;

use crate::output::print_json;
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum ToolCommands {
    /// List tool names, descriptions and argument schemas
    List,

    /// Invoke a tool with a JSON object of arguments
    Call {
        name: String,
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

pub async fn execute(command: ToolCommands, runtime: &Runtime) -> anyhow::Result<()> {
    let tools = runtime.tools();
    match command {
        ToolCommands::List => print_json(&serde_json::to_value(tools.list())?),
        ToolCommands::Call { name, arguments } => {
            let arguments = serde_json::from_str(&arguments)
                .with_context(|| format!("arguments for {name} are not valid JSON"))?;
            let result = tools.invoke(ToolCall::new(name.clone(), arguments)).await;
            print_json(&serde_json::to_value(&result)?)?;
            if result.is_error {
                return Err(anyhow!(
                    "tool {name} failed: {}",
                    result.error_kind().unwrap_or("unknown")
                ));
            }
            Ok(())
        }
    }
}
