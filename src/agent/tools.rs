use crate::{
    Error, Result,
    llm::{Tool, ToolCall},
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// A callable the model may choose to invoke while answering.
pub trait LocalTool: Send + Sync {
    fn definition(&self) -> Tool;

    fn call(&self, arguments: &Value) -> Result<String>;
}

pub fn greet(name: &str) -> String {
    format!("Hello, {name}! How can I assist you today?")
}

pub struct GreetTool;

impl LocalTool for GreetTool {
    fn definition(&self) -> Tool {
        Tool::function(
            "greet",
            "Greet a person with their name.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name of the person to greet"
                    }
                },
                "required": ["name"]
            }),
        )
    }

    fn call(&self, arguments: &Value) -> Result<String> {
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidRequest("greet requires a non-empty 'name'".into()))?;
        Ok(greet(name))
    }
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn LocalTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(GreetTool);
        registry
    }

    /// Registers `tool`, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: impl LocalTool + 'static) {
        let name = tool.definition().function.name;
        if let Some(pos) = self.position(&name) {
            warn!("Tool name conflict: '{}' registered twice, keeping the latest", name);
            self.tools.remove(pos);
        }
        self.tools.push(Box::new(tool));
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.definition().function.name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tools
            .iter()
            .position(|t| t.definition().function.name == name)
    }

    pub fn call(&self, name: &str, arguments: &Value) -> Result<String> {
        let pos = self.position(name).ok_or_else(|| Error::ToolNotFound {
            tool_name: name.to_string(),
        })?;
        self.tools[pos].call(arguments)
    }

    /// Runs a model-requested call. Failures become an error message for the
    /// model instead of aborting the conversation.
    pub fn execute(&self, tool_call: &ToolCall) -> String {
        info!(tool = %tool_call.function.name, "Tool: {}", tool_call.function.name);

        let raw = tool_call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(raw).map_err(Error::from)
        };

        let result = arguments.and_then(|args| self.call(&tool_call.function.name, &args));
        match result {
            Ok(output) => {
                debug!(tool = %tool_call.function.name, "Tool executed successfully");
                output
            }
            Err(Error::ToolNotFound { tool_name }) => {
                warn!("No tool registered under '{}'", tool_name);
                format!(
                    "Error: No tool named '{}'. Available tools: {}",
                    tool_name,
                    self.names().join(", ")
                )
            }
            Err(e) => {
                warn!(tool = %tool_call.function.name, error = %e, "Tool execution failed");
                format!("Error: Tool execution failed: {e}")
            }
        }
    }
}
