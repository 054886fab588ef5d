use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionTool, FunctionObject,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    /// Empty means "use the client's configured model".
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
    pub max_tokens: Option<u16>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletionChunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
}

/// Partial tool call; fragments sharing an `index` belong to the same call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

pub type ChatCompletionStream =
    Pin<Box<dyn Stream<Item = crate::Result<ChatCompletionChunk>> + Send>>;

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role("assistant", content)
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role("tool", content)
        }
    }

    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn to_openai_message(&self) -> Result<ChatCompletionRequestMessage, crate::Error> {
        match self.role.as_str() {
            "system" => {
                let msg = ChatCompletionRequestSystemMessageArgs::default()
                    .content(ChatCompletionRequestSystemMessageContent::Text(
                        self.content.clone(),
                    ))
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build system message: {}", e))
                    })?;
                Ok(msg.into())
            }
            "user" => {
                let msg = ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        self.content.clone(),
                    ))
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build user message: {}", e))
                    })?;
                Ok(msg.into())
            }
            "assistant" => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !self.content.is_empty() {
                    builder.content(ChatCompletionRequestAssistantMessageContent::Text(
                        self.content.clone(),
                    ));
                }
                if let Some(ref tool_calls) = self.tool_calls {
                    let openai_tool_calls: Vec<async_openai::types::ChatCompletionMessageToolCall> =
                        tool_calls
                            .iter()
                            .map(|tc| async_openai::types::ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: async_openai::types::ChatCompletionToolType::Function,
                                function: async_openai::types::FunctionCall {
                                    name: tc.function.name.clone(),
                                    arguments: tc.function.arguments.clone(),
                                },
                            })
                            .collect();
                    builder.tool_calls(openai_tool_calls);
                }
                let msg = builder.build().map_err(|e| {
                    crate::Error::llm(format!("Failed to build assistant message: {}", e))
                })?;
                Ok(msg.into())
            }
            "tool" => {
                let tool_call_id = self.tool_call_id.as_deref().ok_or_else(|| {
                    crate::Error::llm("Tool message is missing its tool_call_id")
                })?;
                let msg = ChatCompletionRequestToolMessageArgs::default()
                    .content(ChatCompletionRequestToolMessageContent::Text(
                        self.content.clone(),
                    ))
                    .tool_call_id(tool_call_id)
                    .build()
                    .map_err(|e| {
                        crate::Error::llm(format!("Failed to build tool message: {}", e))
                    })?;
                Ok(msg.into())
            }
            _ => Err(crate::Error::llm(format!(
                "Unknown message role: {}",
                self.role
            ))),
        }
    }
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: Function {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn to_openai_tool(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: async_openai::types::ChatCompletionToolType::Function,
            function: FunctionObject {
                name: self.function.name.clone(),
                description: Some(self.function.description.clone()),
                parameters: Some(self.function.parameters.clone()),
                strict: None,
            },
        }
    }
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the model produced any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Folds streamed [`ToolCallDelta`]s into complete [`ToolCall`]s.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    partial: std::collections::BTreeMap<u32, ToolCallDelta>,
}

impl ToolCallAssembler {
    pub fn push(&mut self, deltas: &[ToolCallDelta]) {
        for delta in deltas {
            let entry = self.partial.entry(delta.index).or_insert_with(|| ToolCallDelta {
                index: delta.index,
                ..Default::default()
            });
            if delta.id.is_some() {
                entry.id.clone_from(&delta.id);
            }
            if let Some(name) = &delta.name {
                entry.name.get_or_insert_with(String::new).push_str(name);
            }
            if let Some(arguments) = &delta.arguments {
                entry
                    .arguments
                    .get_or_insert_with(String::new)
                    .push_str(arguments);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }

    /// Completed calls ordered by stream index.
    pub fn finish(self) -> Result<Vec<ToolCall>, crate::Error> {
        self.partial
            .into_values()
            .map(|delta| {
                let name = delta.name.filter(|n| !n.is_empty()).ok_or_else(|| {
                    crate::Error::llm(format!(
                        "Tool call #{} arrived without a function name",
                        delta.index
                    ))
                })?;
                Ok(ToolCall {
                    id: delta.id.unwrap_or_else(|| format!("call_{}", delta.index)),
                    function: FunctionCall {
                        name,
                        arguments: delta.arguments.unwrap_or_default(),
                    },
                })
            })
            .collect()
    }
}
