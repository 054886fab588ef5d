use super::types::*;
use crate::{Result, config::LlmConfig};
use async_openai::{Client, config::OpenAIConfig, types as openai_types};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse>;

    /// Opens a streamed completion. Errors opening the stream are returned
    /// directly; errors after that arrive as items of the stream.
    async fn create_chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream>;
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key);

        if !config.base_url.is_empty() {
            openai_config = openai_config.with_api_base(config.base_url);
        }

        // Retries are owned by `ResilientLlmClient`; the SDK gives up at once.
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = Client::with_config(openai_config).with_backoff(no_retry);

        Self {
            client,
            model: config.model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        request: ChatCompletionRequest,
        stream: bool,
    ) -> Result<openai_types::CreateChatCompletionRequest> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for msg in &request.messages {
            messages.push(msg.to_openai_message()?);
        }

        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model.as_str()
        };

        let mut request_builder = openai_types::CreateChatCompletionRequestArgs::default();
        request_builder
            .model(model)
            .messages(messages)
            .temperature(request.temperature.unwrap_or(0.7));

        if !request.tools.is_empty() {
            request_builder.tools(
                request
                    .tools
                    .iter()
                    .map(Tool::to_openai_tool)
                    .collect::<Vec<_>>(),
            );
        }

        if let Some(max_tokens) = request.max_tokens {
            request_builder.max_tokens(u32::from(max_tokens));
        }

        if stream {
            request_builder.stream(true);
        }

        Ok(request_builder.build()?)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        debug!(
            "Creating chat completion with {} messages",
            request.messages.len()
        );

        let openai_request = self.build_request(request, false)?;
        let response = self.client.chat().create(openai_request).await?;

        debug!(
            "Received chat completion response with {} choices",
            response.choices.len()
        );

        let choices: Vec<Choice> = response
            .choices
            .into_iter()
            .map(|choice| {
                let tool_calls = choice.message.tool_calls.map(|tcs| {
                    tcs.into_iter()
                        .map(|tc| ToolCall {
                            id: tc.id,
                            function: FunctionCall {
                                name: tc.function.name,
                                arguments: tc.function.arguments,
                            },
                        })
                        .collect()
                });

                let message = ChatMessage {
                    role: choice.message.role.to_string(),
                    content: choice.message.content.unwrap_or_default(),
                    tool_calls,
                    tool_call_id: None,
                };

                Choice {
                    index: choice.index,
                    message,
                    finish_reason: choice.finish_reason.map(|fr| format!("{fr:?}")),
                }
            })
            .collect();

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatCompletionResponse {
            id: response.id,
            model: response.model,
            choices,
            usage,
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream> {
        debug!(
            "Opening chat completion stream with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let openai_request = self.build_request(request, true)?;
        let stream = self.client.chat().create_stream(openai_request).await?;

        let chunks = stream.map(|item| {
            item.map(convert_chunk)
                .map_err(crate::Error::from_stream_failure)
        });
        Ok(Box::pin(chunks))
    }
}

fn convert_chunk(response: openai_types::CreateChatCompletionStreamResponse) -> ChatCompletionChunk {
    let Some(choice) = response.choices.into_iter().next() else {
        return ChatCompletionChunk::default();
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallDelta {
                index: tc.index,
                id: tc.id,
                name,
                arguments,
            }
        })
        .collect();

    ChatCompletionChunk {
        content: choice.delta.content,
        tool_calls,
        finish_reason: choice.finish_reason.map(|fr| format!("{fr:?}")),
    }
}
