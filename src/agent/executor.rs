use super::{
    fsm::{AgentEvent, AgentState, AgentStateMachine},
    tools::ToolRegistry,
};
use crate::{
    Error, Result,
    config::{AgentConfig, LlmConfig},
    llm::{ChatCompletionRequest, ChatMessage, LlmClient, ToolCall, ToolCallAssembler},
};
use futures::{Stream, StreamExt, stream};
use std::{pin::Pin, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// One piece of an agent answer, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text streamed from the model.
    Text(String),
    /// A local tool is about to run.
    ToolUse { name: String },
}

/// Fragments of one agent answer, ending early with `Err` on failure.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

const FRAGMENT_BUFFER: usize = 32;

enum TurnOutcome {
    Answer(String),
    ToolCalls { content: String, calls: Vec<ToolCall> },
    /// The reader dropped the stream mid-turn.
    Abandoned,
}

/// Reactive agent: streams model output and runs local tools the model asks for.
#[derive(Clone)]
pub struct Agent {
    llm_client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    temperature: f32,
    max_turns: usize,
}

impl Agent {
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        llm_config: &LlmConfig,
        agent_config: &AgentConfig,
    ) -> Self {
        info!(
            "Agent initialized with {} tools, max {} turns",
            tools.len(),
            agent_config.max_turns
        );
        Self {
            llm_client,
            tools: Arc::new(tools),
            system_prompt: llm_config.system_prompt.clone(),
            temperature: llm_config.temperature,
            max_turns: agent_config.max_turns,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Starts answering `input` in the background and returns its fragments.
    ///
    /// The stream yields text as the model produces it, across any number of
    /// tool rounds. Dropping it cancels the in-flight request.
    pub fn stream(&self, input: &str) -> FragmentStream {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let agent = self.clone();
        let input = input.to_string();

        tokio::spawn(async move {
            if let Err(e) = agent.run_fsm_loop(&input, &tx).await {
                // Receiver may already be gone; nothing left to report to.
                let _ = tx.send(Err(e)).await;
            }
        });

        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    /// Collects the whole answer for `input`.
    pub async fn respond(&self, input: &str) -> Result<String> {
        let mut fragments = self.stream(input);
        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            if let Fragment::Text(text) = fragment? {
                answer.push_str(&text);
            }
        }
        Ok(answer)
    }

    fn initial_messages(&self, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = self.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(ChatMessage::system(prompt));
        }
        messages.push(ChatMessage::user(input));
        messages
    }

    async fn run_fsm_loop(&self, input: &str, tx: &mpsc::Sender<Result<Fragment>>) -> Result<()> {
        let start_time = std::time::Instant::now();
        let mut fsm = AgentStateMachine::new(self.initial_messages(input), self.max_turns);

        fsm.transition(AgentEvent::ProcessInput)?;

        while !fsm.is_terminal() {
            let state = fsm.current_state().clone();
            match state {
                AgentState::StreamingLlmResponse => {
                    let outcome = self.stream_turn(&fsm.context.messages, tx).await;
                    match outcome {
                        Ok(TurnOutcome::Answer(content)) => {
                            fsm.context.messages.push(ChatMessage::assistant(content));
                            fsm.transition(AgentEvent::LlmRespondedWithContent)?;
                        }
                        Ok(TurnOutcome::ToolCalls { content, calls }) => {
                            debug!("LLM requested {} tool calls", calls.len());
                            fsm.context
                                .messages
                                .push(ChatMessage::assistant_tool_calls(content, calls.clone()));
                            fsm.context.pending_tool_calls = calls;
                            fsm.transition(AgentEvent::LlmRequestedTools)?;
                        }
                        Ok(TurnOutcome::Abandoned) => {
                            info!("Response stream dropped by reader, stopping agent");
                            return Ok(());
                        }
                        Err(e) => {
                            error!("LLM call failed: {}", e);
                            fsm.fail(&e);
                            return Err(e);
                        }
                    }
                }
                AgentState::ExecutingTools => {
                    let calls = fsm.take_pending_tool_calls();
                    info!("Executing {} tool calls", calls.len());
                    for call in &calls {
                        let notice = Fragment::ToolUse {
                            name: call.function.name.clone(),
                        };
                        if tx.send(Ok(notice)).await.is_err() {
                            info!("Response stream dropped by reader, stopping agent");
                            return Ok(());
                        }
                        let output = self.tools.execute(call);
                        fsm.context
                            .messages
                            .push(ChatMessage::tool(call.id.clone(), output));
                    }
                    fsm.transition(AgentEvent::ToolsExecutionCompleted)?;
                }
                AgentState::ReadyToCallLlm => {
                    fsm.transition(AgentEvent::ProcessInput)?;
                }
                AgentState::Done | AgentState::Error => break,
            }
        }

        info!(
            "Agent finished in {} turns, total duration: {:?}",
            fsm.context.current_turn,
            start_time.elapsed()
        );

        match fsm.current_state() {
            AgentState::Done => Ok(()),
            state => Err(Error::internal(format!(
                "Agent ended in unexpected state: {state:?}"
            ))),
        }
    }

    async fn stream_turn(
        &self,
        messages: &[ChatMessage],
        tx: &mpsc::Sender<Result<Fragment>>,
    ) -> Result<TurnOutcome> {
        let request = ChatCompletionRequest {
            model: String::new(),
            messages: messages.to_vec(),
            tools: self.tools.definitions(),
            max_tokens: None,
            temperature: Some(self.temperature),
        };

        let mut chunks = self.llm_client.create_chat_completion_stream(request).await?;
        let mut content = String::new();
        let mut assembler = ToolCallAssembler::default();

        loop {
            let next = tokio::select! {
                next = chunks.next() => next,
                _ = tx.closed() => return Ok(TurnOutcome::Abandoned),
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                content.push_str(&text);
                if tx.send(Ok(Fragment::Text(text))).await.is_err() {
                    return Ok(TurnOutcome::Abandoned);
                }
            }
            assembler.push(&chunk.tool_calls);
        }

        if assembler.is_empty() {
            Ok(TurnOutcome::Answer(content))
        } else {
            Ok(TurnOutcome::ToolCalls {
                content,
                calls: assembler.finish()?,
            })
        }
    }
}
