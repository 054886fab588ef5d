use crate::{
    Error, Result,
    llm::{ChatMessage, ToolCall},
};
use tracing::{debug, info, warn};

// Agent states
#[derive(Debug, Clone, PartialEq)]
pub enum AgentState {
    ReadyToCallLlm,
    StreamingLlmResponse,
    ExecutingTools,
    Done,
    Error,
}

// Agent events
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ProcessInput,
    LlmRespondedWithContent,
    LlmRequestedTools,
    ToolsExecutionCompleted,
    ErrorOccurred,
}

#[derive(Debug, Clone)]
pub struct AgentContext {
    pub messages: Vec<ChatMessage>,
    pub current_turn: usize,
    pub max_turns: usize,
    pub pending_tool_calls: Vec<ToolCall>,
    pub last_error: Option<String>,
}

impl AgentContext {
    pub fn new(initial_messages: Vec<ChatMessage>, max_turns: usize) -> Self {
        Self {
            messages: initial_messages,
            current_turn: 0,
            max_turns,
            pending_tool_calls: Vec::new(),
            last_error: None,
        }
    }

    pub fn has_reached_max_turns(&self) -> bool {
        self.current_turn >= self.max_turns
    }
}

pub struct AgentStateMachine {
    state: AgentState,
    pub context: AgentContext,
}

impl AgentStateMachine {
    pub fn new(initial_messages: Vec<ChatMessage>, max_turns: usize) -> Self {
        debug!(
            "Creating new FSM with {} messages, max {} turns",
            initial_messages.len(),
            max_turns
        );
        Self {
            state: AgentState::ReadyToCallLlm,
            context: AgentContext::new(initial_messages, max_turns),
        }
    }

    pub fn current_state(&self) -> &AgentState {
        &self.state
    }

    /// Applies `event`. Starting a model turn past `max_turns` is an error.
    pub fn transition(&mut self, event: AgentEvent) -> Result<()> {
        let old_state = self.state.clone();

        let new_state = match (&self.state, &event) {
            (AgentState::ReadyToCallLlm, AgentEvent::ProcessInput) => {
                if self.context.has_reached_max_turns() {
                    self.state = AgentState::Error;
                    self.context.last_error =
                        Some(format!("exceeded {} model turns", self.context.max_turns));
                    return Err(Error::MaxTurnsExceeded {
                        max_turns: self.context.max_turns,
                    });
                }
                self.context.current_turn += 1;
                AgentState::StreamingLlmResponse
            }
            (AgentState::StreamingLlmResponse, AgentEvent::LlmRespondedWithContent) => {
                AgentState::Done
            }
            (AgentState::StreamingLlmResponse, AgentEvent::LlmRequestedTools) => {
                AgentState::ExecutingTools
            }
            (AgentState::ExecutingTools, AgentEvent::ToolsExecutionCompleted) => {
                AgentState::ReadyToCallLlm
            }
            (
                AgentState::ReadyToCallLlm
                | AgentState::StreamingLlmResponse
                | AgentState::ExecutingTools,
                AgentEvent::ErrorOccurred,
            ) => AgentState::Error,
            _ => {
                warn!(
                    "Invalid FSM transition from {:?} with event {:?}",
                    self.state, event
                );
                return Err(Error::fsm(format!(
                    "Invalid transition from {:?} with event {:?}",
                    self.state, event
                )));
            }
        };

        info!(
            "FSM state transition: {:?} -> {:?} (event: {:?})",
            old_state, new_state, event
        );

        self.state = new_state;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, AgentState::Done | AgentState::Error)
    }

    pub fn fail(&mut self, error: &Error) {
        self.context.last_error = Some(error.to_string());
        if let Err(e) = self.transition(AgentEvent::ErrorOccurred) {
            debug!("Ignoring failure while already terminal: {}", e);
        }
    }

    pub fn take_pending_tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.context.pending_tool_calls)
    }

    pub fn get_final_content(&self) -> &str {
        match self.context.messages.last() {
            Some(m) if m.role == "assistant" => &m.content,
            _ => "",
        }
    }

    pub fn get_last_error(&self) -> Option<&str> {
        self.context.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FunctionCall;
    use pretty_assertions::assert_eq;

    fn fsm(max_turns: usize) -> AgentStateMachine {
        AgentStateMachine::new(vec![ChatMessage::user("Hello")], max_turns)
    }

    #[test]
    fn direct_answer_path() {
        let mut fsm = fsm(3);
        fsm.transition(AgentEvent::ProcessInput).unwrap();
        assert_eq!(fsm.current_state(), &AgentState::StreamingLlmResponse);
        fsm.transition(AgentEvent::LlmRespondedWithContent).unwrap();
        assert_eq!(fsm.current_state(), &AgentState::Done);
        assert!(fsm.is_terminal());
        assert_eq!(fsm.context.current_turn, 1);
    }

    #[test]
    fn tool_round_trip_returns_to_ready() {
        let mut fsm = fsm(3);
        fsm.transition(AgentEvent::ProcessInput).unwrap();
        fsm.context.pending_tool_calls = vec![ToolCall {
            id: "call_1".to_string(),
            function: FunctionCall {
                name: "greet".to_string(),
                arguments: r#"{"name":"Ada"}"#.to_string(),
            },
        }];
        fsm.transition(AgentEvent::LlmRequestedTools).unwrap();
        assert_eq!(fsm.current_state(), &AgentState::ExecutingTools);
        assert_eq!(fsm.take_pending_tool_calls().len(), 1);
        assert!(fsm.context.pending_tool_calls.is_empty());
        fsm.transition(AgentEvent::ToolsExecutionCompleted).unwrap();
        assert_eq!(fsm.current_state(), &AgentState::ReadyToCallLlm);
    }

    #[test]
    fn turn_limit_is_enforced() {
        let mut fsm = fsm(1);
        fsm.transition(AgentEvent::ProcessInput).unwrap();
        fsm.transition(AgentEvent::LlmRequestedTools).unwrap();
        fsm.transition(AgentEvent::ToolsExecutionCompleted).unwrap();

        let err = fsm.transition(AgentEvent::ProcessInput).unwrap_err();
        assert!(matches!(err, Error::MaxTurnsExceeded { max_turns: 1 }));
        assert_eq!(fsm.current_state(), &AgentState::Error);
        assert!(fsm.get_last_error().is_some());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut fsm = fsm(3);
        let err = fsm.transition(AgentEvent::ToolsExecutionCompleted).unwrap_err();
        assert!(err.to_string().contains("Invalid transition"));
        assert_eq!(fsm.current_state(), &AgentState::ReadyToCallLlm);
    }

    #[test]
    fn fail_records_error_and_terminates() {
        let mut fsm = fsm(3);
        fsm.transition(AgentEvent::ProcessInput).unwrap();
        fsm.fail(&Error::llm("connection reset"));
        assert_eq!(fsm.current_state(), &AgentState::Error);
        assert!(fsm.get_last_error().unwrap().contains("connection reset"));

        // Failing again from a terminal state is a no-op.
        fsm.fail(&Error::llm("again"));
        assert_eq!(fsm.current_state(), &AgentState::Error);
    }

    #[test]
    fn final_content_is_last_assistant_message() {
        let mut fsm = fsm(3);
        assert_eq!(fsm.get_final_content(), "");
        fsm.context.messages.push(ChatMessage::assistant("Hi there"));
        assert_eq!(fsm.get_final_content(), "Hi there");
    }
}
