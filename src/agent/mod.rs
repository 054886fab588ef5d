mod executor;
pub mod fsm;
mod tools;

pub use executor::{Agent, Fragment, FragmentStream};
pub use fsm::{AgentContext, AgentEvent, AgentState, AgentStateMachine};
pub use tools::{GreetTool, LocalTool, ToolRegistry, greet};
