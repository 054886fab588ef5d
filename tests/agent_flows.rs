use futures::StreamExt;
use pretty_assertions::assert_eq;
use rasheed_ai::{
    Error,
    agent::{Agent, Fragment, ToolRegistry, greet},
    config::{AgentConfig, LlmConfig},
};
use std::sync::Arc;

mod common;
use common::{
    MockLlmClient, MockReply, create_test_agent, text_chunks, tool_call_chunks,
};

#[test_log::test(tokio::test)]
async fn test_plain_answer_streams_in_order() {
    let client = Arc::new(MockLlmClient::new().with_replies(vec![MockReply::Stream(
        text_chunks(&["Rust ", "is ", "fun."]),
    )]));
    let agent = create_test_agent(client.clone());

    let fragments: Vec<Fragment> = agent
        .stream("Tell me about Rust")
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![
            Fragment::Text("Rust ".to_string()),
            Fragment::Text("is ".to_string()),
            Fragment::Text("fun.".to_string()),
        ]
    );
    assert_eq!(client.call_count(), 1);

    let request = &client.get_requests()[0];
    let names: Vec<&str> = request
        .tools
        .iter()
        .map(|t| t.function.name.as_str())
        .collect();
    assert_eq!(names, vec!["greet"]);
    assert_eq!(request.messages.last().unwrap().content, "Tell me about Rust");
}

#[test_log::test(tokio::test)]
async fn test_greet_tool_round_trip() {
    let client = Arc::new(MockLlmClient::new().with_replies(vec![
        MockReply::Stream(tool_call_chunks("call_1", "greet", r#"{"name":"Ada"}"#)),
        MockReply::Stream(text_chunks(&["Hello, ", "Ada! ", "Nice to meet you."])),
    ]));
    let agent = create_test_agent(client.clone());

    let answer = agent.respond("Please greet Ada").await.unwrap();
    assert_eq!(answer, "Hello, Ada! Nice to meet you.");

    let requests = client.get_requests();
    assert_eq!(requests.len(), 2);

    let follow_up = &requests[1].messages;
    let assistant = &follow_up[follow_up.len() - 2];
    assert_eq!(assistant.role, "assistant");
    let calls = assistant.tool_calls.as_ref().unwrap();
    assert_eq!(calls[0].function.name, "greet");
    assert_eq!(calls[0].function.arguments, r#"{"name":"Ada"}"#);

    let tool_message = follow_up.last().unwrap();
    assert_eq!(tool_message.role, "tool");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.content, greet("Ada"));
}

#[test_log::test(tokio::test)]
async fn test_tool_use_is_announced_before_the_answer() {
    let client = Arc::new(MockLlmClient::new().with_replies(vec![
        MockReply::Stream(tool_call_chunks("call_1", "greet", r#"{"name":"Ada"}"#)),
        MockReply::Stream(text_chunks(&["Hello, Ada!"])),
    ]));
    let agent = create_test_agent(client);

    let fragments: Vec<Fragment> = agent
        .stream("Please greet Ada")
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![
            Fragment::ToolUse {
                name: "greet".to_string()
            },
            Fragment::Text("Hello, Ada!".to_string()),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_unknown_tool_is_reported_back_to_the_model() {
    let client = Arc::new(MockLlmClient::new().with_replies(vec![
        MockReply::Stream(tool_call_chunks("call_9", "weather", r#"{"city":"Cairo"}"#)),
        MockReply::Stream(text_chunks(&["I cannot check the weather."])),
    ]));
    let agent = create_test_agent(client.clone());

    let answer = agent.respond("Weather in Cairo?").await.unwrap();
    assert_eq!(answer, "I cannot check the weather.");

    let requests = client.get_requests();
    let tool_message = requests[1].messages.last().unwrap();
    assert!(tool_message.content.starts_with("Error: No tool named 'weather'"));
    assert!(tool_message.content.contains("greet"));
}

#[test_log::test(tokio::test)]
async fn test_tool_loop_stops_at_max_turns() {
    let client = Arc::new(MockLlmClient::new().with_replies(vec![
        MockReply::Stream(tool_call_chunks("call_1", "greet", r#"{"name":"A"}"#)),
        MockReply::Stream(tool_call_chunks("call_2", "greet", r#"{"name":"B"}"#)),
        MockReply::Stream(tool_call_chunks("call_3", "greet", r#"{"name":"C"}"#)),
    ]));
    let agent = Agent::new(
        client.clone(),
        ToolRegistry::with_defaults(),
        &LlmConfig::default(),
        &AgentConfig { max_turns: 2 },
    );

    let err = agent.respond("Greet everyone").await.unwrap_err();

    assert!(matches!(err, Error::MaxTurnsExceeded { max_turns: 2 }));
    assert_eq!(client.call_count(), 2);
}

#[test_log::test(tokio::test)]
async fn test_llm_failure_ends_the_stream_with_an_error() {
    let client = Arc::new(
        MockLlmClient::new().with_replies(vec![MockReply::Fail("service unavailable".into())]),
    );
    let agent = create_test_agent(client);

    let items: Vec<_> = agent.stream("Hi").collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::Llm(_))));
}

#[test_log::test(tokio::test)]
async fn test_system_prompt_is_sent_first() {
    let client = Arc::new(
        MockLlmClient::new().with_replies(vec![MockReply::Stream(text_chunks(&["ok"]))]),
    );
    let llm_config = LlmConfig {
        system_prompt: Some("You are Rasheed.".to_string()),
        ..LlmConfig::default()
    };
    let agent = Agent::new(
        client.clone(),
        ToolRegistry::with_defaults(),
        &llm_config,
        &AgentConfig::default(),
    );

    agent.respond("Hi").await.unwrap();

    let messages = &client.get_requests()[0].messages;
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[0].content, "You are Rasheed.");
    assert_eq!(messages[1].role, "user");
}
