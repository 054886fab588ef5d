use async_trait::async_trait;
use futures::stream;
use rasheed_ai::{
    Error, Result,
    llm::{
        ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStream,
        ChatMessage, Choice, LlmClient, ToolCallDelta,
    },
    vision::{ImageClassifier, InputTensor},
};
use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// One scripted answer, consumed by the next call of either kind.
#[derive(Debug, Clone)]
pub enum MockReply {
    Completion(String),
    Stream(Vec<ChatCompletionChunk>),
    /// Stream that yields these chunks and then never ends.
    StallingStream(Vec<ChatCompletionChunk>),
    Fail(String),
}

/// Mock LLM client for testing
#[derive(Debug, Default)]
pub struct MockLlmClient {
    pub replies: Arc<Mutex<VecDeque<MockReply>>>,
    pub requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(self, replies: Vec<MockReply>) -> Self {
        *self.replies.lock().unwrap() = replies.into();
        self
    }

    pub fn get_requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self, request: ChatCompletionRequest) -> Result<MockReply> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::llm("No more mock responses available"))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        match self.next_reply(request)? {
            MockReply::Completion(content) => Ok(completion(&content)),
            MockReply::Fail(message) => Err(Error::llm(message)),
            other => Err(Error::llm(format!("expected a completion reply, got {other:?}"))),
        }
    }

    async fn create_chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream> {
        match self.next_reply(request)? {
            MockReply::Stream(chunks) => Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)))),
            MockReply::StallingStream(chunks) => {
                let head = stream::iter(chunks.into_iter().map(Ok));
                Ok(Box::pin(futures::StreamExt::chain(head, stream::pending())))
            }
            MockReply::Fail(message) => Err(Error::llm(message)),
            MockReply::Completion(content) => Ok(Box::pin(stream::iter(
                text_chunks(&[content.as_str()]).into_iter().map(Ok),
            ))),
        }
    }
}

pub fn completion(content: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "mock-response".to_string(),
        model: "mock-model".to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: Some("stop".to_string()),
        }],
        usage: None,
    }
}

pub fn text_chunks(parts: &[&str]) -> Vec<ChatCompletionChunk> {
    let mut chunks: Vec<ChatCompletionChunk> = parts
        .iter()
        .map(|part| ChatCompletionChunk {
            content: Some(part.to_string()),
            ..Default::default()
        })
        .collect();
    chunks.push(ChatCompletionChunk {
        finish_reason: Some("stop".to_string()),
        ..Default::default()
    });
    chunks
}

/// A single tool call whose arguments arrive split over two deltas.
pub fn tool_call_chunks(id: &str, name: &str, arguments: &str) -> Vec<ChatCompletionChunk> {
    let (head, tail) = arguments.split_at(arguments.len() / 2);
    vec![
        ChatCompletionChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: Some(head.to_string()),
            }],
            ..Default::default()
        },
        ChatCompletionChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                arguments: Some(tail.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        },
        ChatCompletionChunk {
            finish_reason: Some("tool_calls".to_string()),
            ..Default::default()
        },
    ]
}

/// Classifier returning fixed scores.
pub struct StubClassifier {
    pub scores: Vec<f32>,
    pub calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageClassifier for StubClassifier {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if input.shape != [1, 224, 224, 3] {
            return Err(Error::inference(format!("unexpected input shape {:?}", input.shape)));
        }
        Ok(self.scores.clone())
    }
}
