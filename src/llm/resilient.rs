//! Timeout and retry decorator for any [`LlmClient`].

use super::{
    client::LlmClient,
    types::{ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStream},
};
use crate::{Error, Result, config::RetryConfig};
use async_trait::async_trait;
use futures::{StreamExt, future, stream};
use std::{future::Future, time::Duration};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Wraps a client so every call is bounded in time and transient failures
/// are retried with exponential backoff.
///
/// Streams are retried until their first event arrives, since HTTP failures
/// only surface there. Once chunks flow, a gap longer than the request
/// timeout ends the stream with [`Error::Timeout`]; chunks already delivered
/// are kept by the consumer.
pub struct ResilientLlmClient<C> {
    inner: C,
    retry: RetryConfig,
    request_timeout: Duration,
}

impl<C: LlmClient> ResilientLlmClient<C> {
    pub fn new(inner: C, retry: RetryConfig, request_timeout: Duration) -> Self {
        Self {
            inner,
            retry,
            request_timeout,
        }
    }

    async fn call_with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match timeout(self.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.request_timeout)),
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.calculate_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, waiting before retry"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(
                            operation,
                            max_retries = self.retry.max_retries,
                            error = %e,
                            "Max retries exceeded"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Opens a stream and waits for its first item, handing that item back
    /// in front of the rest. A failed first item fails the attempt.
    async fn open_stream(&self, request: ChatCompletionRequest) -> Result<ChatCompletionStream> {
        let mut chunks = self.inner.create_chat_completion_stream(request).await?;
        match chunks.next().await {
            Some(Ok(first)) => Ok(Box::pin(
                stream::once(future::ready(Ok(first))).chain(chunks),
            )),
            Some(Err(e)) => Err(e),
            None => Ok(Box::pin(stream::empty())),
        }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for ResilientLlmClient<C> {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        self.call_with_retry("chat_completion", || {
            self.inner.create_chat_completion(request.clone())
        })
        .await
    }

    async fn create_chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream> {
        let inner = self
            .call_with_retry("chat_completion_stream", || {
                self.open_stream(request.clone())
            })
            .await?;

        Ok(with_idle_timeout(inner, self.request_timeout))
    }
}

/// Ends `inner` with a timeout error if no chunk arrives within `idle`.
pub fn with_idle_timeout(inner: ChatCompletionStream, idle: Duration) -> ChatCompletionStream {
    let guarded = stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match timeout(idle, inner.next()).await {
            Ok(Some(item)) => Some((item, Some(inner))),
            Ok(None) => None,
            Err(_) => {
                warn!(idle_ms = idle.as_millis() as u64, "Stream stalled, giving up");
                Some((Err(Error::Timeout(idle)), None))
            }
        }
    });
    Box::pin(guarded)
}
