//! Terminal conversation loop around the [`Agent`].

use crate::{
    Error, ErrorKind, Result,
    agent::{Agent, Fragment},
};
use futures::{Stream, StreamExt, stream};
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

pub const EXIT_KEYWORD: &str = "exit";
pub const ASSISTANT_NAME: &str = "Rasheed AI";

const GOODBYE: &[u8] = b"Exiting the demo. Goodbye!\n";

pub fn is_exit_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_KEYWORD)
}

/// How a single streamed answer ended.
#[derive(Debug)]
pub enum TurnEnd {
    Completed,
    Cancelled,
    Failed(Error),
}

/// Ctrl-C presses for the whole session. Poll it at the prompt as well as
/// during answers: once tokio owns SIGINT, an unwatched press is lost.
pub fn ctrl_c_presses() -> impl Stream<Item = ()> + Send {
    stream::unfold((), |()| async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(((), ())),
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                None
            }
        }
    })
}

pub struct ChatSession {
    agent: Agent,
}

impl ChatSession {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    /// Runs until `exit`, end of input or Ctrl-C at the prompt. Ctrl-C while
    /// an answer streams cancels only that answer.
    pub async fn run<R, W>(&self, reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.run_with_interrupt(reader, writer, ctrl_c_presses())
            .await
    }

    /// Same as [`run`](Self::run) with a custom interrupt source. Each item
    /// of `interrupts` is one key press; once it ends, interrupts are off.
    pub async fn run_with_interrupt<R, W, S>(
        &self,
        reader: R,
        writer: &mut W,
        interrupts: S,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Stream<Item = ()>,
    {
        let mut lines = reader.lines();
        let interrupts = interrupts.fuse();
        tokio::pin!(interrupts);

        writer
            .write_all(b"Welcome to Rasheed AI demo! Type 'exit' to quit.\n")
            .await?;
        writer
            .write_all(b"You can ask me anything, and I will try to help you.\n")
            .await?;

        loop {
            writer.write_all(b"\nYou: ").await?;
            writer.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                Some(()) = interrupts.next() => {
                    info!("Interrupted at the prompt, leaving chat");
                    writer.write_all(b"\n").await?;
                    writer.write_all(GOODBYE).await?;
                    writer.flush().await?;
                    return Ok(());
                }
            };

            let Some(line) = line else {
                info!("Input closed, leaving chat");
                writer.write_all(b"\n").await?;
                writer.write_all(GOODBYE).await?;
                writer.flush().await?;
                return Ok(());
            };

            let input = line.trim();
            if is_exit_command(input) {
                writer.write_all(GOODBYE).await?;
                writer.flush().await?;
                return Ok(());
            }
            if input.is_empty() {
                continue;
            }

            writer
                .write_all(format!("{ASSISTANT_NAME}: ").as_bytes())
                .await?;
            writer.flush().await?;

            match self.answer(input, writer, interrupts.as_mut()).await? {
                TurnEnd::Completed => writer.write_all(b"\n").await?,
                TurnEnd::Cancelled => writer.write_all(b" [cancelled]\n").await?,
                TurnEnd::Failed(e) => {
                    writer
                        .write_all(format!(" [error] {e}\n").as_bytes())
                        .await?;
                    if e.kind() == ErrorKind::Configuration {
                        writer.flush().await?;
                        return Err(e);
                    }
                }
            }
            writer.flush().await?;
        }
    }

    /// Streams one answer to `writer`, flushing after every fragment.
    async fn answer<W, S>(
        &self,
        input: &str,
        writer: &mut W,
        mut interrupts: Pin<&mut S>,
    ) -> Result<TurnEnd>
    where
        W: AsyncWrite + Unpin,
        S: Stream<Item = ()>,
    {
        let mut fragments = self.agent.stream(input);

        loop {
            tokio::select! {
                next = fragments.next() => match next {
                    Some(Ok(Fragment::Text(text))) => {
                        writer.write_all(text.as_bytes()).await?;
                        writer.flush().await?;
                    }
                    Some(Ok(Fragment::ToolUse { name })) => {
                        writer.write_all(format!("Tool: {name}\n").as_bytes()).await?;
                        writer.flush().await?;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, kind = e.kind().as_str(), "Agent turn failed");
                        return Ok(TurnEnd::Failed(e));
                    }
                    None => return Ok(TurnEnd::Completed),
                },
                Some(()) = interrupts.next() => {
                    info!("Answer interrupted by user");
                    return Ok(TurnEnd::Cancelled);
                }
            }
        }
    }
}
