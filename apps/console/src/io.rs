//! JSON-lines event intake and reply output.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use commands::{EventSource, ReplyTransport, SentReply};
use futures::{stream::BoxStream, StreamExt};
use serde::Deserialize;
use shared::{
    domain::{ChannelId, MessageId, UserId},
    error::{SourceError, SourceFault},
    protocol::{InvocationEvent, ReplyEvent, ReplySpec},
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::Mutex,
};
use tokio_stream::wrappers::LinesStream;
use tracing::warn;

/// One input line: an event, or a simulated infrastructure fault.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundLine {
    Fault { fault: SourceFault },
    Event(Box<InvocationEvent>),
}

/// Decodes one line. Blank and malformed lines yield nothing.
pub fn decode_line(line: &str) -> Option<Result<InvocationEvent, SourceError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<InboundLine>(line) {
        Ok(InboundLine::Event(event)) => Some(Ok(*event)),
        Ok(InboundLine::Fault { fault }) => Some(Err(fault.into())),
        Err(error) => {
            warn!(%error, "skipping malformed input line");
            None
        }
    }
}

pub fn decode_lines<R>(reader: R) -> BoxStream<'static, Result<InvocationEvent, SourceError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    LinesStream::new(reader.lines())
        .filter_map(|line| async move {
            match line {
                Ok(line) => decode_line(&line),
                Err(error) => Some(Err(SourceError::transient(format!(
                    "reading input failed: {error}"
                )))),
            }
        })
        .boxed()
}

/// Reads events from standard input, one JSON document per line.
pub struct StdinSource;

impl EventSource for StdinSource {
    fn subscribe(&self) -> BoxStream<'static, Result<InvocationEvent, SourceError>> {
        decode_lines(BufReader::new(tokio::io::stdin()))
    }
}

/// Writes every reply operation as a JSON [`ReplyEvent`] line.
pub struct JsonTransport<W> {
    out: Mutex<W>,
    next_id: AtomicU64,
}

impl<W> JsonTransport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonTransport<W> {
    async fn emit(&self, event: &ReplyEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ReplyTransport for JsonTransport<W> {
    async fn send(
        &self,
        channel_id: ChannelId,
        _recipient: UserId,
        reference: Option<MessageId>,
        spec: &ReplySpec,
    ) -> Result<SentReply> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.emit(&ReplyEvent::Sent {
            channel_id,
            message_id,
            reference,
            spec: spec.clone(),
        })
        .await?;
        Ok(SentReply {
            channel_id,
            message_id,
        })
    }

    async fn edit(&self, reply: SentReply, spec: &ReplySpec) -> Result<()> {
        self.emit(&ReplyEvent::Edited {
            channel_id: reply.channel_id,
            message_id: reply.message_id,
            spec: spec.clone(),
        })
        .await
    }

    async fn delete(&self, reply: SentReply) -> Result<()> {
        self.emit(&ReplyEvent::Deleted {
            channel_id: reply.channel_id,
            message_id: reply.message_id,
        })
        .await
    }

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<()> {
        self.emit(&ReplyEvent::Reacted {
            channel_id,
            message_id,
            reaction: reaction.to_string(),
        })
        .await
    }
}

#[cfg(test)]
#[path = "tests/io_tests.rs"]
mod tests;
