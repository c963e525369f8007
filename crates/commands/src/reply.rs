use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use shared::{
    domain::{ChannelId, MessageId, UserId},
    protocol::ReplySpec,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Where a reply landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentReply {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Outbound message transport.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    /// Sends `spec` publicly to `channel_id`, or privately to `recipient` when
    /// `spec.private` is set.
    async fn send(
        &self,
        channel_id: ChannelId,
        recipient: UserId,
        reference: Option<MessageId>,
        spec: &ReplySpec,
    ) -> Result<SentReply>;
    async fn edit(&self, reply: SentReply, spec: &ReplySpec) -> Result<()>;
    async fn delete(&self, reply: SentReply) -> Result<()>;
    async fn react(&self, channel_id: ChannelId, message_id: MessageId, reaction: &str)
        -> Result<()>;
}

#[derive(Default)]
struct ReplyChain {
    replies: Vec<SentReply>,
}

/// The ordered replies sent for one invocation.
///
/// Each public reply references the previous one in the same channel (the
/// first references the triggering message). Sends are serialized.
pub struct ReplyManager {
    transport: Arc<dyn ReplyTransport>,
    channel_id: ChannelId,
    caller: UserId,
    origin: Option<MessageId>,
    chain: Mutex<ReplyChain>,
}

impl ReplyManager {
    pub fn new(
        transport: Arc<dyn ReplyTransport>,
        channel_id: ChannelId,
        caller: UserId,
        origin: Option<MessageId>,
    ) -> Self {
        Self {
            transport,
            channel_id,
            caller,
            origin,
            chain: Mutex::new(ReplyChain::default()),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn origin(&self) -> Option<MessageId> {
        self.origin
    }

    /// Sends the first reply; fails if anything was already sent.
    pub async fn reply(&self, spec: ReplySpec) -> Result<SentReply> {
        let mut chain = self.chain.lock().await;
        if !chain.replies.is_empty() {
            bail!("a reply was already sent for this invocation");
        }
        self.send_locked(&mut chain, spec).await
    }

    /// Appends a reply to the chain.
    pub async fn add(&self, spec: ReplySpec) -> Result<SentReply> {
        let mut chain = self.chain.lock().await;
        self.send_locked(&mut chain, spec).await
    }

    async fn send_locked(&self, chain: &mut ReplyChain, spec: ReplySpec) -> Result<SentReply> {
        let reference = chain
            .replies
            .iter()
            .rev()
            .find(|reply| reply.channel_id == self.channel_id)
            .map(|reply| reply.message_id)
            .or(self.origin)
            .filter(|_| !spec.private);

        let sent = self
            .transport
            .send(self.channel_id, self.caller, reference, &spec)
            .await?;
        debug!(
            channel_id = %sent.channel_id,
            message_id = %sent.message_id,
            index = chain.replies.len(),
            "reply sent"
        );
        chain.replies.push(sent);
        Ok(sent)
    }

    pub async fn get(&self, index: usize) -> Option<SentReply> {
        self.chain.lock().await.replies.get(index).copied()
    }

    pub async fn len(&self) -> usize {
        self.chain.lock().await.replies.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn edit(&self, index: usize, spec: ReplySpec) -> Result<()> {
        let chain = self.chain.lock().await;
        let reply = *chain
            .replies
            .get(index)
            .ok_or_else(|| anyhow!("no reply at index {index}"))?;
        self.transport.edit(reply, &spec).await
    }

    /// Deletes the reply at `index`. Indices of later replies are unchanged.
    pub async fn delete(&self, index: usize) -> Result<()> {
        let chain = self.chain.lock().await;
        let reply = *chain
            .replies
            .get(index)
            .ok_or_else(|| anyhow!("no reply at index {index}"))?;
        self.transport.delete(reply).await
    }

    /// Reacts to the triggering message. Returns `false` when there is none.
    pub async fn react_to_origin(&self, reaction: &str) -> Result<bool> {
        let Some(origin) = self.origin else {
            return Ok(false);
        };
        self.transport
            .react(self.channel_id, origin, reaction)
            .await?;
        Ok(true)
    }

    /// A detached manager holding a copy of this chain, for replies sent
    /// after the invocation has finished.
    pub async fn long_term(&self) -> ReplyManager {
        let replies = self.chain.lock().await.replies.clone();
        ReplyManager {
            transport: self.transport.clone(),
            channel_id: self.channel_id,
            caller: self.caller,
            origin: self.origin,
            chain: Mutex::new(ReplyChain { replies }),
        }
    }
}

#[cfg(test)]
#[path = "tests/reply_tests.rs"]
mod tests;
