use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{
        Channel, ChannelId, ChannelKind, Guild, GuildId, Message, MessageId, Role, RoleId, User,
        UserId,
    },
    protocol::{InvocationEvent, InvocationPayload, ReplySpec, SlotValue},
};

use crate::{
    access::{AccessPolicy, AccessScope, AccessValidator, AccessManager},
    command::Command,
    context::{CommandContext, Services},
    handler::InvocationHandler,
    invocation::{ChainMatch, Invocation, TokenStream},
    metrics::{Observer, Stage, Tags},
    parse::ArgumentSource,
    reply::{ReplyTransport, SentReply},
    resolve::EntityResolver,
    result::CommandResult,
};

pub const GUILD: GuildId = GuildId(100);
pub const CHANNEL: ChannelId = ChannelId(200);
pub const ORIGIN: MessageId = MessageId(300);
pub const OWNER: UserId = UserId(1);
pub const BOT_OWNER: UserId = UserId(2);

pub fn user(id: u64) -> User {
    User {
        user_id: UserId(id),
        username: format!("user{id}"),
        bot: false,
    }
}

pub fn text_event(caller: u64, content: &str) -> InvocationEvent {
    InvocationEvent {
        event_id: uuid::Uuid::new_v4(),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        caller: user(caller),
        received_at: chrono::Utc::now(),
        payload: InvocationPayload::Text {
            message_id: ORIGIN,
            content: content.to_string(),
            attachments: Vec::new(),
        },
    }
}

pub fn slash_event(
    caller: u64,
    path: &[&str],
    options: impl IntoIterator<Item = (&'static str, SlotValue)>,
) -> InvocationEvent {
    InvocationEvent {
        event_id: uuid::Uuid::new_v4(),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        caller: user(caller),
        received_at: chrono::Utc::now(),
        payload: InvocationPayload::Slash {
            path: path.iter().map(|name| name.to_string()).collect(),
            options: options
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            attachments: HashMap::new(),
        },
    }
}

#[derive(Default)]
pub struct FakeResolver {
    pub guilds: HashMap<GuildId, Guild>,
    pub channels: HashMap<ChannelId, Channel>,
    pub users: HashMap<UserId, User>,
    pub roles: HashMap<RoleId, Role>,
    pub messages: HashMap<(ChannelId, MessageId), Message>,
    pub member_roles: HashMap<UserId, Vec<RoleId>>,
    pub fail: bool,
    /// Holds `user` lookups for this long.
    pub user_delay: Option<Duration>,
}

impl FakeResolver {
    /// One guild owned by [`OWNER`] with a plain text channel.
    pub fn standard() -> Self {
        let mut resolver = Self::default();
        resolver.guilds.insert(
            GUILD,
            Guild {
                guild_id: GUILD,
                name: "guild".into(),
                owner_id: OWNER,
            },
        );
        resolver.channels.insert(
            CHANNEL,
            Channel {
                channel_id: CHANNEL,
                guild_id: Some(GUILD),
                kind: ChannelKind::Text,
                name: "general".into(),
                age_restricted: false,
            },
        );
        for id in [1, 2, 3, 4] {
            resolver.users.insert(UserId(id), user(id));
        }
        resolver
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(anyhow!("resolver offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityResolver for FakeResolver {
    async fn guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        self.check()?;
        Ok(self.guilds.get(&guild_id).cloned())
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Option<Channel>> {
        self.check()?;
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        self.check()?;
        if let Some(delay) = self.user_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.users.get(&user_id).cloned())
    }

    async fn role(&self, guild_id: GuildId, role_id: RoleId) -> Result<Option<Role>> {
        self.check()?;
        Ok(self
            .roles
            .get(&role_id)
            .filter(|role| role.guild_id == guild_id)
            .cloned())
    }

    async fn message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<Message>> {
        self.check()?;
        Ok(self.messages.get(&(channel_id, message_id)).cloned())
    }

    async fn member_roles(&self, _guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>> {
        self.check()?;
        Ok(self.member_roles.get(&user_id).cloned().unwrap_or_default())
    }

    async fn application_owner(&self) -> Result<UserId> {
        self.check()?;
        Ok(BOT_OWNER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        reference: Option<MessageId>,
        spec: ReplySpec,
    },
    Edit {
        message_id: MessageId,
        spec: ReplySpec,
    },
    Delete {
        message_id: MessageId,
    },
    React {
        message_id: MessageId,
        reaction: String,
    },
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub next_id: AtomicU64,
    pub delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().expect("sent lock").push(sent);
    }
}

#[async_trait]
impl ReplyTransport for RecordingTransport {
    async fn send(
        &self,
        channel_id: ChannelId,
        _recipient: UserId,
        reference: Option<MessageId>,
        spec: &ReplySpec,
    ) -> Result<SentReply> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let message_id = MessageId(1_000 + self.next_id.fetch_add(1, Ordering::SeqCst));
        self.push(Sent::Message {
            reference,
            spec: spec.clone(),
        });
        Ok(SentReply {
            channel_id,
            message_id,
        })
    }

    async fn edit(&self, reply: SentReply, spec: &ReplySpec) -> Result<()> {
        self.push(Sent::Edit {
            message_id: reply.message_id,
            spec: spec.clone(),
        });
        Ok(())
    }

    async fn delete(&self, reply: SentReply) -> Result<()> {
        self.push(Sent::Delete {
            message_id: reply.message_id,
        });
        Ok(())
    }

    async fn react(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<()> {
        self.push(Sent::React {
            message_id,
            reaction: reaction.to_string(),
        });
        Ok(())
    }
}

/// Wraps an access manager and counts how many validators it hands out.
pub struct CountingAccess {
    pub inner: AccessPolicy,
    pub validators: AtomicUsize,
}

impl CountingAccess {
    pub fn new(inner: AccessPolicy) -> Self {
        Self {
            inner,
            validators: AtomicUsize::new(0),
        }
    }
}

impl AccessManager for CountingAccess {
    fn validator(&self, scope: AccessScope) -> Arc<dyn AccessValidator> {
        self.validators.fetch_add(1, Ordering::SeqCst);
        self.inner.validator(scope)
    }
}

pub struct Harness {
    pub resolver: Arc<FakeResolver>,
    pub transport: Arc<RecordingTransport>,
    pub access: Arc<CountingAccess>,
}

impl Harness {
    pub fn new(resolver: FakeResolver, policy: AccessPolicy) -> Self {
        Self {
            resolver: Arc::new(resolver),
            transport: Arc::new(RecordingTransport::default()),
            access: Arc::new(CountingAccess::new(policy)),
        }
    }

    pub fn standard() -> Self {
        Self::new(FakeResolver::standard(), AccessPolicy::Basic)
    }

    pub fn services(&self) -> Services {
        Services {
            resolver: self.resolver.clone(),
            transport: self.transport.clone(),
            access: self.access.clone(),
        }
    }

    /// A context for `chain` as invoked by `event`, with text arguments `args`.
    pub fn text_context(
        &self,
        chain: Vec<Arc<Command>>,
        event: InvocationEvent,
        args: &str,
    ) -> CommandContext {
        let attachments = match &event.payload {
            InvocationPayload::Text { attachments, .. } => attachments.clone(),
            InvocationPayload::Slash { .. } => Vec::new(),
        };
        let invocation = Invocation::of(chain.iter().map(|command| command.name.clone()));
        CommandContext::new(
            Arc::new(event),
            ChainMatch { chain, invocation },
            ArgumentSource::Text {
                tokens: TokenStream::from_text(args),
                attachments,
            },
            self.services(),
        )
    }
}

/// Always returns the same result.
pub struct Fixed(pub CommandResult);

#[async_trait]
impl InvocationHandler for Fixed {
    async fn handle(&self, _context: &CommandContext) -> Result<CommandResult> {
        Ok(self.0.clone())
    }
}

/// Counts calls and returns `Continue`.
#[derive(Clone, Default)]
pub struct Counting(pub Arc<AtomicUsize>);

#[async_trait]
impl InvocationHandler for Counting {
    async fn handle(&self, _context: &CommandContext) -> Result<CommandResult> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(CommandResult::Continue)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub records: Mutex<Vec<(Stage, Tags)>>,
}

impl RecordingObserver {
    pub fn stages(&self) -> Vec<Stage> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .map(|(stage, _)| *stage)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn record(&self, stage: Stage, tags: &Tags, _elapsed: Duration) {
        self.records
            .lock()
            .expect("records lock")
            .push((stage, tags.clone()));
    }
}
