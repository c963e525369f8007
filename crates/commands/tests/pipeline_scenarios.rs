use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use commands::{
    AccessPolicy, Command, CommandContext, CommandResult, CommandSettings, EntityResolver,
    EventOutcome, ExecutorSettings, Failure, Group, IgnoreReason, Invocation, InvocationHandler,
    MemoryRegistry, Parameter, ParserKind, Pipeline, ReplyTransport, SentReply, Services, Success,
};
use shared::{
    domain::{Channel, ChannelId, Guild, GuildId, Message, MessageId, Role, RoleId, User, UserId},
    protocol::{EmbedColor, InvocationEvent, InvocationPayload, InvocationStyle, ReplySpec},
};

const GUILD: GuildId = GuildId(10);
const CHANNEL: ChannelId = ChannelId(20);

struct Directory;

#[async_trait]
impl EntityResolver for Directory {
    async fn guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        Ok(Some(Guild {
            guild_id,
            name: "acceptance".into(),
            owner_id: UserId(1),
        }))
    }

    async fn channel(&self, _channel_id: ChannelId) -> Result<Option<Channel>> {
        Ok(None)
    }

    async fn user(&self, _user_id: UserId) -> Result<Option<User>> {
        Ok(None)
    }

    async fn role(&self, _guild_id: GuildId, _role_id: RoleId) -> Result<Option<Role>> {
        Ok(None)
    }

    async fn message(
        &self,
        _channel_id: ChannelId,
        _message_id: MessageId,
    ) -> Result<Option<Message>> {
        Ok(None)
    }

    async fn member_roles(&self, _guild_id: GuildId, _user_id: UserId) -> Result<Vec<RoleId>> {
        Ok(Vec::new())
    }

    async fn application_owner(&self) -> Result<UserId> {
        Ok(UserId(1))
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<ReplySpec>>,
}

impl Outbox {
    fn sent(&self) -> Vec<ReplySpec> {
        self.sent.lock().expect("outbox lock").clone()
    }
}

#[async_trait]
impl ReplyTransport for Outbox {
    async fn send(
        &self,
        channel_id: ChannelId,
        _recipient: UserId,
        _reference: Option<MessageId>,
        spec: &ReplySpec,
    ) -> Result<SentReply> {
        let mut sent = self.sent.lock().expect("outbox lock");
        sent.push(spec.clone());
        Ok(SentReply {
            channel_id,
            message_id: MessageId(sent.len() as u64),
        })
    }

    async fn edit(&self, _reply: SentReply, _spec: &ReplySpec) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _reply: SentReply) -> Result<()> {
        Ok(())
    }

    async fn react(
        &self,
        _channel_id: ChannelId,
        _message_id: MessageId,
        _reaction: &str,
    ) -> Result<()> {
        Ok(())
    }
}

struct Reply(CommandResult);

#[async_trait]
impl InvocationHandler for Reply {
    async fn handle(&self, _context: &CommandContext) -> Result<CommandResult> {
        Ok(self.0.clone())
    }
}

/// Echoes the optional `rest` argument back as the success message.
struct Echo;

#[async_trait]
impl InvocationHandler for Echo {
    async fn handle(&self, context: &CommandContext) -> Result<CommandResult> {
        let rest: Option<String> = context.argument("rest");
        Ok(CommandResult::success(rest.unwrap_or_default()))
    }
}

fn admins() -> Group {
    Group::users("ADMINS", [UserId(1)])
}

fn registry(a_callable: bool) -> MemoryRegistry {
    MemoryRegistry::new()
        .with(
            Command::new("ping", Invocation::parse("ping"))
                .with_handler(Reply(CommandResult::success("Pong!"))),
        )
        .with(
            Command::new("parrot", Invocation::parse("parrot"))
                .with_parameter(Parameter::required("message", ParserKind::text()))
                .with_handler(Reply(CommandResult::ok())),
        )
        .with(
            Command::new("admin", Invocation::parse("admin"))
                .with_group(admins())
                .with_handler(Reply(CommandResult::success("Welcome, admin."))),
        )
        .with(
            Command::new("a", Invocation::parse("a"))
                .with_settings(CommandSettings {
                    callable: a_callable,
                    ..CommandSettings::default()
                })
                .with_parameter(Parameter::optional("rest", ParserKind::text()))
                .with_handler(Echo),
        )
        .with(
            Command::new("a.b", Invocation::parse("a b"))
                .with_styles([InvocationStyle::Slash])
                .with_handler(Reply(CommandResult::success("b ran"))),
        )
}

struct World {
    outbox: Arc<Outbox>,
    pipeline: Pipeline,
}

fn world(policy: AccessPolicy, a_callable: bool) -> World {
    let outbox = Arc::new(Outbox::default());
    let services = Services {
        resolver: Arc::new(Directory),
        transport: outbox.clone(),
        access: Arc::new(policy),
    };
    let pipeline = Pipeline::new(
        Arc::new(registry(a_callable)),
        services,
        ExecutorSettings::default(),
    );
    World { outbox, pipeline }
}

fn message(caller: u64, content: &str) -> InvocationEvent {
    InvocationEvent {
        event_id: uuid::Uuid::new_v4(),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        caller: User {
            user_id: UserId(caller),
            username: format!("caller-{caller}"),
            bot: false,
        },
        received_at: chrono::Utc::now(),
        payload: InvocationPayload::Text {
            message_id: MessageId(500),
            content: content.into(),
            attachments: Vec::new(),
        },
    }
}

async fn handled(world: &World, event: InvocationEvent) -> CommandResult {
    match world.pipeline.process(event).await.expect("not fatal") {
        EventOutcome::Handled { result, .. } => result,
        EventOutcome::Ignored(reason) => panic!("event ignored: {reason:?}"),
    }
}

fn only_embed(world: &World) -> (String, String, EmbedColor) {
    let sent = world.outbox.sent();
    assert_eq!(sent.len(), 1, "exactly one reply: {sent:?}");
    let embed = sent[0].embed.clone().expect("embed reply");
    (
        embed.title.unwrap_or_default(),
        embed.description,
        embed.color,
    )
}

#[tokio::test]
async fn ping_replies_pong() {
    let world = world(AccessPolicy::Basic, true);
    let result = handled(&world, message(3, "!ping")).await;

    assert!(matches!(result, CommandResult::Success(Success::Message(ref m)) if m == "Pong!"));
    assert_eq!(
        only_embed(&world),
        ("Success".into(), "Pong!".into(), EmbedColor::Green)
    );
}

#[tokio::test]
async fn parrot_without_message_reports_missing_argument() {
    let world = world(AccessPolicy::Basic, true);
    let result = handled(&world, message(3, "!parrot")).await;

    let CommandResult::Failure(Failure::ArgumentMissing { parameter }) = result else {
        panic!("expected a missing argument, got {result:?}");
    };
    assert_eq!(parameter, "message");
    let (title, description, color) = only_embed(&world);
    assert_eq!(title, "Error");
    assert_eq!(color, EmbedColor::Red);
    assert!(description.contains("message"));
}

#[tokio::test]
async fn admin_denies_non_members_unless_overridden() {
    let basic = world(AccessPolicy::Basic, true);
    let result = handled(&basic, message(3, "!admin")).await;
    let CommandResult::Failure(Failure::UserNotAllowed { group }) = result else {
        panic!("expected access denial, got {result:?}");
    };
    assert_eq!(group.name(), Some("ADMINS"));

    let moderators = Group::users("MODERATORS", [UserId(3)]);
    let overridden = world(AccessPolicy::Overridable(moderators), true);
    let result = handled(&overridden, message(3, "!admin")).await;
    assert!(matches!(result, CommandResult::Success(_)));

    let member = handled(&basic, message(1, "!admin")).await;
    assert!(matches!(member, CommandResult::Success(_)));
}

#[tokio::test]
async fn unreachable_child_runs_the_callable_parent() {
    let world = world(AccessPolicy::Basic, true);
    let result = handled(&world, message(3, "!a b")).await;
    assert!(matches!(result, CommandResult::Success(Success::Message(ref m)) if m == "b"));
}

#[tokio::test]
async fn unreachable_child_of_uncallable_parent_is_dropped() {
    let world = world(AccessPolicy::Basic, false);
    let outcome = world
        .pipeline
        .process(message(3, "!a b"))
        .await
        .expect("not fatal");
    assert!(matches!(
        outcome,
        EventOutcome::Ignored(IgnoreReason::NotCallable)
    ));
    assert!(world.outbox.sent().is_empty());
}
