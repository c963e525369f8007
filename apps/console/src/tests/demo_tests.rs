use std::sync::Arc;

use commands::{
    AccessPolicy, CommandResult, EventOutcome, ExecutorSettings, Failure, Pipeline, Registry,
    Services, Success,
};
use shared::{
    domain::ChannelKind,
    protocol::{InvocationEvent, InvocationPayload, InvocationStyle},
};

use super::*;
use crate::{config::Membership, io::JsonTransport};

const GUILD: GuildId = GuildId(10);
const CHANNEL: ChannelId = ChannelId(20);
const OWNER: UserId = UserId(1);

fn seed() -> DirectorySeed {
    DirectorySeed {
        guilds: vec![Guild {
            guild_id: GUILD,
            name: "home".into(),
            owner_id: OWNER,
        }],
        channels: vec![Channel {
            channel_id: CHANNEL,
            guild_id: Some(GUILD),
            kind: ChannelKind::Text,
            name: "general".into(),
            age_restricted: false,
        }],
        users: vec![
            User {
                user_id: OWNER,
                username: "ada".into(),
                bot: false,
            },
            User {
                user_id: UserId(2),
                username: "bob".into(),
                bot: false,
            },
            User {
                user_id: UserId(9),
                username: "relay".into(),
                bot: true,
            },
        ],
        roles: vec![Role {
            role_id: RoleId(30),
            guild_id: GUILD,
            name: "mods".into(),
        }],
        members: vec![Membership {
            guild_id: GUILD,
            user_id: UserId(2),
            roles: vec![RoleId(30)],
        }],
    }
}

fn pipeline() -> Pipeline {
    let services = Services {
        resolver: Arc::new(StaticDirectory::new(OWNER, seed())),
        transport: Arc::new(JsonTransport::new(tokio::io::sink())),
        access: Arc::new(AccessPolicy::Basic),
    };
    Pipeline::new(Arc::new(registry()), services, ExecutorSettings::default())
}

fn said(caller: u64, content: &str) -> InvocationEvent {
    InvocationEvent {
        event_id: uuid::Uuid::new_v4(),
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        caller: User {
            user_id: UserId(caller),
            username: format!("user-{caller}"),
            bot: false,
        },
        received_at: chrono::Utc::now(),
        payload: InvocationPayload::Text {
            message_id: MessageId(77),
            content: content.into(),
            attachments: Vec::new(),
        },
    }
}

async fn result_of(caller: u64, content: &str) -> CommandResult {
    match pipeline().process(said(caller, content)).await.expect("not fatal") {
        EventOutcome::Handled { result, .. } => result,
        EventOutcome::Ignored(reason) => panic!("{content} was ignored: {reason:?}"),
    }
}

#[tokio::test]
async fn directory_serves_seeded_entities() {
    let directory = StaticDirectory::new(OWNER, seed());

    let guild = directory.guild(GUILD).await.expect("lookup").expect("guild");
    assert_eq!(guild.owner_id, OWNER);
    assert_eq!(
        directory
            .user(UserId(9))
            .await
            .expect("lookup")
            .map(|u| u.bot),
        Some(true)
    );
    assert!(directory.channel(ChannelId(21)).await.expect("lookup").is_none());
    assert!(directory
        .message(CHANNEL, MessageId(1))
        .await
        .expect("lookup")
        .is_none());
    assert_eq!(directory.application_owner().await.expect("owner"), OWNER);
}

#[tokio::test]
async fn roles_are_scoped_to_their_guild() {
    let directory = StaticDirectory::new(OWNER, seed());

    assert!(directory
        .role(GUILD, RoleId(30))
        .await
        .expect("lookup")
        .is_some());
    assert!(directory
        .role(GuildId(11), RoleId(30))
        .await
        .expect("lookup")
        .is_none());
    assert_eq!(
        directory.member_roles(GUILD, UserId(2)).await.expect("roles"),
        vec![RoleId(30)]
    );
    assert!(directory
        .member_roles(GUILD, UserId(3))
        .await
        .expect("roles")
        .is_empty());
}

#[tokio::test]
async fn unconfigured_directory_has_no_owner() {
    let directory = StaticDirectory::default();
    assert!(directory.application_owner().await.is_err());
}

#[test]
fn registry_exposes_the_built_in_commands() {
    let registry = registry();
    for path in ["ping", "parrot", "whois", "admin", "admin status"] {
        assert!(
            registry
                .lookup(&Invocation::parse(path), InvocationStyle::Text)
                .is_some(),
            "{path} is registered"
        );
    }

    let admin = registry
        .lookup(&Invocation::parse("admin"), InvocationStyle::Slash)
        .expect("admin");
    assert!(!admin.settings.callable);
    assert!(admin.settings.owner_only);
}

#[tokio::test]
async fn ping_and_whois_answer() {
    let pong = result_of(2, "!ping").await;
    assert!(matches!(pong, CommandResult::Success(Success::Message(ref m)) if m == "Pong!"));

    let whois = result_of(2, "!whois <@9>").await;
    let CommandResult::Success(Success::Message(message)) = whois else {
        panic!("expected a description, got {whois:?}");
    };
    assert_eq!(message, "relay is a bot with id 9");
}

#[tokio::test]
async fn admin_status_is_for_the_owner_only() {
    let denied = result_of(2, "!admin status").await;
    assert!(matches!(
        denied,
        CommandResult::Failure(Failure::SettingDenied(_))
    ));

    let allowed = result_of(1, "!admin status").await;
    assert!(matches!(
        allowed,
        CommandResult::Success(Success::Ack { ref reaction, .. }) if reaction == "✅"
    ));
}
