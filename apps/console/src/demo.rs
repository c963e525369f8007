//! The console's entity directory and its built-in commands.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use commands::{
    Command, CommandContext, CommandResult, CommandSettings, EntityResolver, Invocation,
    InvocationHandler, MemoryRegistry, Parameter, ParserKind,
};
use shared::{
    domain::{Channel, ChannelId, Guild, GuildId, Message, MessageId, Role, RoleId, User, UserId},
    protocol::ReplySpec,
};

use crate::config::DirectorySeed;

/// In-memory entities seeded from settings.
#[derive(Default)]
pub struct StaticDirectory {
    owner: Option<UserId>,
    guilds: HashMap<GuildId, Guild>,
    channels: HashMap<ChannelId, Channel>,
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, Role>,
    members: HashMap<(GuildId, UserId), Vec<RoleId>>,
}

impl StaticDirectory {
    pub fn new(owner: UserId, seed: DirectorySeed) -> Self {
        Self {
            owner: Some(owner),
            guilds: seed.guilds.into_iter().map(|g| (g.guild_id, g)).collect(),
            channels: seed.channels.into_iter().map(|c| (c.channel_id, c)).collect(),
            users: seed.users.into_iter().map(|u| (u.user_id, u)).collect(),
            roles: seed.roles.into_iter().map(|r| (r.role_id, r)).collect(),
            members: seed
                .members
                .into_iter()
                .map(|m| ((m.guild_id, m.user_id), m.roles))
                .collect(),
        }
    }
}

#[async_trait]
impl EntityResolver for StaticDirectory {
    async fn guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        Ok(self.guilds.get(&guild_id).cloned())
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Option<Channel>> {
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).cloned())
    }

    async fn role(&self, guild_id: GuildId, role_id: RoleId) -> Result<Option<Role>> {
        Ok(self
            .roles
            .get(&role_id)
            .filter(|role| role.guild_id == guild_id)
            .cloned())
    }

    // The console keeps no message history.
    async fn message(
        &self,
        _channel_id: ChannelId,
        _message_id: MessageId,
    ) -> Result<Option<Message>> {
        Ok(None)
    }

    async fn member_roles(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>> {
        Ok(self
            .members
            .get(&(guild_id, user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn application_owner(&self) -> Result<UserId> {
        self.owner
            .ok_or_else(|| anyhow::anyhow!("application owner is not configured"))
    }
}

struct Ping;

#[async_trait]
impl InvocationHandler for Ping {
    async fn handle(&self, _context: &CommandContext) -> Result<CommandResult> {
        Ok(CommandResult::success("Pong!"))
    }
}

struct Parrot;

#[async_trait]
impl InvocationHandler for Parrot {
    async fn handle(&self, context: &CommandContext) -> Result<CommandResult> {
        let message: String = context.argument("message").unwrap_or_default();
        context.reply(ReplySpec::text(message)).await?;
        Ok(CommandResult::ok())
    }
}

struct Whois;

#[async_trait]
impl InvocationHandler for Whois {
    async fn handle(&self, context: &CommandContext) -> Result<CommandResult> {
        let Some(user) = context.argument::<User>("user") else {
            return Ok(CommandResult::error("user argument was not bound"));
        };
        let kind = if user.bot { "bot" } else { "user" };
        Ok(CommandResult::success(format!(
            "{} is a {kind} with id {}",
            user.username, user.user_id
        )))
    }
}

struct Status;

#[async_trait]
impl InvocationHandler for Status {
    async fn handle(&self, _context: &CommandContext) -> Result<CommandResult> {
        Ok(CommandResult::ack("✅", "Pipeline running."))
    }
}

/// `ping`, `parrot <message...>`, `whois <user>` and the owner-only
/// `admin status` under a non-callable `admin` namespace.
pub fn registry() -> MemoryRegistry {
    MemoryRegistry::new()
        .with(Command::new("ping", Invocation::parse("ping")).with_handler(Ping))
        .with(
            Command::new("parrot", Invocation::parse("parrot"))
                .with_parameter(
                    Parameter::required("message", ParserKind::text())
                        .described("Text to repeat"),
                )
                .with_handler(Parrot),
        )
        .with(
            Command::new("whois", Invocation::parse("whois"))
                .with_parameter(Parameter::required("user", ParserKind::User))
                .with_handler(Whois),
        )
        .with(
            Command::new("admin", Invocation::parse("admin")).with_settings(CommandSettings {
                callable: false,
                owner_only: true,
                ..CommandSettings::default()
            }),
        )
        .with(
            Command::new("admin.status", Invocation::parse("admin status"))
                .with_settings(CommandSettings {
                    inherit_settings: true,
                    ..CommandSettings::default()
                })
                .with_handler(Status),
        )
}

#[cfg(test)]
#[path = "tests/demo_tests.rs"]
mod tests;
