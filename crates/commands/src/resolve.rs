use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{
    Channel, ChannelId, Guild, GuildId, Message, MessageId, Role, RoleId, User, UserId,
};

/// Looks up platform entities by id within the current invocation's reach.
///
/// `Ok(None)` means the entity does not exist (or is not visible); `Err` is
/// reserved for transport failures.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    async fn guild(&self, guild_id: GuildId) -> Result<Option<Guild>>;
    async fn channel(&self, channel_id: ChannelId) -> Result<Option<Channel>>;
    async fn user(&self, user_id: UserId) -> Result<Option<User>>;
    async fn role(&self, guild_id: GuildId, role_id: RoleId) -> Result<Option<Role>>;
    async fn message(&self, channel_id: ChannelId, message_id: MessageId)
        -> Result<Option<Message>>;
    async fn member_roles(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>>;
    async fn application_owner(&self) -> Result<UserId>;
}

pub struct MissingEntityResolver;

#[async_trait]
impl EntityResolver for MissingEntityResolver {
    async fn guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        Err(anyhow!("entity resolution unavailable for guild {guild_id}"))
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Option<Channel>> {
        Err(anyhow!("entity resolution unavailable for channel {channel_id}"))
    }

    async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        Err(anyhow!("entity resolution unavailable for user {user_id}"))
    }

    async fn role(&self, guild_id: GuildId, role_id: RoleId) -> Result<Option<Role>> {
        Err(anyhow!(
            "entity resolution unavailable for role {role_id} in guild {guild_id}"
        ))
    }

    async fn message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<Message>> {
        Err(anyhow!(
            "entity resolution unavailable for message {message_id} in channel {channel_id}"
        ))
    }

    async fn member_roles(&self, guild_id: GuildId, user_id: UserId) -> Result<Vec<RoleId>> {
        Err(anyhow!(
            "entity resolution unavailable for member {user_id} of guild {guild_id}"
        ))
    }

    async fn application_owner(&self) -> Result<UserId> {
        Err(anyhow!("application info unavailable"))
    }
}
