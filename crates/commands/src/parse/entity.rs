//! Plain ids, mentions and permalinks, and their resolution to entities.

use shared::domain::{
    Channel, ChannelId, ChannelKind, GuildId, Message, MessageId, Role, RoleId, User, UserId,
};
use url::Url;

use crate::error::ArgumentError;

use super::{IdKind, ParseScope};

pub const PERMALINK_HOSTS: [&str; 3] = ["discord.com", "ptb.discord.com", "canary.discord.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MentionKind {
    User,
    Channel,
    Role,
}

impl MentionKind {
    fn name(self) -> &'static str {
        match self {
            MentionKind::User => "user",
            MentionKind::Channel => "channel",
            MentionKind::Role => "role",
        }
    }

    fn strip(self, mention: &str) -> Option<&str> {
        match self {
            MentionKind::User => mention
                .strip_prefix("@!")
                .or_else(|| mention.strip_prefix('@').filter(|rest| !rest.starts_with('&'))),
            MentionKind::Channel => mention.strip_prefix('#'),
            MentionKind::Role => mention.strip_prefix("@&"),
        }
    }
}

/// A parsed `https://<host>/channels/<guild|@me>/<channel>[/<message>]` link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permalink {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

pub fn parse_snowflake(raw: &str) -> Result<u64, ArgumentError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ArgumentError::invalid(format!("Value '{raw}' is not a valid snowflake ID."))
    })
}

fn parse_mention(raw: &str, kind: MentionKind) -> Result<u64, ArgumentError> {
    let raw = raw.trim();
    match raw.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) {
        Some(inner) => {
            let id = kind.strip(inner).ok_or_else(|| {
                ArgumentError::invalid(format!("Not a {} mention", kind.name()))
            })?;
            id.parse::<u64>().map_err(|_| {
                ArgumentError::invalid(format!("Not a valid {} mention: <{inner}>", kind.name()))
            })
        }
        None => parse_snowflake(raw),
    }
}

fn is_link(raw: &str) -> bool {
    raw.trim_start().starts_with("https://")
}

pub fn parse_permalink(raw: &str) -> Result<Permalink, ArgumentError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| ArgumentError::invalid(format!("Not a valid URL: {raw}")))?;

    let host_ok = url
        .host_str()
        .is_some_and(|host| PERMALINK_HOSTS.contains(&host));
    if url.scheme() != "https" || !host_ok {
        return Err(ArgumentError::invalid(format!("Not a valid Discord URL: {raw}")));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let invalid = || ArgumentError::invalid(format!("Invalid channel URL: {raw}"));
    let (guild, channel, message) = match segments.as_slice() {
        ["channels", guild, channel] => (*guild, *channel, None),
        ["channels", guild, channel, message] => (*guild, *channel, Some(*message)),
        _ => return Err(invalid()),
    };

    let guild_id = match guild {
        "@me" => None,
        id => Some(GuildId(id.parse().map_err(|_| invalid())?)),
    };
    let channel_id = ChannelId(channel.parse().map_err(|_| invalid())?);
    let message_id = message
        .map(|id| id.parse().map(MessageId).map_err(|_| invalid()))
        .transpose()?;

    Ok(Permalink {
        guild_id,
        channel_id,
        message_id,
    })
}

fn channel_id(raw: &str) -> Result<ChannelId, ArgumentError> {
    if is_link(raw) {
        return Ok(parse_permalink(raw)?.channel_id);
    }
    parse_mention(raw, MentionKind::Channel).map(ChannelId)
}

/// Channel and message ids named by `raw`; plain ids refer to the current channel.
fn message_ids(raw: &str, scope: &ParseScope) -> Result<(ChannelId, MessageId), ArgumentError> {
    if is_link(raw) {
        let link = parse_permalink(raw)?;
        let message_id = link
            .message_id
            .ok_or_else(|| ArgumentError::invalid(format!("Not a valid message URL: {raw}")))?;
        return Ok((link.channel_id, message_id));
    }
    Ok((scope.channel_id, MessageId(parse_snowflake(raw)?)))
}

fn role_id(raw: &str, scope: &ParseScope) -> Result<RoleId, ArgumentError> {
    let trimmed = raw.trim();
    if trimmed == "@everyone" || trimmed == "@here" {
        let guild_id = scope.guild_id.ok_or_else(|| {
            ArgumentError::invalid("Currently in a private channel, please use a URL")
        })?;
        // The everyone role shares the guild's id.
        return Ok(RoleId(guild_id.0));
    }
    parse_mention(trimmed, MentionKind::Role).map(RoleId)
}

pub fn parse_id(raw: &str, kind: IdKind, scope: &ParseScope) -> Result<u64, ArgumentError> {
    match kind {
        IdKind::Any => parse_snowflake(raw),
        IdKind::Channel => channel_id(raw).map(|id| id.0),
        IdKind::Message => message_ids(raw, scope).map(|(_, id)| id.0),
        IdKind::Role => role_id(raw, scope).map(|id| id.0),
        IdKind::User => parse_mention(raw, MentionKind::User),
    }
}

fn not_found() -> ArgumentError {
    ArgumentError::invalid("Not found.")
}

pub async fn resolve_user(raw: &str, scope: &ParseScope) -> Result<User, ArgumentError> {
    let user_id = UserId(parse_mention(raw, MentionKind::User)?);
    scope
        .resolver
        .user(user_id)
        .await
        .map_err(ArgumentError::Resolver)?
        .ok_or_else(not_found)
}

pub async fn resolve_role(raw: &str, scope: &ParseScope) -> Result<Role, ArgumentError> {
    let role_id = role_id(raw, scope)?;
    let guild_id = scope.guild_id.ok_or_else(|| {
        ArgumentError::invalid("Roles can only be referenced from inside a server")
    })?;
    scope
        .resolver
        .role(guild_id, role_id)
        .await
        .map_err(ArgumentError::Resolver)?
        .ok_or_else(not_found)
}

pub async fn resolve_channel(
    raw: &str,
    kinds: &[ChannelKind],
    scope: &ParseScope,
) -> Result<Channel, ArgumentError> {
    let channel_id = channel_id(raw)?;
    let channel = scope
        .resolver
        .channel(channel_id)
        .await
        .map_err(ArgumentError::Resolver)?
        .ok_or_else(not_found)?;

    match kinds.first() {
        Some(expected) if !kinds.contains(&channel.kind) => Err(ArgumentError::invalid(
            format!("Channel must be a {expected}"),
        )),
        _ => Ok(channel),
    }
}

pub async fn resolve_message(raw: &str, scope: &ParseScope) -> Result<Message, ArgumentError> {
    let (channel_id, message_id) = message_ids(raw, scope)?;
    scope
        .resolver
        .message(channel_id, message_id)
        .await
        .map_err(ArgumentError::Resolver)?
        .ok_or_else(not_found)
}

#[cfg(test)]
#[path = "tests/entity_tests.rs"]
mod tests;
