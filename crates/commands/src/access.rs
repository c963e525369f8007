//! Access groups and the validators that decide membership for one caller.

use std::{collections::HashSet, fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use shared::domain::{ChannelId, GuildId, RoleId, User, UserId};

use crate::resolve::EntityResolver;

/// Where an invocation happens and who made it.
#[derive(Clone)]
pub struct AccessScope {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub caller: User,
    pub resolver: Arc<dyn EntityResolver>,
}

#[async_trait]
pub trait GroupPredicate: Send + Sync {
    async fn belongs(&self, scope: &AccessScope) -> Result<bool>;
}

#[derive(Clone)]
pub enum GroupRule {
    Everyone,
    Nobody,
    ServerOwner,
    BotOwner,
    Users(Arc<HashSet<UserId>>),
    HasRole(RoleId),
    Any(Vec<Group>),
    All(Vec<Group>),
    Custom(Arc<dyn GroupPredicate>),
}

/// A named permission predicate evaluated against the invocation scope.
#[derive(Clone)]
pub struct Group {
    name: Option<Arc<str>>,
    rule: GroupRule,
}

impl Group {
    pub fn new(rule: GroupRule) -> Self {
        Self { name: None, rule }
    }

    pub fn named(name: impl AsRef<str>, rule: GroupRule) -> Self {
        Self {
            name: Some(Arc::from(name.as_ref())),
            rule,
        }
    }

    pub fn everyone() -> Self {
        Self::named("Everyone", GroupRule::Everyone)
    }

    pub fn nobody() -> Self {
        Self::named("Nobody", GroupRule::Nobody)
    }

    pub fn server_owner() -> Self {
        Self::named("Server Owner", GroupRule::ServerOwner)
    }

    pub fn bot_owner() -> Self {
        Self::named("Bot Owner", GroupRule::BotOwner)
    }

    pub fn users(name: impl AsRef<str>, users: impl IntoIterator<Item = UserId>) -> Self {
        Self::named(name, GroupRule::Users(Arc::new(users.into_iter().collect())))
    }

    pub fn has_role(name: impl AsRef<str>, role_id: RoleId) -> Self {
        Self::named(name, GroupRule::HasRole(role_id))
    }

    pub fn custom(name: impl AsRef<str>, predicate: impl GroupPredicate + 'static) -> Self {
        Self::named(name, GroupRule::Custom(Arc::new(predicate)))
    }

    pub fn any(groups: impl IntoIterator<Item = Group>) -> Self {
        Self::new(GroupRule::Any(groups.into_iter().collect()))
    }

    pub fn all(groups: impl IntoIterator<Item = Group>) -> Self {
        Self::new(GroupRule::All(groups.into_iter().collect()))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rule(&self) -> &GroupRule {
        &self.rule
    }

    /// Whether the group never restricts anyone; such groups skip evaluation.
    pub fn is_everyone(&self) -> bool {
        matches!(self.rule, GroupRule::Everyone)
    }

    pub fn belongs<'a>(&'a self, scope: &'a AccessScope) -> BoxFuture<'a, Result<bool>> {
        async move {
            match &self.rule {
                GroupRule::Everyone => Ok(true),
                GroupRule::Nobody => Ok(false),
                GroupRule::ServerOwner => {
                    let Some(guild_id) = scope.guild_id else {
                        return Ok(false);
                    };
                    Ok(scope
                        .resolver
                        .guild(guild_id)
                        .await?
                        .is_some_and(|guild| guild.owner_id == scope.caller.user_id))
                }
                GroupRule::BotOwner => {
                    Ok(scope.resolver.application_owner().await? == scope.caller.user_id)
                }
                GroupRule::Users(users) => Ok(users.contains(&scope.caller.user_id)),
                GroupRule::HasRole(role_id) => {
                    let Some(guild_id) = scope.guild_id else {
                        return Ok(false);
                    };
                    let roles = scope
                        .resolver
                        .member_roles(guild_id, scope.caller.user_id)
                        .await?;
                    Ok(roles.contains(role_id))
                }
                GroupRule::Any(groups) => {
                    for group in groups {
                        if group.belongs(scope).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                GroupRule::All(groups) => {
                    for group in groups {
                        if !group.belongs(scope).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                GroupRule::Custom(predicate) => predicate.belongs(scope).await,
            }
        }
        .boxed()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Group({name})"),
            None => match &self.rule {
                GroupRule::Any(groups) => write!(f, "Any{groups:?}"),
                GroupRule::All(groups) => write!(f, "All{groups:?}"),
                _ => f.write_str("Group(<unnamed>)"),
            },
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("<unnamed>"))
    }
}

/// Answers group-membership questions for one (guild, channel, caller) scope.
#[async_trait]
pub trait AccessValidator: Send + Sync {
    async fn has_access(&self, group: &Group) -> Result<bool>;
}

pub trait AccessManager: Send + Sync {
    fn validator(&self, scope: AccessScope) -> Arc<dyn AccessValidator>;
}

#[derive(Clone)]
pub enum AccessPolicy {
    AlwaysAllow,
    AlwaysDeny,
    /// Plain group membership.
    Basic,
    /// Group membership, or membership in the override group.
    Overridable(Group),
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::Basic
    }
}

impl AccessManager for AccessPolicy {
    fn validator(&self, scope: AccessScope) -> Arc<dyn AccessValidator> {
        Arc::new(ScopedValidator {
            policy: self.clone(),
            scope,
        })
    }
}

struct ScopedValidator {
    policy: AccessPolicy,
    scope: AccessScope,
}

#[async_trait]
impl AccessValidator for ScopedValidator {
    async fn has_access(&self, group: &Group) -> Result<bool> {
        match &self.policy {
            AccessPolicy::AlwaysAllow => Ok(true),
            AccessPolicy::AlwaysDeny => Ok(false),
            AccessPolicy::Basic => group.belongs(&self.scope).await,
            AccessPolicy::Overridable(override_group) => {
                if group.belongs(&self.scope).await? {
                    return Ok(true);
                }
                override_group.belongs(&self.scope).await
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/access_tests.rs"]
mod tests;
