//! Settings and access checks run before arguments are loaded.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::{
    access::Group,
    command::{Command, CommandSettings},
    context::CommandContext,
    result::{CommandResult, Failure},
};

pub const AGE_RESTRICTED_DENIED: &str =
    "Command can only be called from an age-restricted channel.";
pub const SERVER_OWNER_DENIED: &str = "Must be server owner to call this command.";
pub const BOT_OWNER_DENIED: &str = "Must be bot owner to call this command.";

/// The command whose settings apply to the invocation: the invoked command,
/// or the nearest ancestor reached while `inherit_settings` holds.
pub fn settings_source(chain: &[Arc<Command>]) -> Option<&Arc<Command>> {
    let mut index = chain.len().checked_sub(1)?;
    while index > 0 && chain[index].settings.inherit_settings {
        index -= 1;
    }
    chain.get(index)
}

/// Groups the caller must belong to, root first.
pub fn required_groups(chain: &[Arc<Command>]) -> Vec<Group> {
    let Some(mut index) = chain.len().checked_sub(1) else {
        return Vec::new();
    };
    let mut groups = vec![chain[index].group.clone()];
    while index > 0 && chain[index].settings.require_parent_groups {
        index -= 1;
        groups.push(chain[index].group.clone());
    }
    groups.reverse();
    groups
}

async fn check_age_restricted(context: &CommandContext) -> Result<bool> {
    // A direct message is never an age-restricted channel.
    if context.guild_id().is_none() {
        return Ok(false);
    }
    Ok(context
        .resolver()
        .channel(context.channel_id())
        .await?
        .is_some_and(|channel| channel.age_restricted))
}

async fn check_server_owner(context: &CommandContext) -> Result<bool> {
    Group::server_owner()
        .belongs(&context.access_scope())
        .await
}

async fn check_bot_owner(context: &CommandContext) -> Result<bool> {
    Group::bot_owner()
        .belongs(&context.access_scope())
        .await
}

async fn validate_settings(
    context: &CommandContext,
    settings: &CommandSettings,
) -> Result<Option<Failure>> {
    if settings.age_restricted && !check_age_restricted(context).await? {
        return Ok(Some(Failure::SettingDenied(AGE_RESTRICTED_DENIED.to_string())));
    }
    if settings.server_owner_only && !check_server_owner(context).await? {
        return Ok(Some(Failure::SettingDenied(SERVER_OWNER_DENIED.to_string())));
    }
    if settings.owner_only && !check_bot_owner(context).await? {
        return Ok(Some(Failure::SettingDenied(BOT_OWNER_DENIED.to_string())));
    }
    Ok(None)
}

async fn validate_access(context: &CommandContext) -> Result<Option<Failure>> {
    for group in required_groups(context.chain()) {
        if !context.has_access(&group).await? {
            debug!(group = %group, caller = %context.caller().user_id, "access denied");
            return Ok(Some(Failure::UserNotAllowed { group }));
        }
    }
    Ok(None)
}

/// Runs settings validators, then access checks. `None` means the invocation
/// may proceed.
pub async fn validate(context: &CommandContext) -> Option<CommandResult> {
    let source = settings_source(context.chain())?;

    let outcome = match validate_settings(context, &source.settings).await {
        Ok(None) => validate_access(context).await,
        other => other,
    };

    match outcome {
        Ok(None) => None,
        Ok(Some(failure)) => Some(CommandResult::Failure(failure)),
        Err(err) => Some(CommandResult::exception(err.context("validating invocation"))),
    }
}

#[cfg(test)]
#[path = "tests/validate_tests.rs"]
mod tests;
