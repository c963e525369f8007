use std::{fs, path::Path};

use commands::{ExecutorSettings, MatchViolationPolicy};
use serde::Deserialize;
use shared::domain::{Channel, Guild, GuildId, Role, RoleId, User, UserId};
use tracing::warn;

/// Roles held by one guild member.
#[derive(Debug, Clone, Deserialize)]
pub struct Membership {
    pub guild_id: GuildId,
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// Entities the console resolves references against.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySeed {
    pub guilds: Vec<Guild>,
    pub channels: Vec<Channel>,
    pub users: Vec<User>,
    pub roles: Vec<Role>,
    pub members: Vec<Membership>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub executor: ExecutorSettings,
    pub owner_id: UserId,
    pub directory: DirectorySeed,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executor: ExecutorSettings::default(),
            owner_id: UserId(1),
            directory: DirectorySeed::default(),
        }
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> Settings {
    let settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            Settings::default()
        }),
        Err(_) => Settings::default(),
    };
    apply_env(settings, |key| std::env::var(key).ok())
}

pub fn parse_settings(raw: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(raw)
}

/// Applies `BOT_*`/`APP__*` overrides looked up through `var`; `APP__` wins.
pub fn apply_env(mut settings: Settings, var: impl Fn(&str) -> Option<String>) -> Settings {
    if let Some(v) = var("BOT_PREFIX") {
        settings.executor.prefix = v;
    }
    if let Some(v) = var("APP__PREFIX") {
        settings.executor.prefix = v;
    }

    if let Some(v) = var("APP__OWNER_ID") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.owner_id = UserId(parsed),
            Err(_) => warn!(value = %v, "APP__OWNER_ID is not a user id"),
        }
    }

    let retry = &mut settings.executor.retry;
    if let Some(parsed) = var("APP__RETRY_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
        retry.max_attempts = parsed;
    }
    if let Some(parsed) = var("APP__RETRY_MIN_BACKOFF_SECS").and_then(|v| v.parse().ok()) {
        retry.min_backoff_secs = parsed;
    }
    if let Some(parsed) = var("APP__RETRY_MAX_BACKOFF_SECS").and_then(|v| v.parse().ok()) {
        retry.max_backoff_secs = parsed;
    }

    if let Some(v) = var("APP__ON_MATCH_VIOLATION") {
        let policy = match v.as_str() {
            "drop_event" => Some(MatchViolationPolicy::DropEvent),
            "halt_pipeline" => Some(MatchViolationPolicy::HaltPipeline),
            other => {
                warn!(value = other, "unknown APP__ON_MATCH_VIOLATION");
                None
            }
        };
        if let Some(policy) = policy {
            settings.executor.on_match_violation = policy;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
