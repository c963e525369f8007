use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use shared::{domain::GuildId, protocol::InvocationStyle};

use crate::invocation::{AliasTable, Invocation};

/// What to do when a style that requires a full match leaves input unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchViolationPolicy {
    /// Log the inconsistency and drop the event.
    #[default]
    DropEvent,
    /// Treat the inconsistency as fatal and stop the executor.
    HaltPipeline,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub min_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            min_backoff_secs: 1,
            max_backoff_secs: 60 * 60,
        }
    }
}

impl RetrySettings {
    pub fn min_backoff(&self) -> Duration {
        Duration::from_secs(self.min_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs.max(self.min_backoff_secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FullMatch {
    pub text: bool,
    pub slash: bool,
}

impl Default for FullMatch {
    fn default() -> Self {
        Self {
            text: false,
            slash: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub prefix: String,
    /// Prefix overrides keyed by guild id.
    pub guild_prefixes: HashMap<String, String>,
    pub full_match: FullMatch,
    pub on_match_violation: MatchViolationPolicy,
    pub retry: RetrySettings,
    /// Alias invocation to target invocation, both space separated.
    pub aliases: HashMap<String, String>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            prefix: "!".into(),
            guild_prefixes: HashMap::new(),
            full_match: FullMatch::default(),
            on_match_violation: MatchViolationPolicy::default(),
            retry: RetrySettings::default(),
            aliases: HashMap::new(),
        }
    }
}

impl ExecutorSettings {
    pub fn prefix_for(&self, guild_id: Option<GuildId>) -> &str {
        guild_id
            .and_then(|id| self.guild_prefixes.get(&id.to_string()))
            .map(String::as_str)
            .unwrap_or(&self.prefix)
    }

    pub fn requires_full_match(&self, style: InvocationStyle) -> bool {
        match style {
            InvocationStyle::Text => self.full_match.text,
            InvocationStyle::Slash => self.full_match.slash,
        }
    }

    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::new();
        for (alias, target) in &self.aliases {
            let alias = Invocation::parse(alias);
            let target = Invocation::parse(target);
            if !alias.is_empty() && !target.is_empty() {
                table.insert(alias, target);
            }
        }
        table
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
