use std::{fmt, time::Duration};

use shared::{
    domain::{ChannelId, GuildId, UserId},
    protocol::InvocationStyle,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Event,
    Parse,
    Validate,
    Load,
    Invoke,
    Handle,
    Execute,
    Result,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Event => "event",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
            Stage::Load => "load",
            Stage::Invoke => "invoke",
            Stage::Handle => "handle",
            Stage::Execute => "execute",
            Stage::Result => "result",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-cardinality labels attached to a stage measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub style: Option<InvocationStyle>,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub caller: Option<UserId>,
    pub command: Option<String>,
    pub outcome: Option<&'static str>,
}

impl Tags {
    pub fn with_command(&self, command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..self.clone()
        }
    }

    pub fn with_outcome(&self, outcome: &'static str) -> Self {
        Self {
            outcome: Some(outcome),
            ..self.clone()
        }
    }
}

/// Receives one record per finished pipeline stage.
pub trait Observer: Send + Sync {
    fn record(&self, stage: Stage, tags: &Tags, elapsed: Duration);
}

pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _stage: Stage, _tags: &Tags, _elapsed: Duration) {}
}

/// Emits each record as a `debug` event.
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, stage: Stage, tags: &Tags, elapsed: Duration) {
        debug!(
            stage = stage.as_str(),
            style = tags.style.map(|style| style.as_str()),
            guild_id = tags.guild_id.map(|id| id.0),
            channel_id = tags.channel_id.map(|id| id.0),
            caller = tags.caller.map(|id| id.0),
            command = tags.command.as_deref(),
            outcome = tags.outcome,
            elapsed_us = elapsed.as_micros() as u64,
            "stage finished"
        );
    }
}
