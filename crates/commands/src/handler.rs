use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use shared::protocol::{Embed, EmbedColor, ReplySpec};
use tracing::{error, warn};

use crate::{
    command::Command,
    context::CommandContext,
    error::HandlingError,
    metrics::{Observer, Stage, Tags},
    result::{CommandResult, Success},
};

/// Runs a command.
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    async fn handle(&self, context: &CommandContext) -> Result<CommandResult>;
}

/// Presents a terminal result. Returns whether the result is fully handled.
#[async_trait]
pub trait ResultHandler: Send + Sync {
    async fn handle(&self, context: &CommandContext, result: &CommandResult) -> Result<bool>;
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs the handlers of `order` until one produces a terminal result.
///
/// Handler errors and panics become [`CommandResult::Error`]; a chain where
/// every handler continues is an [`HandlingError::Incomplete`] error.
pub async fn invoke_chain(
    context: &CommandContext,
    order: &[Arc<Command>],
    observer: &dyn Observer,
    tags: &Tags,
) -> CommandResult {
    for command in order {
        let Some(handler) = &command.handler else {
            continue;
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(context))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                error!(command = %command.id, error = ?err, "command handler failed");
                CommandResult::exception(err)
            }
            Err(panic) => {
                let err = HandlingError::Panicked {
                    command: command.id.clone(),
                    message: panic_message(panic),
                };
                error!(command = %command.id, error = %err, "command handler panicked");
                CommandResult::exception(err.into())
            }
        };
        observer.record(
            Stage::Handle,
            &tags.with_command(command.id.clone()).with_outcome(result.outcome()),
            started.elapsed(),
        );

        if result.is_terminal() {
            return result;
        }
    }

    let err = HandlingError::Incomplete {
        command: context
            .command()
            .map(|command| command.id.clone())
            .unwrap_or_default(),
        invocation: context.invocation().to_string(),
    };
    error!(error = %err, "handler chain finished without a result");
    CommandResult::exception(err.into())
}

/// Which handler claimed a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Index into the command-declared handlers.
    Command(usize),
    Fallback,
    Unhandled,
}

/// Sends terminal results through command handlers, then the fallback.
#[derive(Clone)]
pub struct Dispatcher {
    fallback: Arc<dyn ResultHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(DefaultResultHandler))
    }
}

impl Dispatcher {
    pub fn new(fallback: Arc<dyn ResultHandler>) -> Self {
        Self { fallback }
    }

    pub async fn dispatch(
        &self,
        context: &CommandContext,
        handlers: &[Arc<dyn ResultHandler>],
        result: &CommandResult,
    ) -> Dispatch {
        for (index, handler) in handlers.iter().enumerate() {
            if run_result_handler(handler.as_ref(), context, result).await {
                return Dispatch::Command(index);
            }
        }
        if run_result_handler(self.fallback.as_ref(), context, result).await {
            return Dispatch::Fallback;
        }

        warn!(
            invocation = %context.invocation(),
            outcome = result.outcome(),
            "handling of result of command not complete"
        );
        Dispatch::Unhandled
    }
}

async fn run_result_handler(
    handler: &dyn ResultHandler,
    context: &CommandContext,
    result: &CommandResult,
) -> bool {
    match AssertUnwindSafe(handler.handle(context, result))
        .catch_unwind()
        .await
    {
        Ok(Ok(handled)) => handled,
        Ok(Err(err)) => {
            warn!(error = ?err, invocation = %context.invocation(), "result handler failed");
            false
        }
        Err(panic) => {
            warn!(
                panic = %panic_message(panic),
                invocation = %context.invocation(),
                "result handler panicked"
            );
            false
        }
    }
}

fn embed(title: &str, description: impl Into<String>, color: EmbedColor) -> ReplySpec {
    ReplySpec::embed(Embed {
        title: Some(title.to_string()),
        description: description.into(),
        color,
        footer: None,
    })
}

/// Default presentation of success, failure and error results.
pub struct DefaultResultHandler;

#[async_trait]
impl ResultHandler for DefaultResultHandler {
    async fn handle(&self, context: &CommandContext, result: &CommandResult) -> Result<bool> {
        match result {
            CommandResult::Continue => Ok(false),
            CommandResult::Success(Success::Ok) => Ok(true),
            CommandResult::Success(Success::Message(message)) => {
                context
                    .reply(embed("Success", message.clone(), EmbedColor::Green))
                    .await?;
                Ok(true)
            }
            CommandResult::Success(Success::Ack { reaction, message }) => {
                let replies = context.reply_manager().await?;
                if !replies.react_to_origin(reaction).await? {
                    replies
                        .add(ReplySpec::text(message.clone()).privately(true))
                        .await?;
                }
                Ok(true)
            }
            CommandResult::Failure(failure) => {
                if let Some(message) = failure.message() {
                    context
                        .reply(embed("Error", message, EmbedColor::Red))
                        .await?;
                }
                Ok(true)
            }
            CommandResult::Error(err) => {
                context
                    .reply(embed("Internal Error", err.message.clone(), EmbedColor::Gray))
                    .await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/handler_tests.rs"]
mod tests;
