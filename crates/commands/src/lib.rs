//! Command execution pipeline: invocation matching, validation, argument
//! parsing, handler invocation and result dispatch over a retrying event
//! subscription.

pub mod access;
pub mod command;
pub mod context;
pub mod error;
pub mod handler;
pub mod invocation;
pub mod metrics;
pub mod parse;
pub mod pipeline;
pub mod reply;
pub mod resolve;
pub mod result;
pub mod settings;
pub mod validate;

pub use access::{AccessManager, AccessPolicy, AccessScope, AccessValidator, Group, GroupRule};
pub use command::{Command, CommandSettings, MemoryRegistry, Parameter, Registry, Scope};
pub use context::{CommandContext, Services};
pub use error::{ArgumentError, ContextError, HandlingError, InvalidChainError, PipelineError};
pub use handler::{DefaultResultHandler, Dispatch, Dispatcher, InvocationHandler, ResultHandler};
pub use invocation::{AliasTable, Invocation};
pub use metrics::{NoopObserver, Observer, Stage, Tags, TracingObserver};
pub use parse::{ArgumentValue, IdKind, ParserKind};
pub use pipeline::{CommandExecutor, EventOutcome, EventSource, IgnoreReason, Pipeline};
pub use reply::{ReplyManager, ReplyTransport, SentReply};
pub use resolve::EntityResolver;
pub use result::{CommandError, CommandResult, Failure, Success};
pub use settings::{ExecutorSettings, MatchViolationPolicy, RetrySettings};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
