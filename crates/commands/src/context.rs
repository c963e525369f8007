//! Per-invocation state: arguments, the ad-hoc store, replies and access.
//!
//! A context is created for one event and dropped when that event finishes.
//! `initialize` and `load` are one-shot: concurrent callers wait for the
//! first run and observe its outcome.

use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use anyhow::Result;
use shared::{
    domain::{ChannelId, GuildId, User},
    protocol::{InvocationEvent, ReplySpec},
};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::{
    access::{AccessManager, AccessScope, AccessValidator, Group},
    command::Command,
    error::ContextError,
    invocation::{ChainMatch, Invocation},
    parse::{self, ArgumentSource, ArgumentValue, FromArgument, ParseScope},
    reply::{ReplyManager, ReplyTransport, SentReply},
    resolve::EntityResolver,
    result::CommandResult,
};

/// External collaborators available to every context.
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<dyn EntityResolver>,
    pub transport: Arc<dyn ReplyTransport>,
    pub access: Arc<dyn AccessManager>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

struct Bound {
    validator: Arc<dyn AccessValidator>,
}

pub struct CommandContext {
    event: Arc<InvocationEvent>,
    invocation: Invocation,
    chain: Vec<Arc<Command>>,
    services: Services,
    source: ArgumentSource,
    initializing: AtomicBool,
    bound: OnceCell<Bound>,
    reply: RwLock<Option<Arc<ReplyManager>>>,
    loading: AtomicBool,
    loaded: OnceCell<Option<CommandResult>>,
    arguments: OnceCell<HashMap<String, ArgumentValue>>,
    store: StdMutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl CommandContext {
    /// `matched` must hold at least one command.
    pub fn new(
        event: Arc<InvocationEvent>,
        matched: ChainMatch,
        source: ArgumentSource,
        services: Services,
    ) -> Self {
        Self {
            event,
            invocation: matched.invocation,
            chain: matched.chain,
            services,
            source,
            initializing: AtomicBool::new(false),
            bound: OnceCell::new(),
            reply: RwLock::new(None),
            loading: AtomicBool::new(false),
            loaded: OnceCell::new(),
            arguments: OnceCell::new(),
            store: StdMutex::new(HashMap::new()),
        }
    }

    pub fn event(&self) -> &InvocationEvent {
        &self.event
    }

    pub fn caller(&self) -> &User {
        &self.event.caller
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.event.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.event.channel_id
    }

    /// The canonical invocation of the matched command.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn chain(&self) -> &[Arc<Command>] {
        &self.chain
    }

    pub fn command(&self) -> Option<&Arc<Command>> {
        self.chain.last()
    }

    pub fn resolver(&self) -> &Arc<dyn EntityResolver> {
        &self.services.resolver
    }

    pub fn access_scope(&self) -> AccessScope {
        AccessScope {
            guild_id: self.event.guild_id,
            channel_id: self.event.channel_id,
            caller: self.event.caller.clone(),
            resolver: self.services.resolver.clone(),
        }
    }

    pub fn init_state(&self) -> InitState {
        if self.bound.initialized() {
            InitState::Initialized
        } else if self.initializing.load(Ordering::Acquire) {
            InitState::Initializing
        } else {
            InitState::Uninitialized
        }
    }

    pub fn load_state(&self) -> LoadState {
        if self.loaded.initialized() {
            LoadState::Loaded
        } else if self.loading.load(Ordering::Acquire) {
            LoadState::Loading
        } else {
            LoadState::NotLoaded
        }
    }

    /// Builds the reply manager and the access validator.
    pub async fn initialize(&self) {
        self.bound
            .get_or_init(|| async {
                self.initializing.store(true, Ordering::Release);
                let validator = self.services.access.validator(self.access_scope());
                let manager = ReplyManager::new(
                    self.services.transport.clone(),
                    self.event.channel_id,
                    self.event.caller.user_id,
                    self.event.message_id(),
                );
                *self.reply.write().await = Some(Arc::new(manager));
                debug!(
                    event_id = %self.event.event_id,
                    invocation = %self.invocation,
                    "context initialized"
                );
                Bound { validator }
            })
            .await;
    }

    /// Parses and binds arguments once.
    ///
    /// `Ok(None)` means the arguments are ready; `Ok(Some(result))` is the
    /// terminal result that must end the invocation.
    pub async fn load(&self) -> Result<Option<CommandResult>, ContextError> {
        if !self.bound.initialized() {
            return Err(ContextError::NotInitialized);
        }
        let outcome = self
            .loaded
            .get_or_init(|| async {
                self.loading.store(true, Ordering::Release);
                self.parse_and_bind().await
            })
            .await;
        Ok(outcome.clone())
    }

    // Works on a copy of the source so that a cancelled load can be retried.
    async fn parse_and_bind(&self) -> Option<CommandResult> {
        let Some(command) = self.chain.last() else {
            return Some(CommandResult::error("no command to bind arguments for"));
        };

        let raw = match parse::assign(&command.parameters, self.source.clone()) {
            Ok(raw) => raw,
            Err(failure) => return Some(CommandResult::Failure(failure)),
        };
        let scope = ParseScope {
            guild_id: self.event.guild_id,
            channel_id: self.event.channel_id,
            resolver: self.services.resolver.clone(),
        };
        match parse::parse_arguments(&command.parameters, raw, &scope).await {
            Ok(values) => {
                // Only this one-shot load ever sets the map.
                let _ = self.arguments.set(values);
                None
            }
            Err(result) => Some(result),
        }
    }

    pub fn argument_value(&self, name: &str) -> Option<&ArgumentValue> {
        self.arguments.get()?.get(name)
    }

    /// The parsed argument `name` as `T`; `None` when absent or of another type.
    pub fn argument<T: FromArgument>(&self, name: &str) -> Option<T> {
        self.argument_value(name).and_then(T::from_argument)
    }

    /// Stores `value` under `key`. Returns `false` and leaves the store alone
    /// when the key exists and `replace` is not set.
    pub fn set_context<V: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: V,
        replace: bool,
    ) -> bool {
        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = key.into();
        if !replace && store.contains_key(&key) {
            return false;
        }
        store.insert(key, Arc::new(value));
        true
    }

    pub fn context<V: Any + Send + Sync + Clone>(&self, key: &str) -> Option<V> {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        store.get(key)?.downcast_ref::<V>().cloned()
    }

    pub async fn reply_manager(&self) -> Result<Arc<ReplyManager>, ContextError> {
        self.reply
            .read()
            .await
            .clone()
            .ok_or(ContextError::NotInitialized)
    }

    /// Swaps in `manager`, returning the one it replaced.
    pub async fn replace_reply_manager(
        &self,
        manager: ReplyManager,
    ) -> Result<Arc<ReplyManager>, ContextError> {
        let mut slot = self.reply.write().await;
        let previous = slot.take().ok_or(ContextError::NotInitialized)?;
        *slot = Some(Arc::new(manager));
        Ok(previous)
    }

    /// Appends a reply to this invocation's chain.
    pub async fn reply(&self, spec: ReplySpec) -> Result<SentReply> {
        self.reply_manager().await?.add(spec).await
    }

    pub fn access_validator(&self) -> Result<Arc<dyn AccessValidator>, ContextError> {
        self.bound
            .get()
            .map(|bound| bound.validator.clone())
            .ok_or(ContextError::NotInitialized)
    }

    pub async fn has_access(&self, group: &Group) -> Result<bool> {
        self.access_validator()?.has_access(group).await
    }
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
