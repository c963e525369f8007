//! Per-event processing and the long-lived, retrying subscription around it.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use futures::{stream::BoxStream, StreamExt};
use shared::{
    error::SourceError,
    protocol::{InvocationEvent, InvocationPayload},
};
use tokio::{
    sync::{watch, Mutex},
    task::{JoinError, JoinHandle, JoinSet},
};
use tracing::{debug, error, info, warn};

use crate::{
    command::{self, Registry, Scope},
    context::{CommandContext, Services},
    error::PipelineError,
    handler::{self, Dispatch, Dispatcher},
    invocation::{self, AliasTable, ChainMatch, TokenStream},
    metrics::{NoopObserver, Observer, Stage, Tags},
    parse::ArgumentSource,
    result::CommandResult,
    settings::{ExecutorSettings, MatchViolationPolicy},
    validate,
};

/// Supplies inbound events.
pub trait EventSource: Send + Sync {
    /// Opens a fresh subscription. Called again after a transient failure.
    fn subscribe(&self) -> BoxStream<'static, Result<InvocationEvent, SourceError>>;

    /// Whether the pipeline should look at `event` at all.
    fn interested(&self, event: &InvocationEvent) -> bool {
        !event.caller.bot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotCommand,
    MatchViolation,
    OutOfScope,
    NotCallable,
    InvalidChain,
}

/// How one event ended.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Handled {
        result: CommandResult,
        dispatch: Dispatch,
    },
}

pub struct Pipeline {
    registry: Arc<dyn Registry>,
    services: Services,
    settings: Arc<ExecutorSettings>,
    aliases: AliasTable,
    dispatcher: Dispatcher,
    observer: Arc<dyn Observer>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<dyn Registry>,
        services: Services,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            registry,
            services,
            aliases: settings.alias_table(),
            settings: Arc::new(settings),
            dispatcher: Dispatcher::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Runs one event through every stage.
    ///
    /// Only a match violation under [`MatchViolationPolicy::HaltPipeline`]
    /// returns an error; every other problem becomes an outcome.
    pub async fn process(&self, event: InvocationEvent) -> Result<EventOutcome, PipelineError> {
        let started = Instant::now();
        let tags = Tags {
            style: Some(event.style()),
            guild_id: event.guild_id,
            channel_id: Some(event.channel_id),
            caller: Some(event.caller.user_id),
            ..Tags::default()
        };

        let outcome = self.process_inner(event, &tags).await;
        let outcome_tag = match &outcome {
            Ok(EventOutcome::Handled { result, .. }) => result.outcome(),
            Ok(EventOutcome::Ignored(_)) => "ignored",
            Err(_) => "fatal",
        };
        self.observer
            .record(Stage::Event, &tags.with_outcome(outcome_tag), started.elapsed());
        outcome
    }

    async fn process_inner(
        &self,
        event: InvocationEvent,
        tags: &Tags,
    ) -> Result<EventOutcome, PipelineError> {
        let parse_started = Instant::now();
        let (matched, source) = match self.parse_event(&event)? {
            Ok(parsed) => parsed,
            Err(reason) => {
                self.observer
                    .record(Stage::Parse, &tags.with_outcome("ignored"), parse_started.elapsed());
                return Ok(EventOutcome::Ignored(reason));
            }
        };
        let Some(invoked) = matched.command().cloned() else {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotCommand));
        };
        let tags = tags.with_command(invoked.id.clone());
        self.observer
            .record(Stage::Parse, &tags.with_outcome("matched"), parse_started.elapsed());

        if invoked.scope == Scope::Guild && event.guild_id.is_none() {
            debug!(command = %invoked.id, "guild command invoked outside a guild");
            return Ok(EventOutcome::Ignored(IgnoreReason::OutOfScope));
        }
        if !invoked.settings.callable {
            debug!(command = %invoked.id, "command is not callable on its own");
            return Ok(EventOutcome::Ignored(IgnoreReason::NotCallable));
        }
        if let Err(err) = command::check_normalized(&matched.chain) {
            error!(command = %invoked.id, error = %err, "matched chain is inconsistent");
            return Ok(EventOutcome::Ignored(IgnoreReason::InvalidChain));
        }

        let event_id = event.event_id;
        let context = CommandContext::new(Arc::new(event), matched, source, self.services.clone());
        context.initialize().await;

        let execute_started = Instant::now();
        let result = match command::handling_order(context.chain()) {
            Ok(order) => self.execute(&context, &order, &tags).await,
            Err(err) => {
                error!(command = %invoked.id, error = %err, "command chain is misconfigured");
                CommandResult::exception(err.into())
            }
        };
        self.observer.record(
            Stage::Execute,
            &tags.with_outcome(result.outcome()),
            execute_started.elapsed(),
        );

        let result_started = Instant::now();
        // Only the invoked command's result handlers apply, even when
        // ancestor invocation handlers ran.
        let dispatch = self
            .dispatcher
            .dispatch(&context, &invoked.result_handlers, &result)
            .await;
        self.observer.record(
            Stage::Result,
            &tags.with_outcome(result.outcome()),
            result_started.elapsed(),
        );

        info!(
            %event_id,
            command = %invoked.id,
            outcome = result.outcome(),
            ?dispatch,
            "command finished"
        );
        Ok(EventOutcome::Handled { result, dispatch })
    }

    async fn execute(
        &self,
        context: &CommandContext,
        order: &[Arc<command::Command>],
        tags: &Tags,
    ) -> CommandResult {
        let started = Instant::now();
        let denied = validate::validate(context).await;
        let outcome = denied.as_ref().map_or("passed", CommandResult::outcome);
        self.observer
            .record(Stage::Validate, &tags.with_outcome(outcome), started.elapsed());
        if let Some(result) = denied {
            return result;
        }

        let started = Instant::now();
        let loaded = context.load().await;
        let outcome = match &loaded {
            Ok(None) => "loaded",
            Ok(Some(result)) => result.outcome(),
            Err(_) => "error",
        };
        self.observer
            .record(Stage::Load, &tags.with_outcome(outcome), started.elapsed());
        match loaded {
            Ok(None) => {}
            Ok(Some(result)) => return result,
            Err(err) => return CommandResult::exception(err.into()),
        }

        let started = Instant::now();
        let result = handler::invoke_chain(context, order, self.observer.as_ref(), tags).await;
        self.observer
            .record(Stage::Invoke, &tags.with_outcome(result.outcome()), started.elapsed());
        result
    }

    /// Tokenizes the event and matches its command chain.
    fn parse_event(
        &self,
        event: &InvocationEvent,
    ) -> Result<Result<(ChainMatch, ArgumentSource), IgnoreReason>, PipelineError> {
        let style = event.style();
        let mut tokens = match &event.payload {
            InvocationPayload::Text { content, .. } => {
                let prefix = self.settings.prefix_for(event.guild_id);
                let Some(body) = content.strip_prefix(prefix) else {
                    return Ok(Err(IgnoreReason::NotCommand));
                };
                TokenStream::from_text(body)
            }
            InvocationPayload::Slash { path, .. } => TokenStream::from_tokens(path.iter().cloned()),
        };

        if let Some(alias) = self.aliases.apply(&mut tokens) {
            debug!(%alias, "alias applied");
        }
        let matched = invocation::match_chain(self.registry.as_ref(), style, &mut tokens);
        let Some(invoked) = matched.command() else {
            return Ok(Err(IgnoreReason::NotCommand));
        };

        if self.settings.requires_full_match(style) && tokens.has_remaining() {
            let leftover = tokens.remainder();
            let violation = PipelineError::MatchViolation {
                command: invoked.id.clone(),
                leftover,
            };
            return match self.settings.on_match_violation {
                MatchViolationPolicy::DropEvent => {
                    error!(error = %violation, "command registered but not implemented");
                    Ok(Err(IgnoreReason::MatchViolation))
                }
                MatchViolationPolicy::HaltPipeline => Err(violation),
            };
        }

        let source = match &event.payload {
            InvocationPayload::Text { attachments, .. } => ArgumentSource::Text {
                tokens,
                attachments: attachments.clone(),
            },
            InvocationPayload::Slash {
                options,
                attachments,
                ..
            } => ArgumentSource::Slash {
                options: options.clone(),
                attachments: attachments.clone(),
            },
        };
        Ok(Ok((matched, source)))
    }

    /// Consumes `source` until it ends, `shutdown` fires, or a fatal error.
    ///
    /// Transient stream failures resubscribe with exponential backoff; the
    /// attempt counter resets once a resubscribed stream yields an event.
    /// Events still in flight when the stream ends are awaited; on shutdown
    /// they are left to finish on their own.
    pub async fn run(
        self: Arc<Self>,
        source: Arc<dyn EventSource>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        let retry = self.settings.retry.clone();
        let mut attempts = 0u32;
        let mut backoff = retry.min_backoff();
        let mut in_flight = JoinSet::new();

        loop {
            let mut stream = source.subscribe();
            let failure = loop {
                tokio::select! {
                    Ok(()) = shutdown.changed() => {
                        info!("command pipeline stopping");
                        in_flight.detach_all();
                        return Ok(());
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        settle(joined)?;
                    }
                    next = stream.next() => match next {
                        Some(Ok(event)) => {
                            attempts = 0;
                            backoff = retry.min_backoff();
                            if source.interested(&event) {
                                in_flight.spawn(process_event(self.clone(), event));
                            }
                        }
                        Some(Err(err)) => break err,
                        None => {
                            info!(in_flight = in_flight.len(), "event stream ended");
                            while let Some(joined) = in_flight.join_next().await {
                                settle(joined)?;
                            }
                            return Ok(());
                        }
                    }
                }
            };

            if !failure.is_transient() {
                error!(error = %failure, "event stream failed");
                return Err(PipelineError::Source(failure));
            }
            attempts += 1;
            if attempts > retry.max_attempts {
                error!(error = %failure, attempts, "event stream retries exhausted");
                return Err(PipelineError::RetriesExhausted {
                    attempts,
                    last: failure,
                });
            }

            warn!(
                error = %failure,
                attempt = attempts,
                backoff_secs = backoff.as_secs(),
                "event stream failed; resubscribing"
            );
            let pause = tokio::time::sleep(backoff);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    Ok(()) = shutdown.changed() => {
                        in_flight.detach_all();
                        return Ok(());
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        settle(joined)?;
                    }
                    _ = &mut pause => break,
                }
            }
            backoff = (backoff * 2).min(retry.max_backoff());
        }
    }
}

async fn process_event(
    pipeline: Arc<Pipeline>,
    event: InvocationEvent,
) -> Result<(), PipelineError> {
    let event_id = event.event_id;
    pipeline.process(event).await.map(|_| ()).map_err(|err| {
        error!(%event_id, error = %err, "fatal pipeline error");
        err
    })
}

/// Surfaces fatal errors from a finished event task. Panics are logged only.
fn settle(joined: Result<Result<(), PipelineError>, JoinError>) -> Result<(), PipelineError> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => {
            error!(error = %err, "event processing panicked");
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

struct Running {
    generation: u64,
    shutdown: watch::Sender<bool>,
    /// Flips to `true` once `run` returns; dropped with the task on abort.
    finished: watch::Receiver<bool>,
    task: JoinHandle<Result<(), PipelineError>>,
}

/// Starts and stops one pipeline subscription.
pub struct CommandExecutor {
    pipeline: Arc<Pipeline>,
    source: Arc<dyn EventSource>,
    running: Mutex<Option<Running>>,
    generations: AtomicU64,
}

impl CommandExecutor {
    pub fn new(pipeline: Pipeline, source: Arc<dyn EventSource>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            source,
            running: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Subscribes to the event source. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|run| !run.task.is_finished()) {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished) = watch::channel(false);
        let pipeline = self.pipeline.clone();
        let source = self.source.clone();
        let task = tokio::spawn(async move {
            let result = pipeline.run(source, shutdown_rx).await;
            let _ = finished_tx.send(true);
            result
        });
        *running = Some(Running {
            generation: self.generations.fetch_add(1, Ordering::SeqCst),
            shutdown,
            finished,
            task,
        });
        info!("command executor started");
        true
    }

    /// Cancels the live subscription. Returns `false` if not running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(run) = running.take() else {
            return false;
        };
        if run.task.is_finished() {
            return false;
        }
        let _ = run.shutdown.send(true);
        run.task.abort();
        info!("command executor stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    /// Waits for the current subscription to end. Returns `Ok(())` when it
    /// is stopped instead of finishing on its own.
    ///
    /// The executor stays unlocked while waiting, so [`stop`](Self::stop)
    /// and [`start`](Self::start) remain usable from other tasks.
    pub async fn wait(&self) -> Result<(), PipelineError> {
        let (generation, mut finished) = {
            let running = self.running.lock().await;
            let Some(run) = running.as_ref() else {
                return Ok(());
            };
            (run.generation, run.finished.clone())
        };
        // An aborted task drops the sender, which ends the wait as well.
        let _ = finished.wait_for(|done| *done).await;

        let run = {
            let mut running = self.running.lock().await;
            if running.as_ref().map(|run| run.generation) != Some(generation) {
                return Ok(());
            }
            match running.take() {
                Some(run) => run,
                None => return Ok(()),
            }
        };
        match run.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => {
                error!(error = %err, "command pipeline task failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
