//! Event dispatcher for the linebot framework.
//!
//! The [`Dispatcher`] keeps an ordered list of handlers per [`EventKind`].
//! When an event is dispatched:
//!
//! 1. The registry is sealed; later registrations fail
//! 2. A one-shot handler waiting on the postback token runs first
//! 3. Every handler of the kind runs concurrently, each isolated from the
//!    others' errors, panics and timeouts
//! 4. The queued replies are flushed in one call
//! 5. The postback token's action data is cleared
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(MemoryStore::shared());
//! dispatcher.on(EventKind::Text, |ctx: EventContext| async move {
//!     ctx.reply(ctx.text().unwrap_or_default()).await?;
//!     anyhow::Ok(())
//! })?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{Instrument, Level, debug, error, span, warn};

use linebot_core::{BoxedStore, Event, EventKind, ReplyError};

use crate::command::CommandGroup;
use crate::context::EventContext;
use crate::correlation::Correlation;
use crate::error::{HandlerError, RegistryError, RegistryResult};
use crate::handler::{
    BoxFuture, BoxedHandler, BoxedReadyHandler, Handler, HandlerResult, into_handler,
    into_ready_handler,
};

/// Default bound on one handler's run time.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Options attached to a handler at registration.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Collect replies into the event's send queue instead of sending.
    pub queued: bool,
    /// Name used in logs and failure reports.
    pub name: Option<String>,
}

impl HandlerOptions {
    /// Options with queued sending on.
    pub fn queued() -> Self {
        Self {
            queued: true,
            name: None,
        }
    }

    /// Sets the handler name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Clone)]
struct HandlerEntry {
    options: HandlerOptions,
    handler: BoxedHandler,
}

impl HandlerEntry {
    fn label(&self, kind: EventKind, index: usize) -> String {
        self.options
            .name
            .clone()
            .unwrap_or_else(|| format!("{kind}#{index}"))
    }
}

/// One failed handler unit.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Handler name, or `<kind>#<index>` when unnamed.
    pub handler: String,
    /// What went wrong.
    pub error: HandlerError,
}

/// Outcome of dispatching one event.
#[derive(Debug)]
pub struct DispatchReport {
    /// Dispatch kind.
    pub kind: EventKind,
    /// Handler units run, including a one-shot handler.
    pub handlers_run: usize,
    /// Whether a one-shot handler ran.
    pub one_shot: bool,
    /// Messages flushed from the send queue.
    pub flushed: usize,
    /// Failed units.
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            handlers_run: 0,
            one_shot: false,
            flushed: 0,
            failures: Vec::new(),
        }
    }

    /// Whether every unit succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Receives handler failures instead of the default error log.
///
/// `None` as event means a ready handler failed.
pub type ErrorHook = Arc<dyn Fn(&HandlerFailure, Option<&Event>) + Send + Sync>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Registry of handlers per event kind and the fan-out that runs them.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc`.
pub struct Dispatcher {
    handlers: RwLock<HashMap<EventKind, Vec<HandlerEntry>>>,
    ready: RwLock<Vec<BoxedReadyHandler>>,
    error_hook: RwLock<Option<ErrorHook>>,
    correlation: Arc<Correlation>,
    handler_timeout: Option<Duration>,
    sealed: AtomicBool,
    ready_fired: AtomicBool,
}

impl Dispatcher {
    /// Creates a dispatcher whose correlation state lives in `store`.
    pub fn new(store: BoxedStore) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            ready: RwLock::new(Vec::new()),
            error_hook: RwLock::new(None),
            correlation: Arc::new(Correlation::new(store)),
            handler_timeout: Some(DEFAULT_HANDLER_TIMEOUT),
            sealed: AtomicBool::new(false),
            ready_fired: AtomicBool::new(false),
        }
    }

    /// Sets the per-handler timeout; `None` disables it.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// The per-handler timeout.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout
    }

    /// The correlation registry.
    pub fn correlation(&self) -> &Arc<Correlation> {
        &self.correlation
    }

    // ─── Registration ───────────────────────────────────────────────────────

    fn ensure_open(&self) -> RegistryResult<()> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(RegistryError::Sealed);
        }
        Ok(())
    }

    /// Registers a handler for `kind`.
    pub fn on<H, T>(&self, kind: EventKind, handler: H) -> RegistryResult<()>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on_with(kind, HandlerOptions::default(), handler)
    }

    /// Registers a handler for `kind` with options.
    pub fn on_with<H, T>(
        &self,
        kind: EventKind,
        options: HandlerOptions,
        handler: H,
    ) -> RegistryResult<()>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add(kind, options, into_handler(handler))
    }

    /// Registers an already boxed handler.
    pub fn add(
        &self,
        kind: EventKind,
        options: HandlerOptions,
        handler: BoxedHandler,
    ) -> RegistryResult<()> {
        if kind == EventKind::Ready {
            return Err(RegistryError::ReadyHasNoEvent);
        }
        self.ensure_open()?;
        debug!(%kind, name = options.name.as_deref(), "Registered handler");
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(HandlerEntry { options, handler });
        Ok(())
    }

    /// Registers a handler fired once when serving starts.
    pub fn on_ready<F, Fut>(&self, handler: F) -> RegistryResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.ensure_open()?;
        self.ready.write().push(into_ready_handler(handler));
        Ok(())
    }

    /// Routes text events through a command group.
    pub fn add_commands(&self, group: CommandGroup) -> RegistryResult<()> {
        let name = format!("commands:{}", group.name());
        let group = Arc::new(group);
        self.on_with(
            EventKind::Text,
            HandlerOptions::default().named(name),
            move |ctx: EventContext| {
                let group = Arc::clone(&group);
                async move {
                    group.route(&ctx).await?;
                    anyhow::Ok(())
                }
            },
        )
    }

    /// Installs the failure hook.
    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&HandlerFailure, Option<&Event>) + Send + Sync + 'static,
    {
        *self.error_hook.write() = Some(Arc::new(hook));
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        if kind == EventKind::Ready {
            return self.ready.read().len();
        }
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Seals the registry.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::SeqCst) {
            debug!("Handler registry sealed");
        }
    }

    /// Whether the registry is sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    // ─── Dispatch ───────────────────────────────────────────────────────────

    fn report_failure(&self, failure: &HandlerFailure, event: Option<&Event>) {
        let hook = self.error_hook.read().clone();
        match hook {
            Some(hook) => hook(failure, event),
            None => error!(
                handler = %failure.handler,
                kind = event.map(|e| e.kind().as_str()).unwrap_or("ready"),
                error = %failure.error,
                "Handler failed"
            ),
        }
    }

    async fn run_unit(
        &self,
        label: String,
        future: BoxFuture<'static, HandlerResult>,
    ) -> Result<(), HandlerFailure> {
        let guarded = AssertUnwindSafe(future).catch_unwind();
        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(HandlerFailure {
                        handler: label,
                        error: HandlerError::TimedOut(limit),
                    });
                }
            },
            None => guarded.await,
        };

        let error = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => HandlerError::Failed(err),
            Err(payload) => HandlerError::Panicked(panic_message(payload)),
        };
        Err(HandlerFailure {
            handler: label,
            error,
        })
    }

    /// Dispatches one event to its handlers and waits for all of them.
    pub async fn dispatch(&self, event: Arc<Event>) -> DispatchReport {
        self.seal();

        let kind = event.kind();
        let span = span!(Level::DEBUG, "dispatch", %kind, event_id = %event.webhook_event_id());
        self.dispatch_inner(event).instrument(span).await
    }

    async fn dispatch_inner(&self, event: Arc<Event>) -> DispatchReport {
        let kind = event.kind();
        let mut report = DispatchReport::new(kind);
        let token = kind
            .is_postback()
            .then(|| event.postback_data().map(str::to_string))
            .flatten();

        if let Some(handler) = token
            .as_deref()
            .and_then(|t| self.correlation.take_handler(t))
        {
            debug!("Running one-shot action handler");
            let ctx = EventContext::new(Arc::clone(&event), Arc::clone(&self.correlation), false);
            report.one_shot = true;
            report.handlers_run += 1;
            if let Err(failure) = self.run_unit("action".to_string(), handler.call(ctx)).await {
                self.report_failure(&failure, Some(&event));
                report.failures.push(failure);
            }
        }

        let entries = self.handlers.read().get(&kind).cloned().unwrap_or_default();
        if entries.is_empty() {
            debug!("No handlers registered");
        }

        let units = entries.iter().enumerate().map(|(index, entry)| {
            let ctx = EventContext::new(
                Arc::clone(&event),
                Arc::clone(&self.correlation),
                entry.options.queued,
            );
            self.run_unit(entry.label(kind, index), entry.handler.call(ctx))
        });
        let results = join_all(units).await;
        report.handlers_run += results.len();

        for failure in results.into_iter().filter_map(Result::err) {
            self.report_failure(&failure, Some(&event));
            report.failures.push(failure);
        }

        match event.flush_queue().await {
            Ok(flushed) => report.flushed = flushed,
            Err(ReplyError::AlreadyReplied) => {}
            Err(err) => warn!(error = %err, "Failed to flush queued replies"),
        }

        if let Some(token) = token {
            self.correlation.consume(&token);
        }

        debug!(
            handlers = report.handlers_run,
            failures = report.failures.len(),
            "Dispatch complete"
        );
        report
    }

    /// Fires the ready handlers. Only the first call does anything.
    ///
    /// Returns whether this call fired them.
    pub async fn dispatch_ready(&self) -> bool {
        if self.ready_fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.seal();

        let handlers = self.ready.read().clone();
        debug!(count = handlers.len(), "Firing ready handlers");
        let units = handlers
            .iter()
            .enumerate()
            .map(|(index, handler)| self.run_unit(format!("ready#{index}"), handler()));
        for failure in join_all(units).await.into_iter().filter_map(Result::err) {
            self.report_failure(&failure, None);
        }
        true
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("Dispatcher")
            .field("kinds", &handlers.len())
            .field("handlers", &handlers.values().map(Vec::len).sum::<usize>())
            .field("sealed", &self.is_sealed())
            .field("handler_timeout", &self.handler_timeout)
            .finish_non_exhaustive()
    }
}
