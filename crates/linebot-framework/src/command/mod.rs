//! Prefix commands on top of text events.
//!
//! A [`CommandGroup`] owns a prefix and a table of [`Command`]s. Registered on
//! a dispatcher it becomes one text handler that, per message:
//!
//! 1. Ignores text that does not start with the prefix
//! 2. Looks the first token up in the table (exact match)
//! 3. Evaluates the command's [`Rule`] against the author
//! 4. Binds the remaining tokens to the parameter schema
//! 5. Runs the body
//!
//! # Example
//!
//! ```rust,ignore
//! use linebot_framework::command::{ArgType, Command, CommandGroup, Rule};
//!
//! let group = CommandGroup::new("!").command(
//!     Command::new("drink")
//!         .param("times", ArgType::Int)
//!         .rest("reason")
//!         .rule(Rule::cooldown(10))
//!         .handler(|ctx, args| async move {
//!             let times = args.int("times").unwrap_or(1);
//!             ctx.reply(format!("drinking {times} times")).await?;
//!             anyhow::Ok(())
//!         }),
//! );
//! dispatcher.add_commands(group)?;
//! ```

mod args;
mod rule;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

pub use args::{ArgType, ArgValue, Args, Param, bind};
pub use rule::{Clock, ManualClock, Rule, RulePredicate, SystemClock};

use crate::context::EventContext;
use crate::error::{CommandError, CommandResult};
use crate::handler::{BoxFuture, HandlerResult};

/// Body of a command.
pub type CommandFn =
    Arc<dyn Fn(EventContext, Args) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Receives argument and body errors; returning `Err` propagates.
pub type CommandErrorFn =
    Arc<dyn Fn(EventContext, CommandError) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Runs when a rule rejects an invocation.
pub type RejectFn = Arc<dyn Fn(EventContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Runs when the prefix matched but no command did. Gets the unknown name.
pub type NotFoundFn =
    Arc<dyn Fn(EventContext, String) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// What routing one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The text does not start with the prefix.
    NotACommand,
    /// No command has that name.
    NotFound(String),
    /// The rule rejected the invocation.
    Rejected(String),
    /// Binding failed and the error handler absorbed it.
    ArgumentError(String),
    /// The body ran.
    Invoked(String),
}

// ============================================================================
// Command
// ============================================================================

/// One command: name, parameter schema, rule and callbacks.
pub struct Command {
    name: String,
    description: Option<String>,
    params: Vec<Param>,
    rule: Rule,
    on_error: Option<CommandErrorFn>,
    on_reject: Option<RejectFn>,
    body: Option<CommandFn>,
}

impl Command {
    /// Creates a command matched by `name` after the prefix.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
            rule: Rule::default(),
            on_error: None,
            on_reject: None,
            body: None,
        }
    }

    /// Command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The parameter schema.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn push_param(mut self, param: Param) -> Self {
        debug_assert!(
            self.params.last().is_none_or(|p| !p.rest),
            "the rest parameter must be the last one"
        );
        self.params.push(param);
        self
    }

    /// A required positional parameter.
    pub fn param(self, name: impl Into<String>, ty: ArgType) -> Self {
        self.push_param(Param {
            name: name.into(),
            ty,
            default: None,
            rest: false,
        })
    }

    /// A positional parameter with a default.
    pub fn param_or(
        self,
        name: impl Into<String>,
        ty: ArgType,
        default: impl Into<ArgValue>,
    ) -> Self {
        self.push_param(Param {
            name: name.into(),
            ty,
            default: Some(default.into()),
            rest: false,
        })
    }

    /// A required trailing parameter taking the rest of the line.
    pub fn rest(self, name: impl Into<String>) -> Self {
        self.push_param(Param {
            name: name.into(),
            ty: ArgType::Str,
            default: None,
            rest: true,
        })
    }

    /// A trailing rest parameter with a default.
    pub fn rest_or(self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.push_param(Param {
            name: name.into(),
            ty: ArgType::Str,
            default: Some(ArgValue::Str(default.into())),
            rest: true,
        })
    }

    /// Gates the command.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    /// Handles argument and body errors. Without it they propagate.
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventContext, CommandError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |ctx, err| {
            Box::pin(f(ctx, err)) as BoxFuture<'static, HandlerResult>
        }));
        self
    }

    /// Runs when the rule rejects. Without it rejections are silent.
    pub fn on_reject<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on_reject = Some(Arc::new(move |ctx| {
            Box::pin(f(ctx)) as BoxFuture<'static, HandlerResult>
        }));
        self
    }

    /// The command body.
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.body = Some(Arc::new(move |ctx, args| {
            Box::pin(f(ctx, args)) as BoxFuture<'static, HandlerResult>
        }));
        self
    }

    async fn fail(&self, ctx: EventContext, error: CommandError) -> CommandResult<()> {
        match &self.on_error {
            Some(on_error) => on_error(ctx, error).await.map_err(CommandError::Handler),
            None => Err(error),
        }
    }

    async fn invoke(
        &self,
        ctx: &EventContext,
        tokens: &[&str],
        clock: &dyn Clock,
    ) -> CommandResult<CommandOutcome> {
        if !self.rule.check(ctx, clock) {
            debug!(command = %self.name, rule = self.rule.name(), "Command rejected by rule");
            if let Some(on_reject) = &self.on_reject {
                on_reject(ctx.clone()).await.map_err(CommandError::Handler)?;
            }
            return Ok(CommandOutcome::Rejected(self.name.clone()));
        }

        let args = match bind(&self.params, tokens) {
            Ok(args) => args,
            Err(err) => {
                debug!(command = %self.name, error = %err, "Command argument error");
                self.fail(ctx.clone(), err).await?;
                return Ok(CommandOutcome::ArgumentError(self.name.clone()));
            }
        };

        if let Some(body) = &self.body {
            if let Err(err) = body(ctx.clone(), args).await {
                self.fail(ctx.clone(), CommandError::Handler(err)).await?;
            }
        }
        Ok(CommandOutcome::Invoked(self.name.clone()))
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CommandGroup
// ============================================================================

/// A prefix and its command table.
pub struct CommandGroup {
    name: String,
    prefix: String,
    commands: HashMap<String, Command>,
    not_found: Option<NotFoundFn>,
    show_not_found_log: bool,
    clock: Arc<dyn Clock>,
}

impl CommandGroup {
    /// Creates an empty group for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            name: "commands".to_string(),
            prefix: prefix.into(),
            commands: HashMap::new(),
            not_found: None,
            show_not_found_log: false,
            clock: Arc::new(SystemClock),
        }
    }

    /// Names the group in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Adds a command, replacing one with the same name.
    pub fn command(mut self, command: Command) -> Self {
        self.commands.insert(command.name.clone(), command);
        self
    }

    /// Looks a command up by name.
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Runs `f` for prefixed messages naming no known command.
    pub fn on_not_found<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EventContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.not_found = Some(Arc::new(move |ctx, name| {
            Box::pin(f(ctx, name)) as BoxFuture<'static, HandlerResult>
        }));
        self
    }

    /// Logs unknown commands at info level.
    pub fn show_not_found_log(mut self, show: bool) -> Self {
        self.show_not_found_log = show;
        self
    }

    /// Replaces the clock used by time-based rules.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Routes one text event.
    pub async fn route(&self, ctx: &EventContext) -> CommandResult<CommandOutcome> {
        let Some(text) = ctx.text() else {
            return Ok(CommandOutcome::NotACommand);
        };
        let Some(body) = text.trim().strip_prefix(self.prefix.as_str()) else {
            return Ok(CommandOutcome::NotACommand);
        };

        let mut tokens = body.split(' ');
        let name = tokens.next().unwrap_or_default();
        let tokens: Vec<&str> = tokens.collect();

        let Some(command) = self.commands.get(name) else {
            if self.show_not_found_log {
                info!(group = %self.name, command = name, "Command not found");
            } else {
                debug!(group = %self.name, command = name, "Command not found");
            }
            if let Some(not_found) = &self.not_found {
                not_found(ctx.clone(), name.to_string())
                    .await
                    .map_err(CommandError::Handler)?;
            }
            return Ok(CommandOutcome::NotFound(name.to_string()));
        };

        command.invoke(ctx, &tokens, self.clock.as_ref()).await
    }
}

impl std::fmt::Debug for CommandGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.commands.keys().collect();
        names.sort();
        f.debug_struct("CommandGroup")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("commands", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::correlation::Correlation;
    use linebot_core::testing::{MockApi, text_event};
    use linebot_core::{Event, MemoryStore, parse};

    fn ctx(text: &str, api: &Arc<MockApi>) -> EventContext {
        let store = MemoryStore::shared();
        let event = Event::new(parse(text_event(text, "U1")).unwrap(), api.clone(), store.clone());
        EventContext::new(Arc::new(event), Arc::new(Correlation::new(store)), false)
    }

    fn drink(seen: Arc<Mutex<Vec<(i64, String)>>>) -> Command {
        Command::new("drink")
            .param("times", ArgType::Int)
            .rest("reason")
            .handler(move |_ctx, args| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push((
                        args.int("times").unwrap_or_default(),
                        args.str("reason").unwrap_or_default().to_string(),
                    ));
                    anyhow::Ok(())
                }
            })
    }

    #[tokio::test]
    async fn routes_typed_arguments() {
        let api = MockApi::shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let group = CommandGroup::new("!").command(drink(Arc::clone(&seen)));

        let outcome = group.route(&ctx("!drink 3 because thirsty", &api)).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Invoked("drink".into()));
        assert_eq!(*seen.lock(), [(3, "because thirsty".to_string())]);
    }

    #[tokio::test]
    async fn empty_rest_falls_back_to_its_default() {
        let api = MockApi::shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let group = CommandGroup::new("!").command(
            Command::new("drink")
                .param("times", ArgType::Int)
                .rest_or("reason", "no reason")
                .handler(move |_ctx, args| {
                    let sink = Arc::clone(&sink);
                    async move {
                        sink.lock().push((
                            args.int("times").unwrap_or_default(),
                            args.str("reason").unwrap_or_default().to_string(),
                        ));
                        anyhow::Ok(())
                    }
                }),
        );

        let outcome = group.route(&ctx("!drink 3", &api)).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Invoked("drink".into()));
        group.route(&ctx("!drink 2 long day", &api)).await.unwrap();
        assert_eq!(
            *seen.lock(),
            [(3, "no reason".to_string()), (2, "long day".to_string())]
        );
    }

    #[tokio::test]
    async fn arity_error_propagates_by_default() {
        let api = MockApi::shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let group = CommandGroup::new("!").command(drink(Arc::clone(&seen)));

        let err = group.route(&ctx("!drink", &api)).await.unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { name } if name == "times"));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn error_handler_absorbs_argument_errors() {
        let api = MockApi::shared();
        let group = CommandGroup::new("!").command(
            Command::new("drink")
                .param("times", ArgType::Int)
                .on_error(|ctx, err| async move {
                    ctx.reply(format!("usage: !drink <times> ({err})")).await?;
                    anyhow::Ok(())
                })
                .handler(|_, _| async { anyhow::Ok(()) }),
        );

        let outcome = group.route(&ctx("!drink lots", &api)).await.unwrap();
        assert_eq!(outcome, CommandOutcome::ArgumentError("drink".into()));
        let texts = api.replied_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("expected int"));
    }

    #[tokio::test]
    async fn unknown_commands_reach_the_not_found_hook() {
        let api = MockApi::shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let missing = Arc::new(Mutex::new(None));
        let hook = Arc::clone(&missing);
        let group = CommandGroup::new("!")
            .command(drink(Arc::clone(&seen)))
            .show_not_found_log(true)
            .on_not_found(move |_, name| {
                let hook = Arc::clone(&hook);
                async move {
                    *hook.lock() = Some(name);
                    anyhow::Ok(())
                }
            });

        let outcome = group.route(&ctx("!unknown 1", &api)).await.unwrap();
        assert_eq!(outcome, CommandOutcome::NotFound("unknown".into()));
        assert_eq!(missing.lock().as_deref(), Some("unknown"));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_not_a_command() {
        let api = MockApi::shared();
        let group = CommandGroup::new("!");
        assert_eq!(
            group.route(&ctx("hello there", &api)).await.unwrap(),
            CommandOutcome::NotACommand
        );
    }

    #[tokio::test]
    async fn rejected_invocations_run_the_reject_handler() {
        let api = MockApi::shared();
        let clock = Arc::new(ManualClock::new(0));
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let group = CommandGroup::new("!")
            .with_clock(clock.clone())
            .command(
                Command::new("ping")
                    .rule(Rule::cooldown(10))
                    .on_reject(|ctx| async move {
                        ctx.reply("slow down").await?;
                        anyhow::Ok(())
                    })
                    .handler(move |_, _| {
                        let counter = Arc::clone(&counter);
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            anyhow::Ok(())
                        }
                    }),
            );

        // one store shared across the three invocations
        let store = MemoryStore::shared();
        let make = |text: &str| {
            let event = Event::new(
                parse(text_event(text, "U1")).unwrap(),
                api.clone(),
                store.clone(),
            );
            EventContext::new(
                Arc::new(event),
                Arc::new(Correlation::new(store.clone())),
                false,
            )
        };

        assert!(matches!(
            group.route(&make("!ping")).await.unwrap(),
            CommandOutcome::Invoked(_)
        ));
        clock.advance(Duration::from_secs(2));
        assert!(matches!(
            group.route(&make("!ping")).await.unwrap(),
            CommandOutcome::Rejected(_)
        ));
        clock.advance(Duration::from_secs(9));
        assert!(matches!(
            group.route(&make("!ping")).await.unwrap(),
            CommandOutcome::Invoked(_)
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(api.replied_texts(), ["slow down"]);
    }

    #[tokio::test]
    async fn body_errors_go_through_the_error_handler() {
        let api = MockApi::shared();
        let caught = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&caught);
        let group = CommandGroup::new("/").command(
            Command::new("fail")
                .on_error(move |_, err| {
                    let counter = Arc::clone(&counter);
                    async move {
                        assert!(!err.is_argument_error());
                        counter.fetch_add(1, Ordering::SeqCst);
                        anyhow::Ok(())
                    }
                })
                .handler(|_, _| async { Err::<(), _>(anyhow::anyhow!("nope")) }),
        );

        let outcome = group.route(&ctx("/fail", &api)).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Invoked("fail".into()));
        assert_eq!(caught.load(Ordering::SeqCst), 1);
    }
}
