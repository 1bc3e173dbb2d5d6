//! # linebot framework
//!
//! Handler registration and dispatch for the linebot SDK.
//!
//! This layer provides:
//! - Axum-style [`Handler`]s over an [`EventContext`]
//! - The [`Dispatcher`]: per-kind registries, concurrent isolated fan-out,
//!   queued reply flushing and postback correlation
//! - [`CommandGroup`]s: prefix commands with typed arguments and rules
//! - Action builders whose postbacks route back to one-shot handlers
//! - The [`Pipeline`] that turns webhook payloads into dispatched events

pub mod action;
pub mod command;
pub mod context;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pipeline;

pub use action::{
    DatetimePickerAction, InputOption, PickerMode, PostbackAction, RichMenuSwitchAction,
};
pub use command::{ArgType, ArgValue, Args, Command, CommandGroup, CommandOutcome, Rule};
pub use context::EventContext;
pub use correlation::Correlation;
pub use dispatcher::{
    DEFAULT_HANDLER_TIMEOUT, DispatchReport, Dispatcher, ErrorHook, HandlerFailure,
    HandlerOptions,
};
pub use error::{CommandError, CommandResult, HandlerError, RegistryError, RegistryResult};
pub use handler::{
    BoxFuture, BoxedHandler, BoxedReadyHandler, ErasedHandler, Handler, HandlerFn,
    HandlerResult, into_handler, into_ready_handler,
};
pub use pipeline::Pipeline;
