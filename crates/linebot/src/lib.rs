//! # linebot
//!
//! An async SDK for LINE Messaging API webhook bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────────────┐
//! │ WebhookServer │──▶│ Pipeline │──▶│ Dispatcher │──▶│ handler (own future) │──▶ reply
//! │  (signature)  │   │ (parse)  │   │  (per kind)│──▶│ handler (own future) │──▶ reply
//! └───────────────┘   └──────────┘   └────────────┘──▶│ CommandGroup         │──▶ reply
//!                                                     └──────────────────────┘
//! ```
//!
//! - **Transport**: axum webhook route with signature checks, reqwest REST client
//! - **Core**: event classification, the reply-once [`Event`](core::Event), messages
//! - **Framework**: handlers, dispatch, commands with rules, postback actions
//! - **Runtime**: configuration, logging and the [`LineClient`](runtime::LineClient)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linebot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LineClient::builder().build()?;
//!
//!     client.on(EventKind::Text, |ctx: EventContext| async move {
//!         if let Some(text) = ctx.text() {
//!             ctx.reply(text.to_string()).await?;
//!         }
//!         Ok(())
//!     })?;
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log lines
//! - `testing`: [`MockApi`](core::testing::MockApi) and event fixtures

pub use linebot_core as core;
pub use linebot_framework as framework;
pub use linebot_runtime as runtime;
pub use linebot_transport as transport;

/// Commonly used types for writing a bot.
///
/// ```rust,ignore
/// use linebot::prelude::*;
/// ```
pub mod prelude {
    // Entry point
    pub use linebot_runtime::{LineClient, LinebotConfig};

    // Events and replies
    pub use linebot_core::{
        Event, EventKind, IntoMessages, Message, PostbackVariant, Profile, Source,
    };

    // Handlers
    pub use linebot_framework::{EventContext, HandlerOptions, HandlerResult};

    // Commands
    pub use linebot_framework::{ArgType, Args, Command, CommandGroup, Rule};

    // Actions
    pub use linebot_framework::{
        DatetimePickerAction, PickerMode, PostbackAction, RichMenuSwitchAction,
    };
}
