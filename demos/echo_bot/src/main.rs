//! Echo Bot Example
//!
//! A small LINE bot on the linebot SDK:
//!
//! - plain text is echoed back
//! - `!drink <times> [reason...]` is a command with a cooldown
//! - `!menu` sends buttons whose postbacks route back to one-shot handlers
//! - new followers are greeted by name
//!
//! # Usage
//!
//! ```bash
//! LINEBOT_CHANNEL__SECRET=... LINEBOT_CHANNEL__ACCESS_TOKEN=... \
//!     cargo run --package echo-bot -- --port 8080
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use linebot::framework::{CommandError, HandlerFailure};
use linebot::prelude::*;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A LINE echo bot")]
struct Cli {
    /// Configuration file (defaults to ./linebot.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Webhook route.
    #[arg(long)]
    path: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    debug: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Echoes every text that is not a command.
async fn echo(ctx: EventContext) -> HandlerResult {
    let Some(text) = ctx.text().filter(|t| !t.starts_with('!')) else {
        return Ok(());
    };
    let name = ctx.author().map_or("someone", |p| p.display_name.as_str());
    info!(user = name, ping_ms = ctx.ping(), "Echoing");
    ctx.reply(text.to_string()).await?;
    Ok(())
}

async fn greet(ctx: EventContext) -> HandlerResult {
    let greeting = match ctx.author() {
        Some(profile) => format!("Hi {}, thanks for adding me!", profile.display_name),
        None => "Thanks for adding me!".to_string(),
    };
    ctx.reply(vec![Message::text(greeting), Message::sticker("446", "1988")])
        .await?;
    Ok(())
}

async fn drink(ctx: EventContext, args: Args) -> HandlerResult {
    let times = args.int("times").unwrap_or(1);
    let reply = match args.str("reason") {
        Some(reason) => format!("Drinking {times} time(s) {reason}"),
        None => format!("Drinking {times} time(s)"),
    };
    ctx.reply(reply).await?;
    Ok(())
}

async fn drink_usage(ctx: EventContext, err: CommandError) -> HandlerResult {
    if err.is_argument_error() {
        ctx.reply(format!("{err}\nUsage: !drink <times> [reason...]"))
            .await?;
        return Ok(());
    }
    Err(err.into())
}

async fn menu(ctx: EventContext, _args: Args) -> HandlerResult {
    let correlation = ctx.correlation();
    let coffee = PostbackAction::new("Coffee")
        .display_text("Coffee, please")
        .data("drink", "coffee")
        .handler(picked)
        .build(correlation);
    let tea = PostbackAction::new("Tea")
        .display_text("Tea, please")
        .data("drink", "tea")
        .handler(picked)
        .build(correlation);
    let when = DatetimePickerAction::new(PickerMode::Datetime)
        .label("Schedule")
        .handler(|ctx: EventContext| async move {
            let at = ctx
                .postback()
                .and_then(|p| p.params.as_ref())
                .and_then(|p| p.picked())
                .unwrap_or("?")
                .to_string();
            ctx.reply(format!("Scheduled for {at}")).await?;
            anyhow::Ok(())
        })
        .build(correlation);

    let template = json!({
        "type": "buttons",
        "text": "What would you like?",
        "actions": [coffee, tea, when],
    });
    ctx.reply(Message::template("Drink menu", template)).await?;
    Ok(())
}

async fn picked(ctx: EventContext) -> HandlerResult {
    let drink = ctx
        .action_value("drink")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "something".to_string());
    ctx.reply(format!("One {drink} coming up")).await?;
    Ok(())
}

fn report_failure(failure: &HandlerFailure, event: Option<&Event>) {
    error!(
        handler = %failure.handler,
        kind = ?event.map(Event::kind),
        error = %failure.error,
        "Handler failed"
    );
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = LineClient::builder();
    if let Some(config) = &cli.config {
        builder = builder.config_file(config);
    }
    if let Some(port) = cli.port {
        builder = builder.set("server.port", port);
    }
    if let Some(path) = &cli.path {
        builder = builder.set("server.path", path);
    }
    if cli.debug {
        builder = builder.set("logging.level", "debug");
    }
    let client = builder.build()?;

    client.on(EventKind::Text, echo)?;
    client.on(EventKind::Follow, greet)?;
    client.on_ready(|| async {
        info!("First webhook received, bot is live");
        anyhow::Ok(())
    })?;
    client.on_error(report_failure);

    let commands = CommandGroup::new("!")
        .named("drinks")
        .command(
            Command::new("drink")
                .describe("Have a drink")
                .param("times", ArgType::Int)
                .rest("reason")
                .rule(Rule::cooldown(10))
                .on_error(drink_usage)
                .on_reject(|ctx: EventContext| async move {
                    ctx.reply("Slow down, one drink every 10 seconds").await?;
                    anyhow::Ok(())
                })
                .handler(drink),
        )
        .command(Command::new("menu").describe("Show the drink menu").handler(menu));
    client.add_commands(commands)?;

    client.run().await?;
    Ok(())
}
