//! # ChatOps Bot
//!
//! Entry point running the bot against the console transport:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Plugin registration
//! - Dispatch loop fed from stdin

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Utc, Weekday};
use serde::Deserialize;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use chatops_bot::application::{
    Bot, Listener, Plugin, PluginRegistry, ReactionListener, CAP_CHAT, CAP_SCHEDULE,
};
use chatops_bot::config::Settings;
use chatops_bot::infrastructure::console::{self, ConsoleClient};
use chatops_bot::shared::schedule::{next_weekday_time, sleep_until_next_weekday_time};
use chatops_bot::startup::Application;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PingConfig {
    reply: String,
    watch_secs: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            reply: "pong".into(),
            watch_secs: 60,
        }
    }
}

/// Answers `ping` and reports reactions to its answer for a while.
struct Ping;

impl Plugin for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &[CAP_CHAT]
    }

    fn init(&self, bot: &Bot) -> anyhow::Result<()> {
        let config: PingConfig = bot.section("plugins.ping").unwrap_or_default();
        let config = Arc::new(config);

        bot.listen(
            Listener::new()
                .mentions_me_only()
                .contains("ping")
                .on_message(move |ctx, msg| {
                    let reply = ctx.bot.reply_mention(msg, config.reply.clone())?;
                    let watch = Duration::from_secs(config.watch_secs);
                    tokio::spawn(async move {
                        let overlay = ReactionListener::new()
                            .listen_duration(watch)
                            .on_reaction(|ctx, reaction| {
                                if let Some(channel) = reaction.channel() {
                                    let text = format!(
                                        ":{}: {} by <@{}>",
                                        reaction.emoji, reaction.kind, reaction.user
                                    );
                                    ctx.bot.send_outgoing_message(text, channel)?;
                                }
                                Ok(())
                            });
                        if let Err(e) = reply.listen_reaction(overlay).await {
                            warn!(error = %e, "Could not watch reactions");
                        }
                    });
                    Ok(())
                }),
        )?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ReminderConfig {
    channel: String,
    weekday: String,
    hour: u32,
    minute: u32,
    text: String,
}

/// Posts a fixed text to a channel once a week. Inactive without a
/// `plugins.reminder` section.
struct Reminder;

impl Plugin for Reminder {
    fn name(&self) -> &str {
        "reminder"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &[CAP_SCHEDULE]
    }

    fn init(&self, bot: &Bot) -> anyhow::Result<()> {
        let Ok(config) = bot.section::<ReminderConfig>("plugins.reminder") else {
            return Ok(());
        };
        let weekday: Weekday = config
            .weekday
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid reminder weekday '{}'", config.weekday))?;
        let (first, _) = next_weekday_time(Utc::now(), weekday, config.hour, config.minute)
            .ok_or_else(|| anyhow::anyhow!("invalid reminder time {}:{}", config.hour, config.minute))?;
        info!(channel = %config.channel, first = %first, "Weekly reminder scheduled");

        let bot = bot.clone();
        tokio::spawn(async move {
            loop {
                sleep_until_next_weekday_time(weekday, config.hour, config.minute).await;
                if bot.is_shut_down() {
                    break;
                }
                if let Err(e) = bot.send_to_channel(&config.channel, config.text.clone()) {
                    warn!(channel = %config.channel, error = %e, "Reminder not sent");
                }
            }
        });
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    chatops_bot::telemetry::init_tracing(&settings.logging);

    info!(
        environment = %settings.environment,
        join_channels = ?settings.bot.join_channels,
        "Configuration loaded"
    );

    let mut plugins = PluginRegistry::new();
    plugins.register(Box::new(Ping))?;
    plugins.register(Box::new(Reminder))?;

    let client = Arc::new(ConsoleClient::new("opsbot"));
    let application = Application::build(settings, client, plugins)?;

    let bot = application.bot().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            bot.shutdown();
        }
    });

    let (tx, rx) = mpsc::channel(application.event_buffer());
    tokio::spawn(async move {
        if let Err(e) = console::pump_lines(BufReader::new(tokio::io::stdin()), tx).await {
            error!(error = %e, "Console input failed");
        }
    });

    info!("Bot ready; type a message");
    application.run_until_stopped(rx).await?;

    Ok(())
}
