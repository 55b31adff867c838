//! Application Startup
//!
//! Wires settings, transport and plugins into a running bot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::application::{Bot, Dispatcher, PluginRegistry};
use crate::config::Settings;
use crate::domain::ChatClient;

/// Application instance
pub struct Application {
    bot: Bot,
    dispatcher: Dispatcher,
    pid_file: Option<PathBuf>,
}

impl Application {
    /// Build the bot, initialise every plugin and write the PID file.
    pub fn build(
        settings: Settings,
        client: Arc<dyn ChatClient>,
        plugins: PluginRegistry,
    ) -> Result<Self> {
        let pid_file = settings.server.pid_file.clone();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
            info!(path = %path.display(), pid = std::process::id(), "PID file written");
        }

        let (bot, dispatcher) = Bot::new(settings, client);
        plugins.init_all(&bot)?;
        info!(plugins = plugins.len(), "Bot ready");

        Ok(Self {
            bot,
            dispatcher,
            pid_file,
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Capacity for the raw event channel feeding [`Application::run_until_stopped`].
    pub fn event_buffer(&self) -> usize {
        self.bot.settings().dispatch.event_buffer
    }

    /// Dispatch `events` until the source closes or the bot is shut down.
    pub async fn run_until_stopped(self, events: mpsc::Receiver<String>) -> Result<()> {
        self.dispatcher.run(events).await;
        if let Some(path) = &self.pid_file {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove PID file");
            }
        }
        Ok(())
    }
}

fn write_pid_file(path: &Path) -> Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))
        .with_context(|| format!("writing PID file {}", path.display()))
}
