//! Plugins
//!
//! A plugin declares its capabilities statically and registers its
//! listeners once, from [`Plugin::init`].

use std::collections::HashSet;

use tracing::{error, info};

use super::bot::Bot;
use crate::shared::error::BotError;

/// Capability of plugins that register chat listeners.
pub const CAP_CHAT: &str = "chat";

/// Capability of plugins that act on a timetable.
pub const CAP_SCHEDULE: &str = "schedule";

/// A unit of bot behaviour.
pub trait Plugin: Send + Sync {
    /// Unique plugin name.
    fn name(&self) -> &str;

    /// What the plugin provides, e.g. [`CAP_CHAT`]. Must not be empty.
    fn capabilities(&self) -> &'static [&'static str];

    /// Register listeners and read configuration.
    fn init(&self, bot: &Bot) -> anyhow::Result<()>;
}

/// Validated, ordered set of plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    names: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), BotError> {
        let name = plugin.name().to_string();
        if name.is_empty() {
            return Err(BotError::Plugin("plugin without a name".into()));
        }
        if plugin.capabilities().is_empty() {
            return Err(BotError::Plugin(format!(
                "plugin '{}' declares no capabilities",
                name
            )));
        }
        if !self.names.insert(name.clone()) {
            return Err(BotError::Plugin(format!("duplicate plugin '{}'", name)));
        }

        info!(plugin = %name, capabilities = ?plugin.capabilities(), "Plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Initialise every plugin in registration order. Stops at the first
    /// failure.
    pub fn init_all(&self, bot: &Bot) -> Result<(), BotError> {
        for plugin in &self.plugins {
            plugin.init(bot).map_err(|e| {
                error!(plugin = plugin.name(), error = %e, "Plugin init failed");
                BotError::Plugin(format!("{}: {}", plugin.name(), e))
            })?;
            info!(plugin = plugin.name(), "Plugin initialised");
        }
        Ok(())
    }
}
