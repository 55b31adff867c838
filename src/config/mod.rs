//! # Configuration Module
//!
//! This module handles bot configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with BOT__, plus BOT_API_TOKEN)
//! - Configuration files (config/default.toml, config/{environment}.toml,
//!   or one explicit file)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chatops_bot::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Outgoing queue holds {} requests", settings.dispatch.reply_queue_capacity);
//! ```
//!
//! Plugins read their own sections through [`Settings::section`].

mod settings;

pub use settings::*;
