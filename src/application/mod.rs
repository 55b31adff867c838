//! Application Layer
//!
//! The engine: listener definitions and their lifecycle, the registry, the
//! reaction overlay, event classification, the dispatcher and the [`Bot`]
//! context shared with handlers and plugins.

pub mod bot;
pub mod classify;
pub mod dispatcher;
pub mod listener;
pub mod plugin;
pub mod reaction;
pub mod registry;
pub mod reply;

pub use bot::Bot;
pub use classify::classify;
pub use dispatcher::Dispatcher;
pub use listener::{
    HandlerContext, Incoming, Listener, ListenerHandle, ListenerState, MessageFilter,
};
pub use plugin::{Plugin, PluginRegistry, CAP_CHAT, CAP_SCHEDULE};
pub use reaction::ReactionListener;
pub use registry::{Registry, RegistryQueues};
pub use reply::Reply;
