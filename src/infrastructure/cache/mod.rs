//! Cache Module
//!
//! In-memory caches shared between the dispatch loop and listener workers.
//!
//! - [`Directory`]: users and conversations mirrored from the event source

mod directory;

pub use directory::Directory;
