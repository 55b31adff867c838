//! End-to-end behaviour of the engine, driven through the public API.

mod directory_tests;
mod dispatch_tests;
mod lifecycle_tests;
mod reaction_tests;
