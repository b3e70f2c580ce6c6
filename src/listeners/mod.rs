//! # Listeners and their registry.
//!
//! - [`Listener`] trait for async, fallible event handlers
//! - [`ListenerFn`] closure-backed listener, [`ListenerRef`] shared handle
//! - [`Pattern`] compiled exact / trailing-wildcard name pattern
//! - `Registry` segment trie resolving an event name to its registrations
//! - `Sequencer` per-handler start order for first attempts

mod listener;
mod pattern;
mod registry;
mod turn;

pub use listener::{Listener, ListenerFn, ListenerRef};
pub use pattern::Pattern;
pub use registry::ListenerId;
pub(crate) use registry::{Registry, Route};
pub(crate) use turn::Turn;
