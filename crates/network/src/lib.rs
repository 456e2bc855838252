//! # rconhub Networking Layer
//!
//! Tokio-based RCON sessions and the host pieces around them.
//!
//! ## Modules
//!
//! - [`connection`] - One session per game server (state machine, parsing, timers)
//! - [`dispatcher`] - Plugin and closure observers of game events
//! - [`registry`] - Owns the connections and ticks them
//! - [`context`] - Shared host state (config, stores, dispatcher)
//! - [`rdns`] - Bounded reverse DNS lookups
//! - [`commands`] - In-game chat commands

pub mod commands;
pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod rdns;
pub mod registry;

// Re-export commonly used items
pub use commands::{GameCommand, GameCommandRouter};
pub use connection::{Connection, ConnectionStatus};
pub use context::HostContext;
pub use dispatcher::{EventDispatcher, EventHandler, Plugin};
pub use rdns::{RdnsPool, ReverseLookup, SystemLookup};
pub use registry::ConnectionRegistry;
