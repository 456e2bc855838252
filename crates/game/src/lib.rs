//! # rconhub Game State Model
//!
//! This crate holds the live picture of one game server: who is connected,
//! which buildings stand, which map is loaded and where the match is.
//!
//! ## Modules
//!
//! - `player` - Player records and the write-once reverse DNS cell
//! - `building` - Building records
//! - `map` - Map names and GUIDs
//! - `events` - Typed events produced by the model
//! - `roster` - Response tables (`clientvarlist`, `binfo`, ...)
//! - `state` - The reducer that applies classified lines to the model

pub mod player;
pub mod building;
pub mod map;
pub mod events;
pub mod roster;
pub mod state;

// Re-export commonly used types
pub use player::{Player, RdnsCell, RDNS_PENDING};
pub use building::Building;
pub use map::Map;
pub use events::{EventKind, GameEvent, Milestone};
pub use roster::ResponseTable;
pub use state::{GameState, MatchOutcome, MatchPhase};
