//! rconhub Core - Fundamental types and utilities

mod error;
mod types;
mod net;
mod time;

pub use error::*;
pub use types::*;
pub use net::*;
pub use time::*;
