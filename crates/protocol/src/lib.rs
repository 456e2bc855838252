//! # rconhub Protocol Library
//!
//! This library implements the line-oriented RCON text protocol spoken by the
//! game servers rconhub connects to.
//!
//! ## Architecture
//!
//! The protocol is organized into several layers:
//!
//! ### 1. Framing ([`codec`])
//! A `tokio_util` codec that splits the raw byte stream into complete lines
//! and renders outbound commands:
//! - Lines end in `\n` (a trailing `\r` is tolerated)
//! - Partial lines stay buffered until their terminator arrives
//! - The in-line field delimiter depends on the negotiated protocol version
//!
//! ### 2. Commands ([`command`])
//! A line's first byte is its command type; the remaining delimiter-separated
//! fields are positional:
//! - `v` version banner
//! - `a` authenticated
//! - `e` error
//! - `c` command echo (opens a response block)
//! - `r` response row
//! - `l` log line
//!
//! ### 3. Tokens ([`tokens`])
//! Parsers for the compound fields embedded in log lines (`Team,Id,Name`
//! player tokens, `Team,Object` pairs, `Key=Value` counters).
//!
//! ### 4. Log Lines ([`log`])
//! Classification of `l` lines into a typed [`LogLine`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rcon_protocol::{Command, CommandType, DELIMITER_V3};
//!
//! let line = b"lPLAYER\x02Enter;\x02GDI,3,Alice\x02from\x02127.0.0.1";
//! let command = Command::parse(line, DELIMITER_V3).unwrap();
//! assert_eq!(command.kind, CommandType::Log);
//! ```

pub mod codec;
pub mod command;
pub mod tokens;
pub mod log;

// Re-export commonly used items
pub use codec::*;
pub use command::*;
pub use tokens::*;
pub use log::*;
