//! RCON command types
//!
//! # Inbound Line Format
//! ```text
//! {TYPE BYTE}{field 0}{DELIM}{field 1}{DELIM}...{field n}
//! ```
//!
//! # Outbound Line Format
//! ```text
//! a{password}      authenticate
//! s                subscribe to the log stream
//! u                unsubscribe
//! c{command text}  execute a console command
//! ```

use crate::codec::{DELIMITER_LEGACY, DELIMITER_V3};
use serde::{Deserialize, Serialize};

/// Type of an inbound line, taken from its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    /// `v` - protocol/game version banner, first line of every session
    Version,

    /// `a` - authentication accepted
    Authenticated,

    /// `e` - error reported by the server
    Error,

    /// `c` - echo of an executed command; following `r` rows answer it
    CommandEcho,

    /// `r` - one row of a command response
    Response,

    /// `l` - game log line
    Log,

    /// Any other type byte
    Other(u8),
}

impl CommandType {
    /// Classify a type byte
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'v' => Self::Version,
            b'a' => Self::Authenticated,
            b'e' => Self::Error,
            b'c' => Self::CommandEcho,
            b'r' => Self::Response,
            b'l' => Self::Log,
            other => Self::Other(other),
        }
    }

    /// The wire byte for this type
    #[inline]
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Version => b'v',
            Self::Authenticated => b'a',
            Self::Error => b'e',
            Self::CommandEcho => b'c',
            Self::Response => b'r',
            Self::Log => b'l',
            Self::Other(byte) => *byte,
        }
    }
}

/// One decoded inbound line
///
/// # Fields
/// - `kind`: command type from the first byte
/// - `fields`: the remaining bytes split on the session delimiter, each
///   decoded as (lossy) UTF-8
/// - `delimiter`: the byte the line was split on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandType,
    pub fields: Vec<String>,
    pub delimiter: u8,
}

impl Command {
    /// Parse a complete line (without its terminator)
    ///
    /// # Returns
    /// `None` for an empty line
    pub fn parse(line: &[u8], delimiter: u8) -> Option<Self> {
        let (&type_byte, payload) = line.split_first()?;

        let fields = if payload.is_empty() {
            Vec::new()
        } else {
            payload
                .split(|b| *b == delimiter)
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect()
        };

        Some(Self {
            kind: CommandType::from_byte(type_byte),
            fields,
            delimiter,
        })
    }

    /// Field at `index`, or an empty string when the line is too short
    #[inline]
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// Number of fields
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The delimiter as a character, for re-joining fields
    #[inline]
    pub fn delimiter_char(&self) -> char {
        char::from(self.delimiter)
    }

    /// All fields joined back with a readable delimiter
    pub fn joined(&self, separator: &str) -> String {
        self.fields.join(separator)
    }

    /// Render the line for logging and the raw catch-all hook
    pub fn to_raw(&self) -> String {
        let mut raw = String::with_capacity(1 + self.fields.iter().map(|f| f.len() + 1).sum::<usize>());
        raw.push(self.kind.as_byte() as char);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                raw.push(self.delimiter_char());
            }
            raw.push_str(field);
        }
        raw
    }
}

/// Parsed version banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBanner {
    /// RCON protocol version (major number)
    pub rcon_version: u32,

    /// Free-form game version string
    pub game_version: String,
}

/// Parse the payload of a `v` line
///
/// # Format
/// ```text
/// v{rcon version}[{DELIM}{game version}]
/// ```
/// The delimiter is not known yet when the banner arrives, so the version
/// field ends at the first byte that is either historical delimiter.
///
/// # Returns
/// `None` when no leading version number can be read
pub fn parse_version_banner(line: &[u8]) -> Option<VersionBanner> {
    let payload = match line.split_first() {
        Some((&b'v', rest)) => rest,
        _ => return None,
    };

    let split = payload
        .iter()
        .position(|b| *b == DELIMITER_V3 || *b == DELIMITER_LEGACY)
        .unwrap_or(payload.len());

    let version_field = String::from_utf8_lossy(&payload[..split]);
    let digits: String = version_field
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let rcon_version = digits.parse().ok()?;

    let game_version = if split < payload.len() {
        String::from_utf8_lossy(&payload[split + 1..]).into_owned()
    } else {
        String::new()
    };

    Some(VersionBanner {
        rcon_version,
        game_version,
    })
}

/// Outbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// `a{password}`
    Authenticate(String),

    /// `s`
    Subscribe,

    /// `u`
    Unsubscribe,

    /// `c{command}`
    Execute(String),
}

impl Outbound {
    /// Wire type byte
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::Authenticate(_) => b'a',
            Self::Subscribe => b's',
            Self::Unsubscribe => b'u',
            Self::Execute(_) => b'c',
        }
    }

    /// Payload following the type byte
    pub fn payload(&self) -> &str {
        match self {
            Self::Authenticate(password) => password,
            Self::Execute(command) => command,
            Self::Subscribe | Self::Unsubscribe => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_line() {
        let command = Command::parse(b"lGAME\x02MatchStart;\x02CNC-Field", DELIMITER_V3).unwrap();
        assert_eq!(command.kind, CommandType::Log);
        assert_eq!(command.fields, vec!["GAME", "MatchStart;", "CNC-Field"]);
        assert_eq!(command.field(2), "CNC-Field");
        assert_eq!(command.field(9), "");
    }

    #[test]
    fn test_parse_legacy_delimiter() {
        let command = Command::parse(b"rPONG\xA0token", DELIMITER_LEGACY).unwrap();
        assert_eq!(command.kind, CommandType::Response);
        assert_eq!(command.fields, vec!["PONG", "token"]);
    }

    #[test]
    fn test_parse_empty_and_bare() {
        assert!(Command::parse(b"", DELIMITER_V3).is_none());
        let bare = Command::parse(b"r", DELIMITER_V3).unwrap();
        assert!(bare.is_empty());
        let other = Command::parse(b"Zwhat", DELIMITER_V3).unwrap();
        assert_eq!(other.kind, CommandType::Other(b'Z'));
    }

    #[test]
    fn test_version_banner() {
        let banner = parse_version_banner(b"v004\x02Open Beta 5.4").unwrap();
        assert_eq!(banner.rcon_version, 4);
        assert_eq!(banner.game_version, "Open Beta 5.4");

        let legacy = parse_version_banner(b"v2.0\xA0Beta").unwrap();
        assert_eq!(legacy.rcon_version, 2);

        let bare = parse_version_banner(b"v3").unwrap();
        assert_eq!(bare.rcon_version, 3);
        assert!(bare.game_version.is_empty());

        assert!(parse_version_banner(b"vbeta").is_none());
        assert!(parse_version_banner(b"a3").is_none());
    }

    #[test]
    fn test_to_raw() {
        let command = Command::parse(b"lCHAT\x02Say;", DELIMITER_V3).unwrap();
        assert_eq!(command.to_raw(), "lCHAT\u{2}Say;");
    }

    #[test]
    fn test_to_raw_legacy_delimiter() {
        let command = Command::parse(b"lCHAT\xA0Say;\xA0hi", DELIMITER_LEGACY).unwrap();
        assert_eq!(command.delimiter, DELIMITER_LEGACY);
        assert_eq!(command.to_raw(), "lCHAT\u{a0}Say;\u{a0}hi");
        assert!(!command.to_raw().contains('\u{2}'));
    }
}
