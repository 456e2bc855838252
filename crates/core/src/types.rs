//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// In-game player ID (server assigned, reused after a player leaves)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub i32);

impl PlayerId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

impl From<i32> for PlayerId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team a player or building belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    SideA,
    SideB,
    Other,
    #[default]
    None,
}

impl Team {
    /// Parse a team as it appears on the wire
    ///
    /// # Format
    /// - `GDI` / `0` → SideA
    /// - `Nod` / `1` → SideB
    /// - empty → None
    /// - anything else → Other
    pub fn from_wire(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::None;
        }
        if value.eq_ignore_ascii_case("GDI") || value == "0" {
            Self::SideA
        } else if value.eq_ignore_ascii_case("Nod") || value == "1" {
            Self::SideB
        } else {
            Self::Other
        }
    }

    /// Wire name of the team
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::SideA => "GDI",
            Self::SideB => "Nod",
            Self::Other => "Neutral",
            Self::None => "",
        }
    }

    /// The opposing side, if this is one of the two playable sides
    pub fn enemy(&self) -> Option<Self> {
        match self {
            Self::SideA => Some(Self::SideB),
            Self::SideB => Some(Self::SideA),
            _ => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, Self::SideA | Self::SideB)
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Lifecycle state of one RCON connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No socket; a reconnect may be scheduled
    Disconnected,

    /// TCP connect in flight
    Connecting,

    /// Socket open, waiting for the version banner / authentication
    Handshaking,

    /// Authenticated, initial roster requests outstanding
    Subscribing,

    /// Initial data received, live event stream
    FullyConnected,

    /// Server is changing maps
    Travelling,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Subscribing => "subscribing",
            Self::FullyConnected => "fully connected",
            Self::Travelling => "travelling",
        }
    }

    /// Whether a socket is open in this state
    pub fn has_socket(&self) -> bool {
        matches!(
            self,
            Self::Handshaking | Self::Subscribing | Self::FullyConnected | Self::Travelling
        )
    }
}

/// Ban kind bits plus the `ACTIVE` marker, as persisted in the ban file
///
/// # Bits
/// - `ACTIVE` record is in force (cleared by deactivate)
/// - `GAME` kick on join
/// - `CHAT` muted
/// - `BOT` bot commands refused
/// - `VOTE` may not call votes
/// - `MINING` may not place mines
/// - `LADDER` excluded from the ladder
/// - `ALERT` admins are alerted on join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BanFlags(pub u16);

impl BanFlags {
    pub const NONE: Self = Self(0);
    pub const GAME: Self = Self(0x0001);
    pub const CHAT: Self = Self(0x0002);
    pub const BOT: Self = Self(0x0004);
    pub const VOTE: Self = Self(0x0008);
    pub const MINING: Self = Self(0x0010);
    pub const LADDER: Self = Self(0x0020);
    pub const ALERT: Self = Self(0x0040);
    pub const ACTIVE: Self = Self(0x8000);

    /// Every kind bit (everything but `ACTIVE`)
    pub const KINDS: Self = Self(0x007F);

    #[inline]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// The kind bits without the `ACTIVE` marker
    #[inline]
    pub const fn kinds(&self) -> Self {
        Self(self.0 & Self::KINDS.0)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for BanFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for BanFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for BanFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(BanFlags, &str); 7] = [
            (BanFlags::GAME, "game"),
            (BanFlags::CHAT, "chat"),
            (BanFlags::BOT, "bot"),
            (BanFlags::VOTE, "vote"),
            (BanFlags::MINING, "mining"),
            (BanFlags::LADDER, "ladder"),
            (BanFlags::ALERT, "alert"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_from_wire() {
        assert_eq!(Team::from_wire("GDI"), Team::SideA);
        assert_eq!(Team::from_wire("nod"), Team::SideB);
        assert_eq!(Team::from_wire(""), Team::None);
        assert_eq!(Team::from_wire("Black"), Team::Other);
        assert_eq!(Team::SideA.enemy(), Some(Team::SideB));
        assert_eq!(Team::Other.enemy(), None);
    }

    #[test]
    fn test_state_socket() {
        assert!(!ConnectionState::Connecting.has_socket());
        assert!(ConnectionState::Travelling.has_socket());
    }

    #[test]
    fn test_ban_flags() {
        let mut flags = BanFlags::ACTIVE | BanFlags::GAME;
        assert!(flags.contains(BanFlags::ACTIVE));
        assert_eq!(flags.kinds(), BanFlags::GAME);
        flags.remove(BanFlags::ACTIVE);
        assert!(!flags.contains(BanFlags::ACTIVE));
        flags |= BanFlags::CHAT;
        assert_eq!(flags.to_string(), "game|chat");
        assert_eq!(BanFlags::NONE.to_string(), "none");
    }
}
