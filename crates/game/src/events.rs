//! # Game Events
//!
//! Every observable change on a server, as handed to observers.
//!
//! Player payloads are snapshots taken right after the model was updated,
//! so a `Kill` carries the killer's kill count including that kill.

use crate::map::Map;
use crate::player::Player;
use rcon_core::{BanFlags, PlayerId, Team};
use rcon_protocol::ObjectKind;
use serde::Serialize;

/// One-shot per-match latches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Milestone {
    FirstKill,
    FirstDeath,
    FirstAction,
}

/// A typed game event
#[derive(Debug, Clone, Serialize)]
pub enum GameEvent {
    //=== RCON session ===//
    Connected,
    Authenticated { user: String },
    FullyConnected,
    Disconnected { reason: String },
    ServerError { message: String },
    RconCommand { user: String, command: String },
    RconSubscribed { user: String },
    RconUnsubscribed { user: String },

    //=== Players ===//
    PlayerJoin { player: Player },
    /// Player first seen in a roster response rather than a join line
    PlayerDiscovered { player: Player },
    PlayerPart { player: Player },
    PlayerKick { player: Player, reason: String },
    TeamChange { player: Player, old_team: Team },
    NameChange { player: Player, old_name: String },
    IdChange { player: Player, old_id: PlayerId },
    BanMatched { player: Player, flags: BanFlags },

    //=== Chat ===//
    Chat { player: Player, message: String },
    TeamChat { player: Player, message: String },
    HostChat { message: String },

    //=== Admin ===//
    AdminLogin { player: Player, level: String },
    AdminLogout { player: Player, level: String },
    AdminGrant { player: Player, level: String },

    //=== Combat ===//
    Kill { killer: Player, victim: Player, damage_type: String },
    Death { victim: Player, killer: Option<String>, damage_type: String },
    Suicide { player: Player, damage_type: String },
    Destroy {
        kind: ObjectKind,
        object: String,
        killer: Option<Player>,
        killer_name: String,
        damage_type: String,
    },
    Capture { player: Player, building: String, old_team: Team },
    Neutralize { player: Player, building: String, old_team: Team },
    Deploy { player: Player, object: String },
    Disarm { player: Player, object: String, owner: Option<Player> },

    //=== Votes ===//
    VoteCall { team: Team, vote_type: String, player: Option<Player>, params: Vec<String> },
    VoteResult { team: Team, vote_type: String, passed: bool, yes: u32, no: u32 },
    VoteCancel { team: Team, vote_type: String },

    //=== Map / match ===//
    MapChange { map: String, seamless: bool },
    MapLoad { map: Map },
    MapStart { map: Map },
    MatchStart { map: String },
    MatchEnd { winner: Option<Team>, tie: bool, reason: String, score_a: i64, score_b: i64 },

    //=== Latches ===//
    Milestone { milestone: Milestone, player: Player },
}

/// Tag of a [`GameEvent`], used for subscriptions and capability filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    Connected,
    Authenticated,
    FullyConnected,
    Disconnected,
    ServerError,
    RconCommand,
    RconSubscribed,
    RconUnsubscribed,
    PlayerJoin,
    PlayerDiscovered,
    PlayerPart,
    PlayerKick,
    TeamChange,
    NameChange,
    IdChange,
    BanMatched,
    Chat,
    TeamChat,
    HostChat,
    AdminLogin,
    AdminLogout,
    AdminGrant,
    Kill,
    Death,
    Suicide,
    Destroy,
    Capture,
    Neutralize,
    Deploy,
    Disarm,
    VoteCall,
    VoteResult,
    VoteCancel,
    MapChange,
    MapLoad,
    MapStart,
    MatchStart,
    MatchEnd,
    Milestone,
}

impl GameEvent {
    /// Tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::FullyConnected => EventKind::FullyConnected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::ServerError { .. } => EventKind::ServerError,
            Self::RconCommand { .. } => EventKind::RconCommand,
            Self::RconSubscribed { .. } => EventKind::RconSubscribed,
            Self::RconUnsubscribed { .. } => EventKind::RconUnsubscribed,
            Self::PlayerJoin { .. } => EventKind::PlayerJoin,
            Self::PlayerDiscovered { .. } => EventKind::PlayerDiscovered,
            Self::PlayerPart { .. } => EventKind::PlayerPart,
            Self::PlayerKick { .. } => EventKind::PlayerKick,
            Self::TeamChange { .. } => EventKind::TeamChange,
            Self::NameChange { .. } => EventKind::NameChange,
            Self::IdChange { .. } => EventKind::IdChange,
            Self::BanMatched { .. } => EventKind::BanMatched,
            Self::Chat { .. } => EventKind::Chat,
            Self::TeamChat { .. } => EventKind::TeamChat,
            Self::HostChat { .. } => EventKind::HostChat,
            Self::AdminLogin { .. } => EventKind::AdminLogin,
            Self::AdminLogout { .. } => EventKind::AdminLogout,
            Self::AdminGrant { .. } => EventKind::AdminGrant,
            Self::Kill { .. } => EventKind::Kill,
            Self::Death { .. } => EventKind::Death,
            Self::Suicide { .. } => EventKind::Suicide,
            Self::Destroy { .. } => EventKind::Destroy,
            Self::Capture { .. } => EventKind::Capture,
            Self::Neutralize { .. } => EventKind::Neutralize,
            Self::Deploy { .. } => EventKind::Deploy,
            Self::Disarm { .. } => EventKind::Disarm,
            Self::VoteCall { .. } => EventKind::VoteCall,
            Self::VoteResult { .. } => EventKind::VoteResult,
            Self::VoteCancel { .. } => EventKind::VoteCancel,
            Self::MapChange { .. } => EventKind::MapChange,
            Self::MapLoad { .. } => EventKind::MapLoad,
            Self::MapStart { .. } => EventKind::MapStart,
            Self::MatchStart { .. } => EventKind::MatchStart,
            Self::MatchEnd { .. } => EventKind::MatchEnd,
            Self::Milestone { .. } => EventKind::Milestone,
        }
    }

    /// The acting player, for events that have one
    pub fn player(&self) -> Option<&Player> {
        match self {
            Self::PlayerJoin { player }
            | Self::PlayerDiscovered { player }
            | Self::PlayerPart { player }
            | Self::PlayerKick { player, .. }
            | Self::TeamChange { player, .. }
            | Self::NameChange { player, .. }
            | Self::IdChange { player, .. }
            | Self::BanMatched { player, .. }
            | Self::Chat { player, .. }
            | Self::TeamChat { player, .. }
            | Self::AdminLogin { player, .. }
            | Self::AdminLogout { player, .. }
            | Self::AdminGrant { player, .. }
            | Self::Suicide { player, .. }
            | Self::Capture { player, .. }
            | Self::Neutralize { player, .. }
            | Self::Deploy { player, .. }
            | Self::Disarm { player, .. }
            | Self::Milestone { player, .. } => Some(player),
            Self::Kill { killer, .. } => Some(killer),
            Self::Death { victim, .. } => Some(victim),
            Self::Destroy { killer, .. } => killer.as_ref(),
            Self::VoteCall { player, .. } => player.as_ref(),
            _ => None,
        }
    }
}
