//! # Player Management
//!
//! This module handles player records and their per-match counters.

use rcon_core::{ipv4_to_u32, BanFlags, PlayerId, Team};
use rcon_protocol::PlayerRef;
use serde::{Serialize, Serializer};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

/// What an unresolved reverse DNS lookup reads as
pub const RDNS_PENDING: &str = "pending";

/// Write-once reverse DNS result shared with the resolver pool
///
/// # Purpose
/// The resolver writes the hostname exactly once from a worker thread; the
/// polling loop only reads it and sees [`RDNS_PENDING`] until then.
#[derive(Debug, Clone, Default)]
pub struct RdnsCell(Arc<OnceLock<String>>);

impl RdnsCell {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved hostname, or [`RDNS_PENDING`]
    #[inline]
    pub fn get(&self) -> &str {
        self.0.get().map(String::as_str).unwrap_or(RDNS_PENDING)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.0.get().is_none()
    }

    /// Store the result
    ///
    /// # Returns
    /// `false` when a result was already stored
    #[inline]
    pub fn set(&self, hostname: String) -> bool {
        self.0.set(hostname).is_ok()
    }
}

impl Serialize for RdnsCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.get())
    }
}

/// One player on one server
///
/// # Purpose
/// Exclusively owned by the [`GameState`](crate::GameState) of its
/// connection; observers receive cloned snapshots.
///
/// # Identity
/// `id` is assigned by the server and reused after the player leaves, so it
/// is only meaningful while the player is connected. `account_id` is the
/// stable identity (0 when the player has no account).
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ip: String,
    pub ip32: u32,
    pub hwid: String,
    pub account_id: u64,
    pub rdns: RdnsCell,
    pub team: Team,
    pub is_bot: bool,
    pub joined_at: SystemTime,
    pub admin_level: Option<String>,
    pub ban_flags: BanFlags,

    //=== Match counters ===//
    pub kills: u32,
    pub deaths: u32,
    pub suicides: u32,
    pub headshots: u32,
    pub vehicle_kills: u32,
    pub building_kills: u32,
    pub defence_kills: u32,
    pub captures: u32,
    pub beacon_placements: u32,
    pub beacon_disarms: u32,
    pub mine_placements: u32,
    pub mine_disarms: u32,
    pub score: i32,
    pub credits: f64,
    pub ping: u32,
}

impl Player {
    /// Create a player
    ///
    /// # Arguments
    /// * `id` - Server-assigned id
    /// * `name` - Display name
    #[inline]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ip: String::new(),
            ip32: 0,
            hwid: String::new(),
            account_id: 0,
            rdns: RdnsCell::new(),
            team: Team::None,
            is_bot: false,
            joined_at: SystemTime::now(),
            admin_level: None,
            ban_flags: BanFlags::NONE,
            kills: 0,
            deaths: 0,
            suicides: 0,
            headshots: 0,
            vehicle_kills: 0,
            building_kills: 0,
            defence_kills: 0,
            captures: 0,
            beacon_placements: 0,
            beacon_disarms: 0,
            mine_placements: 0,
            mine_disarms: 0,
            score: 0,
            credits: 0.0,
            ping: 0,
        }
    }

    /// Create a player from a log-line token
    pub fn from_ref(player: &PlayerRef) -> Self {
        let mut created = Self::new(player.id, player.name.clone());
        created.team = player.team;
        created.is_bot = player.is_bot;
        created
    }

    /// Set the IP address (and its numeric form)
    pub fn set_ip(&mut self, ip: &str) {
        self.ip = ip.to_string();
        self.ip32 = ipv4_to_u32(ip);
    }

    /// Kills divided by deaths (kills when the player never died)
    pub fn kill_death_ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }

    /// Zero the per-match counters
    pub fn reset_match_stats(&mut self) {
        self.kills = 0;
        self.deaths = 0;
        self.suicides = 0;
        self.headshots = 0;
        self.vehicle_kills = 0;
        self.building_kills = 0;
        self.defence_kills = 0;
        self.captures = 0;
        self.beacon_placements = 0;
        self.beacon_disarms = 0;
        self.mine_placements = 0;
        self.mine_disarms = 0;
        self.score = 0;
    }

    /// Whether a ban kind currently applies to this player
    #[inline]
    pub fn is_banned(&self, kind: BanFlags) -> bool {
        self.ban_flags.intersects(kind)
    }
}
