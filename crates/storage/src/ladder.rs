//! # Ladder Store
//!
//! Cumulative per-account statistics across matches.
//!
//! # Structure
//! Entries live in a `Vec` that only grows. A separate index vector holds
//! them in descending total-score order, and an account map finds an entry
//! without a scan. Sorting is stable: equal scores keep their prior order.
//!
//! # Versions
//! - 0: global totals without ties, no per-team blocks
//! - 1: current
//!
//! # Finalize
//! Once per finished match [`LadderStore::update`] folds every qualifying
//! player's session into their entry, then [`LadderStore::write`] persists
//! the whole ladder in rank order.

use crate::engine::{OpenOutcome, VersionedFile};
use crate::error::Result;
use crate::schema::{Field, FieldKind, Record, RecordReader, RecordWriter, Schema};
use rcon_core::{to_unix, unix_now, BanFlags, Team};
use rcon_game::{GameState, Player};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

macro_rules! totals_fields {
    ($p:literal, $since:expr, $ties_since:expr) => {
        [
            Field::new(concat!($p, "score"), FieldKind::U64, $since),
            Field::new(concat!($p, "kills"), FieldKind::U32, $since),
            Field::new(concat!($p, "deaths"), FieldKind::U32, $since),
            Field::new(concat!($p, "headshot_kills"), FieldKind::U32, $since),
            Field::new(concat!($p, "vehicle_kills"), FieldKind::U32, $since),
            Field::new(concat!($p, "building_kills"), FieldKind::U32, $since),
            Field::new(concat!($p, "defence_kills"), FieldKind::U32, $since),
            Field::new(concat!($p, "captures"), FieldKind::U32, $since),
            Field::new(concat!($p, "game_time"), FieldKind::U32, $since),
            Field::new(concat!($p, "games"), FieldKind::U32, $since),
            Field::new(concat!($p, "wins"), FieldKind::U32, $since),
            Field::new(concat!($p, "ties"), FieldKind::U32, $ties_since),
            Field::new(concat!($p, "beacon_placements"), FieldKind::U32, $since),
            Field::new(concat!($p, "beacon_disarms"), FieldKind::U32, $since),
            Field::new(concat!($p, "proxy_placements"), FieldKind::U32, $since),
            Field::new(concat!($p, "proxy_disarms"), FieldKind::U32, $since),
        ]
    };
}

const TOTALS_LEN: usize = 16;
const PEAKS_LEN: usize = 13;

const GLOBAL_FIELDS: [Field; TOTALS_LEN] = totals_fields!("", 0, 1);
const SIDE_A_FIELDS: [Field; TOTALS_LEN] = totals_fields!("a_", 1, 1);
const SIDE_B_FIELDS: [Field; TOTALS_LEN] = totals_fields!("b_", 1, 1);

const PEAK_FIELDS: [Field; PEAKS_LEN] = [
    Field::new("peak_score", FieldKind::U64, 0),
    Field::new("peak_kills", FieldKind::U32, 0),
    Field::new("peak_deaths", FieldKind::U32, 0),
    Field::new("peak_headshot_kills", FieldKind::U32, 0),
    Field::new("peak_vehicle_kills", FieldKind::U32, 0),
    Field::new("peak_building_kills", FieldKind::U32, 0),
    Field::new("peak_defence_kills", FieldKind::U32, 0),
    Field::new("peak_captures", FieldKind::U32, 0),
    Field::new("peak_game_time", FieldKind::U32, 0),
    Field::new("peak_beacon_placements", FieldKind::U32, 0),
    Field::new("peak_beacon_disarms", FieldKind::U32, 0),
    Field::new("peak_proxy_placements", FieldKind::U32, 0),
    Field::new("peak_proxy_disarms", FieldKind::U32, 0),
];

const LADDER_FIELD_COUNT: usize = 1 + 3 * TOTALS_LEN + PEAKS_LEN + 3;

/// Concatenate the field blocks in record order
const fn ladder_fields() -> [Field; LADDER_FIELD_COUNT] {
    let mut fields = [Field::new("account_id", FieldKind::U64, 0); LADDER_FIELD_COUNT];
    let mut at = 1;

    let blocks: [&[Field]; 4] = [&GLOBAL_FIELDS, &SIDE_A_FIELDS, &SIDE_B_FIELDS, &PEAK_FIELDS];
    let mut b = 0;
    while b < blocks.len() {
        let mut i = 0;
        while i < blocks[b].len() {
            fields[at] = blocks[b][i];
            at += 1;
            i += 1;
        }
        b += 1;
    }

    fields[at] = Field::new("most_recent_ip", FieldKind::U32, 0);
    fields[at + 1] = Field::new("last_game", FieldKind::U64, 0);
    fields[at + 2] = Field::new("most_recent_name", FieldKind::Str, 0);
    fields
}

const LADDER_FIELDS: [Field; LADDER_FIELD_COUNT] = ladder_fields();

/// Ladder file layout
pub const LADDER_SCHEMA: Schema = Schema {
    name: "ladder",
    current: 1,
    oldest: 0,
    fields: &LADDER_FIELDS,
};

/// One player's contribution from a single match
#[derive(Debug, Clone, Copy, Default)]
struct Session {
    score: u64,
    kills: u32,
    deaths: u32,
    headshot_kills: u32,
    vehicle_kills: u32,
    building_kills: u32,
    defence_kills: u32,
    captures: u32,
    game_time: u32,
    won: bool,
    tied: bool,
    beacon_placements: u32,
    beacon_disarms: u32,
    proxy_placements: u32,
    proxy_disarms: u32,
}

impl Session {
    fn from_player(player: &Player, game_time: u32, won: bool, tied: bool) -> Self {
        Self {
            score: player.score.max(0) as u64,
            kills: player.kills,
            deaths: player.deaths,
            headshot_kills: player.headshots,
            vehicle_kills: player.vehicle_kills,
            building_kills: player.building_kills,
            defence_kills: player.defence_kills,
            captures: player.captures,
            game_time,
            won,
            tied,
            beacon_placements: player.beacon_placements,
            beacon_disarms: player.beacon_disarms,
            proxy_placements: player.mine_placements,
            proxy_disarms: player.mine_disarms,
        }
    }
}

/// Cumulative counters (global or for one side)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LadderTotals {
    pub score: u64,
    pub kills: u32,
    pub deaths: u32,
    pub headshot_kills: u32,
    pub vehicle_kills: u32,
    pub building_kills: u32,
    pub defence_kills: u32,
    pub captures: u32,
    pub game_time: u32,
    pub games: u32,
    pub wins: u32,
    pub ties: u32,
    pub beacon_placements: u32,
    pub beacon_disarms: u32,
    pub proxy_placements: u32,
    pub proxy_disarms: u32,
}

impl LadderTotals {
    fn add(&mut self, session: &Session) {
        self.score = self.score.saturating_add(session.score);
        self.kills = self.kills.saturating_add(session.kills);
        self.deaths = self.deaths.saturating_add(session.deaths);
        self.headshot_kills = self.headshot_kills.saturating_add(session.headshot_kills);
        self.vehicle_kills = self.vehicle_kills.saturating_add(session.vehicle_kills);
        self.building_kills = self.building_kills.saturating_add(session.building_kills);
        self.defence_kills = self.defence_kills.saturating_add(session.defence_kills);
        self.captures = self.captures.saturating_add(session.captures);
        self.game_time = self.game_time.saturating_add(session.game_time);
        self.games = self.games.saturating_add(1);
        self.wins = self.wins.saturating_add(session.won as u32);
        self.ties = self.ties.saturating_add(session.tied as u32);
        self.beacon_placements = self.beacon_placements.saturating_add(session.beacon_placements);
        self.beacon_disarms = self.beacon_disarms.saturating_add(session.beacon_disarms);
        self.proxy_placements = self.proxy_placements.saturating_add(session.proxy_placements);
        self.proxy_disarms = self.proxy_disarms.saturating_add(session.proxy_disarms);
    }

    /// Fold another block of totals into this one
    fn merge(&mut self, other: &LadderTotals) {
        self.score = self.score.saturating_add(other.score);
        self.kills = self.kills.saturating_add(other.kills);
        self.deaths = self.deaths.saturating_add(other.deaths);
        self.headshot_kills = self.headshot_kills.saturating_add(other.headshot_kills);
        self.vehicle_kills = self.vehicle_kills.saturating_add(other.vehicle_kills);
        self.building_kills = self.building_kills.saturating_add(other.building_kills);
        self.defence_kills = self.defence_kills.saturating_add(other.defence_kills);
        self.captures = self.captures.saturating_add(other.captures);
        self.game_time = self.game_time.saturating_add(other.game_time);
        self.games = self.games.saturating_add(other.games);
        self.wins = self.wins.saturating_add(other.wins);
        self.ties = self.ties.saturating_add(other.ties);
        self.beacon_placements = self.beacon_placements.saturating_add(other.beacon_placements);
        self.beacon_disarms = self.beacon_disarms.saturating_add(other.beacon_disarms);
        self.proxy_placements = self.proxy_placements.saturating_add(other.proxy_placements);
        self.proxy_disarms = self.proxy_disarms.saturating_add(other.proxy_disarms);
    }

    /// Losses (games neither won nor tied)
    pub fn losses(&self) -> u32 {
        self.games.saturating_sub(self.wins + self.ties)
    }

    pub fn kill_death_ratio(&self) -> f64 {
        if self.deaths == 0 {
            self.kills as f64
        } else {
            self.kills as f64 / self.deaths as f64
        }
    }

    fn read(reader: &mut RecordReader<'_>, prefix: &str) -> Result<Self> {
        let name = |field: &str| format!("{}{}", prefix, field);
        Ok(Self {
            score: reader.u64(&name("score"))?,
            kills: reader.u32(&name("kills"))?,
            deaths: reader.u32(&name("deaths"))?,
            headshot_kills: reader.u32(&name("headshot_kills"))?,
            vehicle_kills: reader.u32(&name("vehicle_kills"))?,
            building_kills: reader.u32(&name("building_kills"))?,
            defence_kills: reader.u32(&name("defence_kills"))?,
            captures: reader.u32(&name("captures"))?,
            game_time: reader.u32(&name("game_time"))?,
            games: reader.u32(&name("games"))?,
            wins: reader.u32(&name("wins"))?,
            ties: reader.u32(&name("ties"))?,
            beacon_placements: reader.u32(&name("beacon_placements"))?,
            beacon_disarms: reader.u32(&name("beacon_disarms"))?,
            proxy_placements: reader.u32(&name("proxy_placements"))?,
            proxy_disarms: reader.u32(&name("proxy_disarms"))?,
        })
    }

    fn write(&self, writer: &mut RecordWriter<'_>, prefix: &str) -> Result<()> {
        let name = |field: &str| format!("{}{}", prefix, field);
        writer.u64(&name("score"), self.score)?;
        writer.u32(&name("kills"), self.kills)?;
        writer.u32(&name("deaths"), self.deaths)?;
        writer.u32(&name("headshot_kills"), self.headshot_kills)?;
        writer.u32(&name("vehicle_kills"), self.vehicle_kills)?;
        writer.u32(&name("building_kills"), self.building_kills)?;
        writer.u32(&name("defence_kills"), self.defence_kills)?;
        writer.u32(&name("captures"), self.captures)?;
        writer.u32(&name("game_time"), self.game_time)?;
        writer.u32(&name("games"), self.games)?;
        writer.u32(&name("wins"), self.wins)?;
        writer.u32(&name("ties"), self.ties)?;
        writer.u32(&name("beacon_placements"), self.beacon_placements)?;
        writer.u32(&name("beacon_disarms"), self.beacon_disarms)?;
        writer.u32(&name("proxy_placements"), self.proxy_placements)?;
        writer.u32(&name("proxy_disarms"), self.proxy_disarms)
    }
}

/// Best single-match values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LadderPeaks {
    pub score: u64,
    pub kills: u32,
    pub deaths: u32,
    pub headshot_kills: u32,
    pub vehicle_kills: u32,
    pub building_kills: u32,
    pub defence_kills: u32,
    pub captures: u32,
    pub game_time: u32,
    pub beacon_placements: u32,
    pub beacon_disarms: u32,
    pub proxy_placements: u32,
    pub proxy_disarms: u32,
}

impl LadderPeaks {
    fn raise(&mut self, session: &Session) {
        self.score = self.score.max(session.score);
        self.kills = self.kills.max(session.kills);
        self.deaths = self.deaths.max(session.deaths);
        self.headshot_kills = self.headshot_kills.max(session.headshot_kills);
        self.vehicle_kills = self.vehicle_kills.max(session.vehicle_kills);
        self.building_kills = self.building_kills.max(session.building_kills);
        self.defence_kills = self.defence_kills.max(session.defence_kills);
        self.captures = self.captures.max(session.captures);
        self.game_time = self.game_time.max(session.game_time);
        self.beacon_placements = self.beacon_placements.max(session.beacon_placements);
        self.beacon_disarms = self.beacon_disarms.max(session.beacon_disarms);
        self.proxy_placements = self.proxy_placements.max(session.proxy_placements);
        self.proxy_disarms = self.proxy_disarms.max(session.proxy_disarms);
    }

    fn merge(&mut self, other: &LadderPeaks) {
        self.score = self.score.max(other.score);
        self.kills = self.kills.max(other.kills);
        self.deaths = self.deaths.max(other.deaths);
        self.headshot_kills = self.headshot_kills.max(other.headshot_kills);
        self.vehicle_kills = self.vehicle_kills.max(other.vehicle_kills);
        self.building_kills = self.building_kills.max(other.building_kills);
        self.defence_kills = self.defence_kills.max(other.defence_kills);
        self.captures = self.captures.max(other.captures);
        self.game_time = self.game_time.max(other.game_time);
        self.beacon_placements = self.beacon_placements.max(other.beacon_placements);
        self.beacon_disarms = self.beacon_disarms.max(other.beacon_disarms);
        self.proxy_placements = self.proxy_placements.max(other.proxy_placements);
        self.proxy_disarms = self.proxy_disarms.max(other.proxy_disarms);
    }
}

/// One account on the ladder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LadderEntry {
    pub account_id: u64,
    pub totals: LadderTotals,
    pub side_a: LadderTotals,
    pub side_b: LadderTotals,
    pub peaks: LadderPeaks,
    pub most_recent_ip: u32,

    /// Unix time of the last finalized match
    pub last_game: u64,
    pub most_recent_name: String,

    /// 1-based position, assigned by [`LadderStore::write`]
    pub rank: usize,
}

impl LadderEntry {
    pub fn new(account_id: u64) -> Self {
        Self {
            account_id,
            ..Self::default()
        }
    }

    /// Fold a second entry for the same account into this one
    ///
    /// Totals add up, peaks keep the larger value, and the most recent
    /// name/IP come from whichever entry played last.
    fn merge(&mut self, other: LadderEntry) {
        self.totals.merge(&other.totals);
        self.side_a.merge(&other.side_a);
        self.side_b.merge(&other.side_b);
        self.peaks.merge(&other.peaks);
        if other.last_game >= self.last_game {
            self.last_game = other.last_game;
            self.most_recent_name = other.most_recent_name;
            if other.most_recent_ip != 0 {
                self.most_recent_ip = other.most_recent_ip;
            }
        }
    }
}

impl Record for LadderEntry {
    const SCHEMA: &'static Schema = &LADDER_SCHEMA;

    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let account_id = reader.u64("account_id")?;
        let totals = LadderTotals::read(reader, "")?;
        let side_a = LadderTotals::read(reader, "a_")?;
        let side_b = LadderTotals::read(reader, "b_")?;
        let peaks = LadderPeaks {
            score: reader.u64("peak_score")?,
            kills: reader.u32("peak_kills")?,
            deaths: reader.u32("peak_deaths")?,
            headshot_kills: reader.u32("peak_headshot_kills")?,
            vehicle_kills: reader.u32("peak_vehicle_kills")?,
            building_kills: reader.u32("peak_building_kills")?,
            defence_kills: reader.u32("peak_defence_kills")?,
            captures: reader.u32("peak_captures")?,
            game_time: reader.u32("peak_game_time")?,
            beacon_placements: reader.u32("peak_beacon_placements")?,
            beacon_disarms: reader.u32("peak_beacon_disarms")?,
            proxy_placements: reader.u32("peak_proxy_placements")?,
            proxy_disarms: reader.u32("peak_proxy_disarms")?,
        };

        Ok(Self {
            account_id,
            totals,
            side_a,
            side_b,
            peaks,
            most_recent_ip: reader.u32("most_recent_ip")?,
            last_game: reader.u64("last_game")?,
            most_recent_name: reader.string("most_recent_name")?,
            rank: 0,
        })
    }

    fn write(&self, writer: &mut RecordWriter<'_>) -> Result<()> {
        writer.u64("account_id", self.account_id)?;
        self.totals.write(writer, "")?;
        self.side_a.write(writer, "a_")?;
        self.side_b.write(writer, "b_")?;

        let peaks = &self.peaks;
        writer.u64("peak_score", peaks.score)?;
        writer.u32("peak_kills", peaks.kills)?;
        writer.u32("peak_deaths", peaks.deaths)?;
        writer.u32("peak_headshot_kills", peaks.headshot_kills)?;
        writer.u32("peak_vehicle_kills", peaks.vehicle_kills)?;
        writer.u32("peak_building_kills", peaks.building_kills)?;
        writer.u32("peak_defence_kills", peaks.defence_kills)?;
        writer.u32("peak_captures", peaks.captures)?;
        writer.u32("peak_game_time", peaks.game_time)?;
        writer.u32("peak_beacon_placements", peaks.beacon_placements)?;
        writer.u32("peak_beacon_disarms", peaks.beacon_disarms)?;
        writer.u32("peak_proxy_placements", peaks.proxy_placements)?;
        writer.u32("peak_proxy_disarms", peaks.proxy_disarms)?;

        writer.u32("most_recent_ip", self.most_recent_ip)?;
        writer.u64("last_game", self.last_game)?;
        writer.string("most_recent_name", &self.most_recent_name)
    }
}

/// Ladder backed by a versioned file
#[derive(Debug)]
pub struct LadderStore {
    file: VersionedFile<LadderEntry>,
    entries: Vec<LadderEntry>,

    /// Entry indexes in descending score order
    order: Vec<usize>,

    /// Account id → entry index
    by_account: HashMap<u64, usize>,
}

impl LadderStore {
    /// Open (or create) the ladder file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (file, entries, outcome) = VersionedFile::open(path)?;
        if outcome != OpenOutcome::Loaded {
            tracing::info!("Ladder {}: {:?}", file.path().display(), outcome);
        }

        let loaded = entries.len();
        let mut store = Self {
            file,
            entries: Vec::with_capacity(loaded),
            order: Vec::with_capacity(loaded),
            by_account: HashMap::with_capacity(loaded),
        };
        for entry in entries {
            match store.by_account.get(&entry.account_id) {
                Some(&index) => store.entries[index].merge(entry),
                None => {
                    let index = store.entries.len();
                    store.by_account.insert(entry.account_id, index);
                    store.order.push(index);
                    store.entries.push(entry);
                }
            }
        }
        if store.entries.len() < loaded {
            tracing::warn!(
                "Ladder {}: merged {} duplicate account entries",
                store.file.path().display(),
                loaded - store.entries.len()
            );
        }
        store.sort_entries();
        store.assign_ranks();
        tracing::info!("Loaded {} ladder entries", store.entries.len());
        Ok(store)
    }

    /// Fold a finished match into the ladder
    ///
    /// Skips bots, players without an account and players banned from the
    /// ladder. Re-sorts afterwards; call [`LadderStore::write`] to persist.
    ///
    /// # Returns
    /// Number of players folded in
    pub fn update(&mut self, state: &GameState, winner: Option<Team>, tie: bool) -> usize {
        self.update_players(state.players(), state.match_started_at(), winner, tie)
    }

    /// [`LadderStore::update`] over an explicit player list
    pub fn update_players(
        &mut self,
        players: &[Player],
        match_started_at: Option<SystemTime>,
        winner: Option<Team>,
        tie: bool,
    ) -> usize {
        let now = SystemTime::now();
        let unix = unix_now();
        let mut folded = 0;

        for player in players {
            if player.is_bot || player.account_id == 0 || player.is_banned(BanFlags::LADDER) {
                continue;
            }

            let since = match match_started_at {
                Some(start) if start > player.joined_at => start,
                _ => player.joined_at,
            };
            let game_time = now.duration_since(since).map(|d| d.as_secs()).unwrap_or(0);
            let game_time = u32::try_from(game_time).unwrap_or(u32::MAX);

            let won = !tie && winner.is_some() && winner == Some(player.team);
            let session = Session::from_player(player, game_time, won, tie);

            let index = self.find_or_create(player.account_id);
            let entry = &mut self.entries[index];
            entry.totals.add(&session);
            match player.team {
                Team::SideA => entry.side_a.add(&session),
                Team::SideB => entry.side_b.add(&session),
                _ => {}
            }
            entry.peaks.raise(&session);
            entry.most_recent_name = player.name.clone();
            if player.ip32 != 0 {
                entry.most_recent_ip = player.ip32;
            }
            entry.last_game = unix;
            folded += 1;
        }

        self.sort_entries();
        tracing::info!("Ladder updated with {} players", folded);
        folded
    }

    fn find_or_create(&mut self, account_id: u64) -> usize {
        if let Some(&index) = self.by_account.get(&account_id) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(LadderEntry::new(account_id));
        self.order.push(index);
        self.by_account.insert(account_id, index);
        index
    }

    /// Re-sort by descending total score; equal scores keep their order
    pub fn sort_entries(&mut self) {
        let entries = &self.entries;
        self.order
            .sort_by(|a, b| entries[*b].totals.score.cmp(&entries[*a].totals.score));
    }

    fn assign_ranks(&mut self) {
        for (position, &index) in self.order.iter().enumerate() {
            self.entries[index].rank = position + 1;
        }
    }

    /// Persist the ladder in rank order, renumbering ranks 1..N
    pub fn write(&mut self) -> Result<()> {
        self.assign_ranks();
        let sorted: Vec<LadderEntry> = self.order.iter().map(|&i| self.entries[i].clone()).collect();
        self.file.rewrite(&sorted)?;
        tracing::debug!("Wrote {} ladder entries", sorted.len());
        Ok(())
    }

    /// Add an entry and append it to the file
    ///
    /// An entry for an account already on the ladder replaces it in memory;
    /// the file is rewritten on the next [`LadderStore::write`].
    pub fn append(&mut self, entry: LadderEntry) -> Result<()> {
        if let Some(&index) = self.by_account.get(&entry.account_id) {
            self.entries[index] = entry;
        } else {
            self.file.append(&entry)?;
            let index = self.entries.len();
            self.by_account.insert(entry.account_id, index);
            self.entries.push(entry);
            self.order.push(index);
        }
        self.sort_entries();
        self.assign_ranks();
        Ok(())
    }

    /// Remove every entry (file included)
    pub fn erase(&mut self) -> Result<()> {
        tracing::warn!("Erasing ladder ({} entries)", self.entries.len());
        self.entries.clear();
        self.order.clear();
        self.by_account.clear();
        self.file.rewrite(&[])
    }

    //=== Queries ===//

    pub fn get_by_id(&self, account_id: u64) -> Option<&LadderEntry> {
        self.by_account.get(&account_id).map(|&i| &self.entries[i])
    }

    /// Exact most-recent name (case-insensitive), best ranked first
    pub fn get_by_name(&self, name: &str) -> Option<&LadderEntry> {
        self.iter().find(|e| e.most_recent_name.eq_ignore_ascii_case(name))
    }

    /// Best ranked entry whose name contains `part` (case-insensitive)
    pub fn get_by_part_name(&self, part: &str) -> Option<&LadderEntry> {
        let part = part.to_lowercase();
        self.iter().find(|e| e.most_recent_name.to_lowercase().contains(&part))
    }

    /// Every entry whose name contains `part`, in rank order
    pub fn get_all_by_part_name(&self, part: &str) -> Vec<&LadderEntry> {
        let part = part.to_lowercase();
        self.iter()
            .filter(|e| e.most_recent_name.to_lowercase().contains(&part))
            .collect()
    }

    /// Entry at 1-based `rank`
    pub fn get_by_rank(&self, rank: usize) -> Option<&LadderEntry> {
        let position = rank.checked_sub(1)?;
        self.order.get(position).map(|&i| &self.entries[i])
    }

    /// Entries in rank order
    pub fn iter(&self) -> impl Iterator<Item = &LadderEntry> {
        self.order.iter().map(move |&i| &self.entries[i])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unix time of the newest finalized match on the ladder
    pub fn last_update(&self) -> Option<SystemTime> {
        self.entries
            .iter()
            .map(|e| e.last_game)
            .max()
            .filter(|t| *t != 0)
            .map(rcon_core::from_unix)
    }

    /// Seconds since the ladder was last written by a finalize
    pub fn age(&self) -> Option<u64> {
        self.last_update().map(|t| unix_now().saturating_sub(to_unix(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use rcon_core::PlayerId;
    use std::fs;
    use std::time::Duration;

    fn player(id: i32, name: &str, account_id: u64, team: Team, score: i32) -> Player {
        let mut player = Player::new(PlayerId::new(id), name);
        player.account_id = account_id;
        player.team = team;
        player.score = score;
        player.kills = (score / 100) as u32;
        player.joined_at = SystemTime::now() - Duration::from_secs(600);
        player
    }

    #[test]
    fn test_schema_layout() {
        assert_eq!(LADDER_SCHEMA.fields.len(), LADDER_FIELD_COUNT);
        assert_eq!(LADDER_SCHEMA.fields[1].name, "score");
        assert_eq!(LADDER_SCHEMA.fields[LADDER_FIELD_COUNT - 1].name, "most_recent_name");
        assert!(!LADDER_SCHEMA.has_field("ties", 0));
        assert!(!LADDER_SCHEMA.has_field("a_kills", 0));
        assert!(LADDER_SCHEMA.has_field("b_ties", 1));
        assert_eq!(LADDER_SCHEMA.fixed_offset("score", 1), Some(8));
    }

    #[test]
    fn test_update_sort_and_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.db");
        let mut ladder = LadderStore::open(&path).unwrap();

        let mut bot = player(9, "Bot", 900, Team::SideB, 5000);
        bot.is_bot = true;
        let mut excluded = player(10, "Cheater", 1000, Team::SideB, 9000);
        excluded.ban_flags = BanFlags::LADDER;
        let players = vec![
            player(1, "Alice", 100, Team::SideA, 300),
            player(2, "Bob", 200, Team::SideB, 700),
            player(3, "Carol", 300, Team::SideA, 300),
            player(4, "Guest", 0, Team::SideA, 9999),
            bot,
            excluded,
        ];

        assert_eq!(ladder.update_players(&players, None, Some(Team::SideA), false), 3);
        let more = vec![player(5, "Dave", 400, Team::SideB, 500), player(1, "Alice", 100, Team::SideA, 100)];
        ladder.update_players(&more, None, Some(Team::SideB), false);
        ladder.write().unwrap();

        let scores: Vec<u64> = ladder.iter().map(|e| e.totals.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        let ranks: Vec<usize> = ladder.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, (1..=ladder.len()).collect::<Vec<_>>());

        // Alice (400) sorted ahead of Carol (300); Bob (700) and Dave (500) lead
        let names: Vec<&str> = ladder.iter().map(|e| e.most_recent_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Dave", "Alice", "Carol"]);

        let alice = ladder.get_by_id(100).unwrap();
        assert_eq!(alice.totals.games, 2);
        assert_eq!(alice.totals.wins, 1);
        assert_eq!(alice.side_a.games, 2);
        assert_eq!(alice.side_b.games, 0);
        assert_eq!(alice.peaks.score, 300);
        assert!(alice.totals.game_time >= 1200);
        assert!(ladder.get_by_id(0).is_none());
        assert!(ladder.get_by_id(900).is_none());
        assert!(ladder.get_by_id(1000).is_none());
    }

    #[test]
    fn test_equal_scores_keep_prior_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ladder = LadderStore::open(dir.path().join("ladder.db")).unwrap();
        let players = vec![
            player(1, "First", 1, Team::SideA, 100),
            player(2, "Second", 2, Team::SideA, 100),
            player(3, "Third", 3, Team::SideA, 100),
        ];
        ladder.update_players(&players, None, None, true);
        let names: Vec<&str> = ladder.iter().map(|e| e.most_recent_name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(ladder.get_by_id(2).map(|e| e.totals.ties), Some(1));
    }

    #[test]
    fn test_queries_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.db");
        {
            let mut ladder = LadderStore::open(&path).unwrap();
            ladder.update_players(
                &[
                    player(1, "Alice", 100, Team::SideA, 300),
                    player(2, "Alicia", 200, Team::SideB, 500),
                    player(3, "Bob", 300, Team::SideB, 100),
                ],
                None,
                Some(Team::SideB),
                false,
            );
            ladder.write().unwrap();
        }

        let ladder = LadderStore::open(&path).unwrap();
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder.get_by_rank(1).map(|e| e.account_id), Some(200));
        assert_eq!(ladder.get_by_rank(0), None);
        assert_eq!(ladder.get_by_rank(4), None);
        assert_eq!(ladder.get_by_name("alice").map(|e| e.rank), Some(2));
        assert_eq!(ladder.get_by_part_name("ALI").map(|e| e.account_id), Some(200));
        assert_eq!(ladder.get_all_by_part_name("ali").len(), 2);
        assert!(ladder.get_by_name("Carol").is_none());
        assert!(ladder.last_update().is_some());
    }

    #[test]
    fn test_append_and_erase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.db");
        let mut ladder = LadderStore::open(&path).unwrap();

        let mut imported = LadderEntry::new(55);
        imported.totals.score = 1000;
        imported.most_recent_name = "Imported".into();
        ladder.append(imported).unwrap();
        assert_eq!(ladder.get_by_rank(1).map(|e| e.account_id), Some(55));

        let reopened = LadderStore::open(&path).unwrap();
        assert_eq!(reopened.get_by_id(55).map(|e| e.totals.score), Some(1000));

        ladder.erase().unwrap();
        assert!(ladder.is_empty());
        assert_eq!(fs::read(&path).unwrap(), vec![LADDER_SCHEMA.current]);
    }

    #[test]
    fn test_duplicate_accounts_merge_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.db");
        {
            let (mut file, _, _) = VersionedFile::<LadderEntry>::open(&path).unwrap();

            let mut old = LadderEntry::new(42);
            old.totals.score = u64::MAX - 10;
            old.totals.games = 3;
            old.peaks.kills = 9;
            old.last_game = 1_600_000_000;
            old.most_recent_name = "OldName".into();
            old.most_recent_ip = 0x0A00_0001;
            file.append(&old).unwrap();

            let mut other = LadderEntry::new(7);
            other.totals.score = 50;
            file.append(&other).unwrap();

            let mut new = LadderEntry::new(42);
            new.totals.score = 100;
            new.totals.games = 2;
            new.peaks.kills = 4;
            new.last_game = 1_700_000_000;
            new.most_recent_name = "NewName".into();
            file.append(&new).unwrap();
        }

        let ladder = LadderStore::open(&path).unwrap();
        assert_eq!(ladder.len(), 2);

        let merged = ladder.get_by_id(42).unwrap();
        assert_eq!(merged.totals.score, u64::MAX);
        assert_eq!(merged.totals.games, 5);
        assert_eq!(merged.peaks.kills, 9);
        assert_eq!(merged.last_game, 1_700_000_000);
        assert_eq!(merged.most_recent_name, "NewName");
        assert_eq!(merged.most_recent_ip, 0x0A00_0001);
        assert_eq!(merged.rank, 1);
        assert_eq!(ladder.get_by_rank(2).map(|e| e.account_id), Some(7));
        assert_eq!(ladder.get_by_name("OldName").map(|e| e.account_id), None);
    }

    #[test]
    fn test_totals_saturate() {
        let mut totals = LadderTotals {
            kills: u32::MAX - 1,
            games: u32::MAX,
            ..LadderTotals::default()
        };
        let session = Session {
            kills: 5,
            won: true,
            ..Session::default()
        };
        totals.add(&session);
        assert_eq!(totals.kills, u32::MAX);
        assert_eq!(totals.games, u32::MAX);
        assert_eq!(totals.wins, 1);
    }

    /// A version 0 record: global totals without ties, then peaks
    fn v0_record(account_id: u64, name: &str, score: u64, games: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u64_le(account_id);
        buf.put_u64_le(score);
        // kills..captures, game_time
        for value in [10u32, 5, 2, 1, 0, 0, 3, 3600] {
            buf.put_u32_le(value);
        }
        buf.put_u32_le(games);
        buf.put_u32_le(games / 2);
        for _ in 0..4 {
            buf.put_u32_le(0);
        }
        buf.put_u64_le(score / 2);
        for _ in 0..12 {
            buf.put_u32_le(1);
        }
        buf.put_u32_le(0x0A00_0001);
        buf.put_u64_le(1_600_000_000);
        buf.put_u32_le(name.len() as u32);
        buf.put_slice(name.as_bytes());
        buf
    }

    #[test]
    fn test_v0_upgrade_gains_team_fields_from_one_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ladder.db");
        let mut data = vec![0u8];
        data.extend_from_slice(&v0_record(100, "Alice", 5000, 20));
        data.extend_from_slice(&v0_record(200, "Bob", 8000, 30));
        fs::write(&path, &data).unwrap();

        let mut ladder = LadderStore::open(&path).unwrap();
        let alice = ladder.get_by_id(100).unwrap();
        assert_eq!(alice.totals.games, 20);
        assert_eq!(alice.totals.wins, 10);
        assert_eq!(alice.totals.ties, 0);
        assert_eq!(alice.side_a, LadderTotals::default());
        assert_eq!(alice.peaks.score, 2500);
        assert_eq!(ladder.get_by_rank(1).map(|e| e.account_id), Some(200));

        ladder.update_players(&[player(1, "Alice", 100, Team::SideA, 4000)], None, Some(Team::SideA), false);
        ladder.write().unwrap();

        assert_eq!(fs::read(&path).unwrap()[0], LADDER_SCHEMA.current);
        let reloaded = LadderStore::open(&path).unwrap();
        let alice = reloaded.get_by_id(100).unwrap();
        assert_eq!(alice.totals.score, 9000);
        assert_eq!(alice.totals.games, 21);
        assert_eq!(alice.side_a.games, 1);
        assert_eq!(alice.side_a.wins, 1);
        assert_eq!(alice.side_a.score, 4000);
        assert_eq!(alice.side_b, LadderTotals::default());
        assert_eq!(alice.peaks.score, 4000);
        assert_eq!(alice.rank, 1);
        assert_eq!(reloaded.get_by_id(200).map(|e| e.rank), Some(2));
    }
}
