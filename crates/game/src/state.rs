//! # Game State
//!
//! The live model of one server and the reducer that keeps it current.
//!
//! # Reducer Contract
//! [`GameState::apply`] takes one classified log line, mutates the model
//! and returns the events it produced, in order. It never fails: lines that
//! reference unknown players create them, lines that change nothing return
//! no events.
//!
//! # Player Ids
//! Ids are reused by the server. Every lookup by id only sees currently
//! connected players, so a departed player's id never resolves to them.

use crate::building::Building;
use crate::events::{GameEvent, Milestone};
use crate::map::Map;
use crate::player::Player;
use crate::roster::ResponseTable;
use rcon_core::{PlayerId, Team};
use rcon_protocol::{parse_account_id, parse_number, LogLine, ObjectKind, PlayerRef};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Match-phase flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchPhase {
    /// Map loaded, match not started yet
    pub pending: bool,
    pub in_progress: bool,
    pub over: bool,
    /// Server is changing maps
    pub travelling: bool,
}

/// How the last match ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: Option<Team>,
    pub tie: bool,
    pub reason: String,
    pub score_a: i64,
    pub score_b: i64,
}

/// Live model of one server
#[derive(Debug, Default)]
pub struct GameState {
    players: Vec<Player>,
    buildings: Vec<Building>,
    map: Map,
    rotation: Vec<Map>,
    game_info: BTreeMap<String, String>,
    phase: MatchPhase,
    match_started_at: Option<SystemTime>,
    last_outcome: Option<MatchOutcome>,

    first_kill: bool,
    first_death: bool,
    first_action: bool,
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn is_beacon(object: &str) -> bool {
    object.contains("Beacon")
}

fn is_mine(object: &str) -> bool {
    object.contains("Mine") || object.contains("Proxy")
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    //=== Queries ===//

    /// Currently connected players, in join order
    #[inline]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[inline]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players on `team`
    pub fn team_count(&self, team: Team) -> usize {
        self.players.iter().filter(|p| p.team == team).count()
    }

    /// Look up a connected player by id
    ///
    /// # Returns
    /// `None` when no currently connected player has this id
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Look up a connected player by exact name (case-insensitive)
    pub fn get_player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Connected players whose name contains `part` (case-insensitive)
    pub fn find_players_by_part_name(&self, part: &str) -> Vec<&Player> {
        let part = part.to_lowercase();
        self.players
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&part))
            .collect()
    }

    pub fn get_player_by_account(&self, account_id: u64) -> Option<&Player> {
        if account_id == 0 {
            return None;
        }
        self.players.iter().find(|p| p.account_id == account_id)
    }

    #[inline]
    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn get_building(&self, name: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn map(&self) -> &Map {
        &self.map
    }

    #[inline]
    pub fn rotation(&self) -> &[Map] {
        &self.rotation
    }

    /// Whether a map is in the rotation (case-insensitive)
    pub fn is_in_rotation(&self, name: &str) -> bool {
        self.rotation.iter().any(|m| m.is(name))
    }

    /// Value from the last `gameinfo` response
    pub fn game_info(&self, key: &str) -> Option<&str> {
        self.game_info
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    #[inline]
    pub fn match_started_at(&self) -> Option<SystemTime> {
        self.match_started_at
    }

    #[inline]
    pub fn last_outcome(&self) -> Option<&MatchOutcome> {
        self.last_outcome.as_ref()
    }

    /// Whether a milestone has fired in the current match
    pub fn milestone_reached(&self, milestone: Milestone) -> bool {
        match milestone {
            Milestone::FirstKill => self.first_kill,
            Milestone::FirstDeath => self.first_death,
            Milestone::FirstAction => self.first_action,
        }
    }

    //=== Lifecycle ===//

    /// Drop all players and buildings (full reconnect)
    pub fn wipe(&mut self) {
        tracing::debug!("Wiping {} players, {} buildings", self.players.len(), self.buildings.len());
        self.players.clear();
        self.buildings.clear();
        self.phase = MatchPhase::default();
    }

    /// Mark the server as travelling (map change without a log line)
    pub fn set_travelling(&mut self, travelling: bool) {
        self.phase.travelling = travelling;
    }

    fn reset_latches(&mut self) {
        self.first_kill = false;
        self.first_death = false;
        self.first_action = false;
    }

    fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    /// Find the player a token refers to, creating it when unknown
    fn touch(&mut self, token: &PlayerRef) -> usize {
        if let Some(index) = self.index_of(token.id) {
            let player = &mut self.players[index];
            if token.team != Team::None {
                player.team = token.team;
            }
            return index;
        }

        tracing::debug!("Creating player {} ({}) from log token", token.id, token.name);
        self.players.push(Player::from_ref(token));
        self.players.len() - 1
    }

    fn snapshot(&self, index: usize) -> Player {
        self.players[index].clone()
    }

    /// Fire a latch once per match
    fn latch(&mut self, milestone: Milestone, index: usize, events: &mut Vec<GameEvent>) {
        let flag = match milestone {
            Milestone::FirstKill => &mut self.first_kill,
            Milestone::FirstDeath => &mut self.first_death,
            Milestone::FirstAction => &mut self.first_action,
        };
        if *flag {
            return;
        }
        *flag = true;
        events.push(GameEvent::Milestone {
            milestone,
            player: self.snapshot(index),
        });
    }

    //=== Reducer ===//

    /// Apply one classified log line
    ///
    /// # Returns
    /// The events produced, in order (empty for unknown lines)
    pub fn apply(&mut self, line: &LogLine) -> Vec<GameEvent> {
        let mut events = Vec::new();

        match line {
            //=== PLAYER ===//
            LogLine::PlayerEnter { player, ip, hwid, account_id } => {
                if let Some(stale) = self.index_of(player.id) {
                    tracing::debug!("Dropping stale player record for id {}", player.id);
                    self.players.remove(stale);
                }
                let mut created = Player::from_ref(player);
                created.set_ip(ip);
                created.hwid = hwid.clone();
                created.account_id = *account_id;
                self.players.push(created.clone());
                events.push(GameEvent::PlayerJoin { player: created });
            }
            LogLine::PlayerExit { player } => {
                let departed = match self.index_of(player.id) {
                    Some(index) => self.players.remove(index),
                    None => Player::from_ref(player),
                };
                events.push(GameEvent::PlayerPart { player: departed });
            }
            LogLine::PlayerKick { player, reason } => {
                let index = self.touch(player);
                events.push(GameEvent::PlayerKick {
                    player: self.snapshot(index),
                    reason: reason.clone(),
                });
            }
            LogLine::TeamJoin { player, new_team, old_team } => {
                let index = self.touch(player);
                let previous = self.players[index].team;
                self.players[index].team = *new_team;
                events.push(GameEvent::TeamChange {
                    player: self.snapshot(index),
                    old_team: old_team.unwrap_or(previous),
                });
            }
            LogLine::NameChange { player, new_name } => {
                let index = self.touch(player);
                let old_name = std::mem::replace(&mut self.players[index].name, new_name.clone());
                events.push(GameEvent::NameChange {
                    player: self.snapshot(index),
                    old_name,
                });
            }
            LogLine::IdChange { old_id, new_id } => {
                if let Some(index) = self.index_of(*old_id) {
                    self.players[index].id = *new_id;
                    events.push(GameEvent::IdChange {
                        player: self.snapshot(index),
                        old_id: *old_id,
                    });
                }
            }

            //=== GAME ===//
            LogLine::Kill { killer, victim, damage_type } => {
                let killer_index = self.touch(killer);
                let victim_index = self.touch(victim);
                {
                    let player = &mut self.players[killer_index];
                    player.kills += 1;
                    if damage_type.contains("Headshot") {
                        player.headshots += 1;
                    }
                }
                self.players[victim_index].deaths += 1;
                events.push(GameEvent::Kill {
                    killer: self.snapshot(killer_index),
                    victim: self.snapshot(victim_index),
                    damage_type: damage_type.clone(),
                });
                self.latch(Milestone::FirstKill, killer_index, &mut events);
                self.latch(Milestone::FirstDeath, victim_index, &mut events);
                self.latch(Milestone::FirstAction, killer_index, &mut events);
            }
            LogLine::Death { victim, killer, damage_type } => {
                let index = self.touch(victim);
                self.players[index].deaths += 1;
                events.push(GameEvent::Death {
                    victim: self.snapshot(index),
                    killer: killer.clone(),
                    damage_type: damage_type.clone(),
                });
                self.latch(Milestone::FirstDeath, index, &mut events);
            }
            LogLine::Suicide { player, damage_type } => {
                let index = self.touch(player);
                self.players[index].suicides += 1;
                self.players[index].deaths += 1;
                events.push(GameEvent::Suicide {
                    player: self.snapshot(index),
                    damage_type: damage_type.clone(),
                });
                self.latch(Milestone::FirstDeath, index, &mut events);
            }
            LogLine::Destroyed { kind, object, killer, killer_name, damage_type } => {
                if *kind == ObjectKind::Building {
                    if let Some(building) = self.buildings.iter_mut().find(|b| b.name.eq_ignore_ascii_case(object)) {
                        building.destroyed = true;
                        building.health = 0;
                        building.armor = 0;
                    }
                }

                let index = killer.as_ref().map(|k| self.touch(k));
                if let Some(index) = index {
                    let player = &mut self.players[index];
                    match kind {
                        ObjectKind::Vehicle => player.vehicle_kills += 1,
                        ObjectKind::Defence | ObjectKind::Emplacement => player.defence_kills += 1,
                        ObjectKind::Building => player.building_kills += 1,
                        ObjectKind::Other => {}
                    }
                }
                events.push(GameEvent::Destroy {
                    kind: *kind,
                    object: object.clone(),
                    killer: index.map(|i| self.snapshot(i)),
                    killer_name: killer_name.clone(),
                    damage_type: damage_type.clone(),
                });
                if let Some(index) = index {
                    self.latch(Milestone::FirstAction, index, &mut events);
                }
            }
            LogLine::Captured { player, building, old_team } | LogLine::Neutralized { player, building, old_team } => {
                let captured = matches!(line, LogLine::Captured { .. });
                let index = self.touch(player);
                let new_team = if captured { self.players[index].team } else { Team::None };
                if captured {
                    self.players[index].captures += 1;
                }
                if let Some(entry) = self.buildings.iter_mut().find(|b| b.name.eq_ignore_ascii_case(building)) {
                    entry.team = new_team;
                }

                let snapshot = self.snapshot(index);
                events.push(if captured {
                    GameEvent::Capture { player: snapshot, building: building.clone(), old_team: *old_team }
                } else {
                    GameEvent::Neutralize { player: snapshot, building: building.clone(), old_team: *old_team }
                });
                self.latch(Milestone::FirstAction, index, &mut events);
            }
            LogLine::Deployed { player, object } => {
                let index = self.touch(player);
                if is_beacon(object) {
                    self.players[index].beacon_placements += 1;
                } else if is_mine(object) {
                    self.players[index].mine_placements += 1;
                }
                events.push(GameEvent::Deploy {
                    player: self.snapshot(index),
                    object: object.clone(),
                });
                self.latch(Milestone::FirstAction, index, &mut events);
            }
            LogLine::Disarmed { player, object, owner } => {
                let index = self.touch(player);
                if is_beacon(object) {
                    self.players[index].beacon_disarms += 1;
                } else if is_mine(object) {
                    self.players[index].mine_disarms += 1;
                }
                let owner = owner.as_ref().map(|o| {
                    let owner_index = self.touch(o);
                    self.snapshot(owner_index)
                });
                events.push(GameEvent::Disarm {
                    player: self.snapshot(index),
                    object: object.clone(),
                    owner,
                });
                self.latch(Milestone::FirstAction, index, &mut events);
            }
            LogLine::MatchStart { map } => {
                self.reset_latches();
                self.phase = MatchPhase {
                    in_progress: true,
                    ..MatchPhase::default()
                };
                self.match_started_at = Some(SystemTime::now());
                for player in &mut self.players {
                    player.reset_match_stats();
                }
                if !map.is_empty() && !self.map.is(map) {
                    self.map = Map::new(map.clone());
                }
                events.push(GameEvent::MatchStart { map: map.clone() });
            }
            LogLine::MatchEnd { winner, tie, reason, score_a, score_b } => {
                self.phase.in_progress = false;
                self.phase.over = true;
                self.last_outcome = Some(MatchOutcome {
                    winner: *winner,
                    tie: *tie,
                    reason: reason.clone(),
                    score_a: *score_a,
                    score_b: *score_b,
                });
                events.push(GameEvent::MatchEnd {
                    winner: *winner,
                    tie: *tie,
                    reason: reason.clone(),
                    score_a: *score_a,
                    score_b: *score_b,
                });
            }

            //=== CHAT ===//
            LogLine::Chat { player, message } => {
                let index = self.touch(player);
                events.push(GameEvent::Chat {
                    player: self.snapshot(index),
                    message: message.clone(),
                });
            }
            LogLine::TeamChat { player, message } => {
                let index = self.touch(player);
                events.push(GameEvent::TeamChat {
                    player: self.snapshot(index),
                    message: message.clone(),
                });
            }
            LogLine::HostChat { message } => {
                events.push(GameEvent::HostChat { message: message.clone() });
            }

            //=== VOTE ===//
            LogLine::VoteCalled { team, vote_type, player, params } => {
                let player = player.as_ref().map(|p| {
                    let index = self.touch(p);
                    self.snapshot(index)
                });
                events.push(GameEvent::VoteCall {
                    team: *team,
                    vote_type: vote_type.clone(),
                    player,
                    params: params.clone(),
                });
            }
            LogLine::VoteResults { team, vote_type, passed, yes, no } => {
                events.push(GameEvent::VoteResult {
                    team: *team,
                    vote_type: vote_type.clone(),
                    passed: *passed,
                    yes: *yes,
                    no: *no,
                });
            }
            LogLine::VoteCancelled { team, vote_type } => {
                events.push(GameEvent::VoteCancel {
                    team: *team,
                    vote_type: vote_type.clone(),
                });
            }

            //=== MAP ===//
            LogLine::MapChanging { map, seamless } => {
                self.phase.travelling = true;
                self.phase.in_progress = false;
                self.buildings.clear();
                events.push(GameEvent::MapChange {
                    map: map.clone(),
                    seamless: *seamless,
                });
            }
            LogLine::MapLoaded { map } => {
                self.phase.travelling = false;
                self.phase.pending = true;
                self.map = self.lookup_map(map);
                events.push(GameEvent::MapLoad { map: self.map.clone() });
            }
            LogLine::MapStart { map } => {
                self.reset_latches();
                self.phase.travelling = false;
                self.phase.pending = true;
                self.phase.over = false;
                self.map = self.lookup_map(map);
                events.push(GameEvent::MapStart { map: self.map.clone() });
            }

            //=== RCON ===//
            LogLine::RconCommand { user, command } => {
                events.push(GameEvent::RconCommand {
                    user: user.clone(),
                    command: command.clone(),
                });
            }
            LogLine::RconSubscribed { user } => {
                events.push(GameEvent::RconSubscribed { user: user.clone() });
            }
            LogLine::RconUnsubscribed { user } => {
                events.push(GameEvent::RconUnsubscribed { user: user.clone() });
            }

            //=== ADMIN ===//
            LogLine::AdminLogin { player, level } | LogLine::AdminGranted { player, level } => {
                let index = self.touch(player);
                self.players[index].admin_level = Some(level.clone());
                let snapshot = self.snapshot(index);
                events.push(if matches!(line, LogLine::AdminLogin { .. }) {
                    GameEvent::AdminLogin { player: snapshot, level: level.clone() }
                } else {
                    GameEvent::AdminGrant { player: snapshot, level: level.clone() }
                });
            }
            LogLine::AdminLogout { player, level } => {
                let index = self.touch(player);
                self.players[index].admin_level = None;
                events.push(GameEvent::AdminLogout {
                    player: self.snapshot(index),
                    level: level.clone(),
                });
            }

            LogLine::Unknown { .. } => {}
        }

        events
    }

    /// Rotation entry for `name`, keeping its GUID when known
    fn lookup_map(&self, name: &str) -> Map {
        self.rotation
            .iter()
            .find(|m| m.is(name))
            .cloned()
            .unwrap_or_else(|| Map::new(name))
    }

    //=== Response tables ===//

    /// Apply a response block by its command verb
    pub fn apply_table(&mut self, table: &ResponseTable) -> Vec<GameEvent> {
        match table.verb().as_str() {
            "clientvarlist" => self.apply_roster(table),
            "binfo" => {
                self.apply_buildings(table);
                Vec::new()
            }
            "gameinfo" => {
                self.apply_game_info(table);
                Vec::new()
            }
            "rotation" => {
                self.apply_rotation(table);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Apply a full `clientvarlist` roster
    ///
    /// # Process
    /// 1. Update known players from their row
    /// 2. Create players the model has not seen (`PlayerDiscovered`)
    /// 3. Drop players missing from the roster
    pub fn apply_roster(&mut self, table: &ResponseTable) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if table.column("ID").is_none() && table.column("PlayerID").is_none() {
            return events;
        }

        let mut seen = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let raw_id = table
                .get(row, "ID")
                .or_else(|| table.get(row, "PlayerID"))
                .unwrap_or_default()
                .trim();
            let (is_bot, digits) = match raw_id.strip_prefix('b') {
                Some(rest) => (true, rest),
                None => (false, raw_id),
            };
            let Ok(id) = digits.parse::<i32>() else {
                continue;
            };
            let id = PlayerId::new(id);
            seen.push(id);

            let is_new = self.index_of(id).is_none();
            if is_new {
                let mut created = Player::new(id, table.get(row, "Name").unwrap_or_default());
                created.is_bot = is_bot;
                self.players.push(created);
            }
            let Some(player) = self.get_player_mut(id) else {
                continue;
            };

            if let Some(name) = table.get(row, "Name").filter(|n| !n.is_empty()) {
                player.name = name.to_string();
            }
            if let Some(team) = table.get(row, "Team") {
                player.team = Team::from_wire(team);
            }
            if let Some(v) = table.get(row, "Kills") {
                player.kills = parse_number(v);
            }
            if let Some(v) = table.get(row, "Deaths") {
                player.deaths = parse_number(v);
            }
            if let Some(v) = table.get(row, "Score") {
                player.score = parse_number(v);
            }
            if let Some(v) = table.get(row, "Credits") {
                player.credits = parse_number(v);
            }
            if let Some(v) = table.get(row, "Ping") {
                player.ping = parse_number(v);
            }
            if let Some(v) = table.get(row, "IP").filter(|v| !v.is_empty()) {
                player.set_ip(v);
            }
            if let Some(v) = table.get(row, "HWID").filter(|v| !v.is_empty()) {
                player.hwid = v.to_string();
            }
            if let Some(v) = table.get(row, "Steam") {
                player.account_id = parse_account_id(v);
            }
            if let Some(v) = table.get(row, "Admin").filter(|v| !v.is_empty() && *v != "None") {
                player.admin_level = Some(v.to_string());
            }
            if let Some(v) = table.get(row, "IsBot") {
                player.is_bot = parse_bool(v);
            }

            if is_new {
                events.push(GameEvent::PlayerDiscovered { player: player.clone() });
            }
        }

        let before = self.players.len();
        self.players.retain(|p| seen.contains(&p.id));
        if self.players.len() != before {
            tracing::debug!("Roster dropped {} departed players", before - self.players.len());
        }

        events
    }

    /// Replace the building list from a `binfo` response
    pub fn apply_buildings(&mut self, table: &ResponseTable) {
        let mut buildings = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let Some(name) = table.get(row, "Building").filter(|n| !n.is_empty()) else {
                continue;
            };
            let mut building = Building::new(name, Team::from_wire(table.get(row, "Team").unwrap_or_default()));
            building.health = table.get(row, "Health").map(parse_number).unwrap_or(0);
            building.max_health = table.get(row, "MaxHealth").map(parse_number).unwrap_or(0);
            building.armor = table.get(row, "Armor").map(parse_number).unwrap_or(0);
            building.max_armor = table.get(row, "MaxArmor").map(parse_number).unwrap_or(0);
            building.capturable = table.get(row, "Capturable").map(parse_bool).unwrap_or(false);
            building.destroyed = table.get(row, "Destroyed").map(parse_bool).unwrap_or(false);
            buildings.push(building);
        }
        self.buildings = buildings;
    }

    /// Store the key/value pairs of a `gameinfo` response
    pub fn apply_game_info(&mut self, table: &ResponseTable) {
        let Some(row) = table.rows.first() else {
            return;
        };
        self.game_info = table
            .header
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();

        if let Some(map) = self.game_info("Map").filter(|m| !m.is_empty()).map(str::to_string) {
            if !self.map.is(&map) {
                self.map = self.lookup_map(&map);
            }
        }
        if let Some(in_progress) = self.game_info("bIsMatchInProgress").map(parse_bool) {
            self.phase.in_progress = in_progress;
            if in_progress && self.match_started_at.is_none() {
                self.match_started_at = Some(SystemTime::now());
            }
        }
    }

    /// Replace the rotation from a `rotation` response
    pub fn apply_rotation(&mut self, table: &ResponseTable) {
        let name_column = table.column("Name").or_else(|| table.column("Map")).unwrap_or(0);
        self.rotation = table
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.get(name_column)?.trim();
                if name.is_empty() {
                    return None;
                }
                let guid = table.get(row, "GUID").and_then(Map::parse_guid).unwrap_or([0, 0]);
                Some(Map::with_guid(name, guid))
            })
            .collect();

        if let Some(current) = self.rotation.iter().find(|m| m.is(&self.map.name)) {
            self.map.guid = current.guid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_protocol::{classify_log, Command, DELIMITER_V3};

    fn line(raw: &[u8]) -> LogLine {
        classify_log(&Command::parse(raw, DELIMITER_V3).unwrap())
    }

    fn table(command: &str, rows: &[&[&str]]) -> ResponseTable {
        let mut table = ResponseTable::new(command);
        for row in rows {
            table.push(row.iter().map(|v| v.to_string()).collect());
        }
        table
    }

    #[test]
    fn test_id_reuse_never_resolves_departed_player() {
        let mut state = GameState::new();

        let events = state.apply(&line(b"lPLAYER\x02Enter;\x02GDI,3,Alice\x02from\x0210.0.0.1"));
        assert!(matches!(events.as_slice(), [GameEvent::PlayerJoin { .. }]));
        assert_eq!(state.get_player(PlayerId::new(3)).map(|p| p.name.as_str()), Some("Alice"));

        let events = state.apply(&line(b"lPLAYER\x02Exit;\x02GDI,3,Alice"));
        assert!(matches!(events.as_slice(), [GameEvent::PlayerPart { player }] if player.name == "Alice"));
        assert!(state.get_player(PlayerId::new(3)).is_none());

        state.apply(&line(b"lPLAYER\x02Enter;\x02Nod,3,Bob\x02from\x0210.0.0.2"));
        let reused = state.get_player(PlayerId::new(3)).unwrap();
        assert_eq!(reused.name, "Bob");
        assert_eq!(reused.ip, "10.0.0.2");
        assert_eq!(state.player_count(), 1);
    }

    #[test]
    fn test_milestones_fire_once_per_match() {
        let mut state = GameState::new();
        state.apply(&line(b"lGAME\x02MatchStart;\x02CNC-Field"));
        let kill = line(b"lGAME\x02Death;\x02player\x02Nod,4,Bob\x02by\x02GDI,3,Alice\x02with\x02Rx_DmgType_Headshot");

        let first = state.apply(&kill);
        let milestones: Vec<Milestone> = first
            .iter()
            .filter_map(|e| match e {
                GameEvent::Milestone { milestone, .. } => Some(*milestone),
                _ => None,
            })
            .collect();
        assert_eq!(milestones, vec![Milestone::FirstKill, Milestone::FirstDeath, Milestone::FirstAction]);

        let second = state.apply(&kill);
        assert_eq!(second.len(), 1);
        assert!(matches!(&second[0], GameEvent::Kill { killer, .. } if killer.kills == 2 && killer.headshots == 2));

        state.apply(&line(b"lGAME\x02MatchStart;\x02CNC-Field"));
        assert!(!state.milestone_reached(Milestone::FirstKill));
        assert_eq!(state.apply(&kill).len(), 4);
    }

    #[test]
    fn test_unknown_tokens_create_players() {
        let mut state = GameState::new();
        let events = state.apply(&line(b"lCHAT\x02Say;\x02GDI,7,Carol\x02said:\x02hello"));
        assert!(matches!(&events[0], GameEvent::Chat { player, message } if player.name == "Carol" && message == "hello"));
        assert_eq!(state.get_player(PlayerId::new(7)).map(|p| p.team), Some(Team::SideA));
    }

    #[test]
    fn test_capture_and_destroy_update_buildings() {
        let mut state = GameState::new();
        state.apply_buildings(&table(
            "binfo",
            &[
                &["Building", "Health", "MaxHealth", "Armor", "MaxArmor", "Team", "Capturable", "Destroyed"],
                &["Rx_Building_Silo", "500", "500", "0", "0", "", "True", "False"],
                &["Rx_Building_Refinery_Nod", "2000", "2000", "2000", "2000", "Nod", "False", "False"],
            ],
        ));
        assert_eq!(state.buildings().len(), 2);

        state.apply(&line(b"lGAME\x02Captured;\x02Neutral,Rx_Building_Silo\x02by\x02GDI,3,Alice"));
        assert_eq!(state.get_building("Rx_Building_Silo").map(|b| b.team), Some(Team::SideA));
        assert_eq!(state.get_player(PlayerId::new(3)).map(|p| p.captures), Some(1));

        state.apply(&line(
            b"lGAME\x02Destroyed;\x02building\x02Rx_Building_Refinery_Nod\x02by\x02GDI,3,Alice\x02with\x02Rx_DmgType_Nuke",
        ));
        assert!(state.get_building("Rx_Building_Refinery_Nod").map(|b| b.destroyed).unwrap_or(false));
        assert_eq!(state.get_player(PlayerId::new(3)).map(|p| p.building_kills), Some(1));
    }

    #[test]
    fn test_roster_discovers_updates_and_drops() {
        let mut state = GameState::new();
        state.apply(&line(b"lPLAYER\x02Enter;\x02GDI,9,Gone\x02from\x0210.0.0.9"));

        let events = state.apply_table(&table(
            "clientvarlist ID Name Team Score Credits Ping Steam IP",
            &[
                &["ID", "Name", "Team", "Score", "Credits", "Ping", "Steam", "IP"],
                &["3", "Alice", "0", "120", "350.5", "40", "0x0000000000000010", "10.0.0.1"],
                &["b4", "Bot", "1", "0", "0", "0", "-", ""],
            ],
        ));

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, GameEvent::PlayerDiscovered { .. })));
        assert!(state.get_player(PlayerId::new(9)).is_none());

        let alice = state.get_player(PlayerId::new(3)).unwrap();
        assert_eq!(alice.team, Team::SideA);
        assert_eq!(alice.score, 120);
        assert_eq!(alice.credits, 350.5);
        assert_eq!(alice.account_id, 0x10);
        assert!(state.get_player(PlayerId::new(4)).unwrap().is_bot);

        let again = state.apply_table(&table(
            "clientvarlist ID Name Team Score",
            &[&["ID", "Name", "Team", "Score"], &["3", "Alice", "0", "200"]],
        ));
        assert!(again.is_empty());
        assert_eq!(state.get_player(PlayerId::new(3)).map(|p| p.score), Some(200));
    }

    #[test]
    fn test_rotation_and_map_guid() {
        let mut state = GameState::new();
        state.apply_rotation(&table(
            "rotation",
            &[&["Name", "GUID"], &["CNC-Field", "0123456789ABCDEF000000000000000F"], &["CNC-Walls", ""]],
        ));
        assert!(state.is_in_rotation("cnc-walls"));
        assert!(!state.is_in_rotation("CNC-Islands"));

        state.apply(&line(b"lMAP\x02Start;\x02CNC-Field"));
        assert_eq!(state.map().guid_string(), "0123456789ABCDEF000000000000000F");
        assert!(state.phase().pending);
    }

    #[test]
    fn test_phase_flags_and_wipe() {
        let mut state = GameState::new();
        state.apply(&line(b"lGAME\x02MatchStart;\x02CNC-Field"));
        assert!(state.phase().in_progress);

        state.apply(&line(b"lGAME\x02MatchEnd;\x02winner\x02GDI\x02Buildings\x02GDI=10\x02Nod=2"));
        assert!(state.phase().over);
        assert!(!state.phase().in_progress);
        assert_eq!(state.last_outcome().and_then(|o| o.winner), Some(Team::SideA));

        state.apply(&line(b"lMAP\x02Changing;\x02seamless\x02CNC-Walls"));
        assert!(state.phase().travelling);

        state.apply(&line(b"lPLAYER\x02Enter;\x02GDI,3,Alice\x02from\x0210.0.0.1"));
        state.wipe();
        assert_eq!(state.player_count(), 0);
        assert_eq!(state.phase(), MatchPhase::default());
    }

    #[test]
    fn test_id_change_and_admin() {
        let mut state = GameState::new();
        state.apply(&line(b"lPLAYER\x02Enter;\x02GDI,3,Alice\x02from\x0210.0.0.1"));
        let events = state.apply(&line(b"lPLAYER\x02ChangeID;\x02to\x0211\x02from\x023"));
        assert!(matches!(&events[0], GameEvent::IdChange { old_id, .. } if old_id.get() == 3));
        assert!(state.get_player(PlayerId::new(3)).is_none());
        assert!(state.get_player(PlayerId::new(11)).is_some());

        state.apply(&line(b"lADMIN\x02Login;\x02GDI,11,Alice\x02as\x02moderator"));
        assert_eq!(
            state.get_player(PlayerId::new(11)).and_then(|p| p.admin_level.clone()),
            Some("moderator".into())
        );
        assert!(state.apply(&line(b"lDEMO\x02Record;")).is_empty());
    }
}
