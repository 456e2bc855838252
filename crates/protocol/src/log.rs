//! Log line classification
//!
//! # Log Line Layout
//! ```text
//! l{HEADER}{DELIM}{Subtype;}{DELIM}{arg}{DELIM}{arg}...
//! ```
//!
//! Arguments are mostly keyword-tagged (`from`, `by`, `with`, `said:` ...),
//! so the parsers below look keywords up instead of relying on fixed
//! positions. A recognised header/subtype whose required arguments are
//! missing classifies as [`LogLine::Unknown`]; nothing here fails.

use crate::command::Command;
use crate::tokens::{parse_account_id, parse_assignment, parse_number, parse_player, parse_team_object, PlayerRef};
use rcon_core::{PlayerId, Team};
use serde::{Deserialize, Serialize};

/// What kind of object a `Destroyed;` line refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Vehicle,
    Defence,
    Emplacement,
    Building,
    Other,
}

impl ObjectKind {
    fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "vehicle" => Self::Vehicle,
            "defence" | "defense" => Self::Defence,
            "emplacement" => Self::Emplacement,
            "building" => Self::Building,
            _ => Self::Other,
        }
    }
}

/// A classified `l` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogLine {
    //=== PLAYER ===//
    PlayerEnter { player: PlayerRef, ip: String, hwid: String, account_id: u64 },
    PlayerExit { player: PlayerRef },
    PlayerKick { player: PlayerRef, reason: String },
    TeamJoin { player: PlayerRef, new_team: Team, old_team: Option<Team> },
    NameChange { player: PlayerRef, new_name: String },
    IdChange { old_id: PlayerId, new_id: PlayerId },

    //=== GAME ===//
    Kill { killer: PlayerRef, victim: PlayerRef, damage_type: String },
    Death { victim: PlayerRef, killer: Option<String>, damage_type: String },
    Suicide { player: PlayerRef, damage_type: String },
    Destroyed {
        kind: ObjectKind,
        object: String,
        killer: Option<PlayerRef>,
        killer_name: String,
        damage_type: String,
    },
    Captured { player: PlayerRef, building: String, old_team: Team },
    Neutralized { player: PlayerRef, building: String, old_team: Team },
    Deployed { player: PlayerRef, object: String },
    Disarmed { player: PlayerRef, object: String, owner: Option<PlayerRef> },
    MatchStart { map: String },
    MatchEnd { winner: Option<Team>, tie: bool, reason: String, score_a: i64, score_b: i64 },

    //=== CHAT ===//
    Chat { player: PlayerRef, message: String },
    TeamChat { player: PlayerRef, message: String },
    HostChat { message: String },

    //=== VOTE ===//
    VoteCalled { team: Team, vote_type: String, player: Option<PlayerRef>, params: Vec<String> },
    VoteResults { team: Team, vote_type: String, passed: bool, yes: u32, no: u32 },
    VoteCancelled { team: Team, vote_type: String },

    //=== MAP ===//
    MapChanging { map: String, seamless: bool },
    MapLoaded { map: String },
    MapStart { map: String },

    //=== RCON ===//
    RconCommand { user: String, command: String },
    RconSubscribed { user: String },
    RconUnsubscribed { user: String },

    //=== ADMIN ===//
    AdminLogin { player: PlayerRef, level: String },
    AdminLogout { player: PlayerRef, level: String },
    AdminGranted { player: PlayerRef, level: String },

    /// Anything this client does not model
    Unknown { header: String, subtype: String },
}

impl LogLine {
    /// Whether the line was recognised
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

/// Keyword-aware view over a log line's arguments
struct Args<'a> {
    fields: &'a [String],
    delimiter: char,
}

impl<'a> Args<'a> {
    fn get(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Position of the first field equal to `keyword`
    fn find(&self, keyword: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == keyword)
    }

    /// Field following `keyword`
    fn after(&self, keyword: &str) -> Option<&'a str> {
        self.find(keyword).and_then(|i| self.get(i + 1))
    }

    /// Field following `keyword`, owned, or empty
    fn after_or_empty(&self, keyword: &str) -> String {
        self.after(keyword).unwrap_or_default().to_string()
    }

    /// Player token at `index`
    fn player(&self, index: usize) -> Option<PlayerRef> {
        self.get(index).and_then(parse_player)
    }

    /// Everything from `index` on, re-joined (messages may contain the delimiter)
    fn rest(&self, index: usize) -> String {
        let mut joined = String::new();
        for (i, field) in self.fields.iter().skip(index).enumerate() {
            if i > 0 {
                joined.push(self.delimiter);
            }
            joined.push_str(field);
        }
        joined
    }
}

/// Classify a log [`Command`]
///
/// The command's first field is the header, the second the subtype.
pub fn classify_log(command: &Command) -> LogLine {
    let header = command.field(0);
    let subtype = command.field(1);
    let args = Args {
        fields: command.fields.get(2..).unwrap_or_default(),
        delimiter: command.delimiter_char(),
    };

    let parsed = match header {
        "PLAYER" => parse_player_line(subtype, &args),
        "GAME" => parse_game_line(subtype, &args),
        "CHAT" => parse_chat_line(subtype, &args),
        "VOTE" => parse_vote_line(subtype, &args),
        "MAP" => parse_map_line(subtype, &args),
        "RCON" => parse_rcon_line(subtype, &args),
        "ADMIN" => parse_admin_line(subtype, &args),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        tracing::trace!("Unclassified log line: {} {}", header, subtype);
        LogLine::Unknown {
            header: header.to_string(),
            subtype: subtype.to_string(),
        }
    })
}

fn parse_player_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Enter;" => Some(LogLine::PlayerEnter {
            player: args.player(0)?,
            ip: args.after_or_empty("from"),
            hwid: args.after_or_empty("hwid"),
            account_id: args.after("steamid").map(parse_account_id).unwrap_or(0),
        }),
        "Exit;" => Some(LogLine::PlayerExit { player: args.player(0)? }),
        "Kick;" => Some(LogLine::PlayerKick {
            player: args.player(0)?,
            reason: args.after_or_empty("for"),
        }),
        "TeamJoin;" => Some(LogLine::TeamJoin {
            player: args.player(0)?,
            new_team: Team::from_wire(args.after("joined")?),
            old_team: args.after("left").map(Team::from_wire),
        }),
        "NameChange;" => Some(LogLine::NameChange {
            player: args.player(0)?,
            new_name: args.after("to:")?.to_string(),
        }),
        "ChangeID;" => Some(LogLine::IdChange {
            new_id: PlayerId::new(args.after("to")?.trim().parse().ok()?),
            old_id: PlayerId::new(args.after("from")?.trim().parse().ok()?),
        }),
        _ => None,
    }
}

fn parse_game_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Death;" => {
            let victim = args.after("player").and_then(parse_player)?;
            if let Some(damage_type) = args.after("suicide by") {
                return Some(LogLine::Suicide {
                    player: victim,
                    damage_type: damage_type.to_string(),
                });
            }
            if let Some(damage_type) = args.after("died by") {
                return Some(LogLine::Death {
                    victim,
                    killer: None,
                    damage_type: damage_type.to_string(),
                });
            }
            let killer = args.after("by")?;
            let damage_type = args.after_or_empty("with");
            match parse_player(killer) {
                Some(killer) => Some(LogLine::Kill { killer, victim, damage_type }),
                None => Some(LogLine::Death {
                    victim,
                    killer: Some(killer.to_string()),
                    damage_type,
                }),
            }
        }
        "Destroyed;" => {
            let killer_name = args.after_or_empty("by");
            Some(LogLine::Destroyed {
                kind: ObjectKind::from_wire(args.get(0)?),
                object: args.get(1)?.to_string(),
                killer: parse_player(&killer_name),
                killer_name,
                damage_type: args.after_or_empty("with"),
            })
        }
        "Captured;" | "Neutralized;" => {
            let (old_team, building) = parse_team_object(args.get(0)?)?;
            let player = args.after("by").and_then(parse_player)?;
            Some(if subtype == "Captured;" {
                LogLine::Captured { player, building, old_team }
            } else {
                LogLine::Neutralized { player, building, old_team }
            })
        }
        "Deployed;" => Some(LogLine::Deployed {
            object: args.get(0)?.to_string(),
            player: args.after("by").and_then(parse_player)?,
        }),
        "Disarmed;" => Some(LogLine::Disarmed {
            object: args.get(0)?.to_string(),
            player: args.after("by").and_then(parse_player)?,
            owner: args.after("owned by").and_then(parse_player),
        }),
        "MatchStart;" => Some(LogLine::MatchStart {
            map: args.get(0).unwrap_or_default().to_string(),
        }),
        "MatchEnd;" => {
            let (winner, tie, reason) = match args.get(0)? {
                "winner" => (Some(Team::from_wire(args.get(1)?)), false, args.get(2)),
                "tie" => (None, true, args.get(1)),
                _ => return None,
            };
            let score = |key: &str| {
                args.fields
                    .iter()
                    .find_map(|f| parse_assignment(f, key))
                    .map(parse_number::<i64>)
                    .unwrap_or(0)
            };
            Some(LogLine::MatchEnd {
                winner,
                tie,
                reason: reason.unwrap_or_default().to_string(),
                score_a: score(Team::SideA.as_wire()),
                score_b: score(Team::SideB.as_wire()),
            })
        }
        _ => None,
    }
}

fn parse_chat_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Say;" | "TeamSay;" => {
            let player = args.player(0)?;
            let message = args.find("said:").map(|i| args.rest(i + 1))?;
            Some(if subtype == "Say;" {
                LogLine::Chat { player, message }
            } else {
                LogLine::TeamChat { player, message }
            })
        }
        "HostSay;" => Some(LogLine::HostChat {
            message: args.find("said:").map(|i| args.rest(i + 1))?,
        }),
        _ => None,
    }
}

fn vote_team(value: &str) -> Team {
    if value.eq_ignore_ascii_case("Global") {
        Team::None
    } else {
        Team::from_wire(value)
    }
}

fn parse_vote_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Called;" => {
            let by = args.find("by");
            let params = match by {
                Some(i) => args.fields.get(i + 2..).unwrap_or_default().to_vec(),
                None => args.fields.get(2..).unwrap_or_default().to_vec(),
            };
            Some(LogLine::VoteCalled {
                team: vote_team(args.get(0)?),
                vote_type: args.get(1)?.to_string(),
                player: args.after("by").and_then(parse_player),
                params,
            })
        }
        "Results;" => {
            let count = |key: &str| {
                args.fields
                    .iter()
                    .find_map(|f| parse_assignment(f, key))
                    .map(parse_number::<u32>)
                    .unwrap_or(0)
            };
            Some(LogLine::VoteResults {
                team: vote_team(args.get(0)?),
                vote_type: args.get(1)?.to_string(),
                passed: args.get(2)?.eq_ignore_ascii_case("pass"),
                yes: count("Yes"),
                no: count("No"),
            })
        }
        "Cancelled;" => Some(LogLine::VoteCancelled {
            team: vote_team(args.get(0)?),
            vote_type: args.get(1)?.to_string(),
        }),
        _ => None,
    }
}

fn parse_map_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Changing;" => {
            let (seamless, map) = match args.get(0)? {
                "seamless" => (true, args.get(1)?),
                "nonseamless" => (false, args.get(1)?),
                map => (false, map),
            };
            Some(LogLine::MapChanging {
                map: map.to_string(),
                seamless,
            })
        }
        "Loaded;" => Some(LogLine::MapLoaded { map: args.get(0)?.to_string() }),
        "Start;" => Some(LogLine::MapStart { map: args.get(0)?.to_string() }),
        _ => None,
    }
}

fn parse_rcon_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    match subtype {
        "Command;" => Some(LogLine::RconCommand {
            user: args.get(0)?.to_string(),
            command: args.find("executed:").map(|i| args.rest(i + 1))?,
        }),
        "Subscribed;" => Some(LogLine::RconSubscribed { user: args.get(0)?.to_string() }),
        "Unsubscribed;" => Some(LogLine::RconUnsubscribed { user: args.get(0)?.to_string() }),
        _ => None,
    }
}

fn parse_admin_line(subtype: &str, args: &Args<'_>) -> Option<LogLine> {
    let player = args.player(0)?;
    let level = args.after_or_empty("as");
    match subtype {
        "Login;" => Some(LogLine::AdminLogin { player, level }),
        "Logout;" => Some(LogLine::AdminLogout { player, level }),
        "Granted;" => Some(LogLine::AdminGranted { player, level }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DELIMITER_LEGACY, DELIMITER_V3};

    fn classify(line: &[u8]) -> LogLine {
        classify_log(&Command::parse(line, DELIMITER_V3).unwrap())
    }

    #[test]
    fn test_player_enter() {
        let line = classify(b"lPLAYER\x02Enter;\x02GDI,3,Alice\x02from\x0210.0.0.7\x02hwid\x02m0011aabb\x02steamid\x020x0110000100000001");
        match line {
            LogLine::PlayerEnter { player, ip, hwid, account_id } => {
                assert_eq!(player.name, "Alice");
                assert_eq!(player.id.get(), 3);
                assert_eq!(ip, "10.0.0.7");
                assert_eq!(hwid, "m0011aabb");
                assert_eq!(account_id, 0x0110_0001_0000_0001);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kill_death_suicide() {
        let kill = classify(b"lGAME\x02Death;\x02player\x02Nod,4,Bob\x02by\x02GDI,3,Alice\x02with\x02Rx_DmgType_Headshot");
        assert!(matches!(kill, LogLine::Kill { ref killer, ref victim, .. } if killer.name == "Alice" && victim.name == "Bob"));

        let died = classify(b"lGAME\x02Death;\x02player\x02Nod,4,Bob\x02died by\x02Rx_DmgType_Fell");
        assert!(matches!(died, LogLine::Death { killer: None, .. }));

        let by_ai = classify(b"lGAME\x02Death;\x02player\x02Nod,4,Bob\x02by\x02Rx_Defence_GuardTower\x02with\x02Rx_DmgType_Bullet");
        assert!(matches!(by_ai, LogLine::Death { killer: Some(ref k), .. } if k == "Rx_Defence_GuardTower"));

        let suicide = classify(b"lGAME\x02Death;\x02player\x02Nod,4,Bob\x02suicide by\x02Rx_DmgType_Nuke");
        assert!(matches!(suicide, LogLine::Suicide { .. }));
    }

    #[test]
    fn test_match_end() {
        let win = classify(b"lGAME\x02MatchEnd;\x02winner\x02Nod\x02TimeLimit\x02GDI=1200\x02Nod=3400");
        assert_eq!(
            win,
            LogLine::MatchEnd {
                winner: Some(Team::SideB),
                tie: false,
                reason: "TimeLimit".into(),
                score_a: 1200,
                score_b: 3400,
            }
        );

        let tie = classify(b"lGAME\x02MatchEnd;\x02tie\x02Surrender\x02GDI=5\x02Nod=5");
        assert!(matches!(tie, LogLine::MatchEnd { winner: None, tie: true, .. }));
    }

    #[test]
    fn test_chat_keeps_delimiters_in_message() {
        let chat = classify(b"lCHAT\x02Say;\x02GDI,3,Alice\x02said:\x02!rank\x02Bob");
        assert_eq!(
            chat,
            LogLine::Chat {
                player: parse_player("GDI,3,Alice").unwrap(),
                message: "!rank\u{2}Bob".into(),
            }
        );
    }

    #[test]
    fn test_legacy_chat_rejoins_with_its_own_delimiter() {
        let command = Command::parse(b"lCHAT\xA0Say;\xA0GDI,3,Alice\xA0said:\xA0!rank\xA0Bob", DELIMITER_LEGACY).unwrap();
        assert_eq!(
            classify_log(&command),
            LogLine::Chat {
                player: parse_player("GDI,3,Alice").unwrap(),
                message: "!rank\u{a0}Bob".into(),
            }
        );
    }

    #[test]
    fn test_vote_lines() {
        let results = classify(b"lVOTE\x02Results;\x02Global\x02Rx_VoteMenuChoice_ChangeMap\x02pass\x02Yes=7\x02No=2");
        assert_eq!(
            results,
            LogLine::VoteResults {
                team: Team::None,
                vote_type: "Rx_VoteMenuChoice_ChangeMap".into(),
                passed: true,
                yes: 7,
                no: 2,
            }
        );
    }

    #[test]
    fn test_map_changing() {
        let line = classify(b"lMAP\x02Changing;\x02seamless\x02CNC-Walls");
        assert_eq!(line, LogLine::MapChanging { map: "CNC-Walls".into(), seamless: true });
    }

    #[test]
    fn test_truncated_and_unknown_lines() {
        assert!(!classify(b"lPLAYER\x02Enter;").is_known());
        assert!(!classify(b"lGAME\x02Captured;\x02GDI").is_known());
        assert!(!classify(b"lDEMO\x02Record;\x02by\x02someone").is_known());
    }
}
