//! Compound field parsers
//!
//! Log lines embed small structured tokens inside single fields:
//!
//! ```text
//! GDI,12,Alice          player token (team, id, name)
//! Nod,b3,Bot Name       bot player token (id carries a `b` prefix)
//! GDI,Rx_Building_Silo  team + object pair
//! GDI=1234              counter assignment
//! ```

use nom::{
    bytes::complete::take_till,
    character::complete::{char, digit1},
    combinator::{map_res, opt, recognize},
    sequence::pair,
    IResult,
};
use rcon_core::{PlayerId, Team};
use serde::{Deserialize, Serialize};

/// Reference to a player as it appears in a log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub team: Team,
    pub id: PlayerId,
    pub name: String,
    pub is_bot: bool,
}

fn player_prefix(input: &str) -> IResult<&str, (&str, bool, i32)> {
    let (input, team) = take_till(|c| c == ',')(input)?;
    let (input, _) = char(',')(input)?;
    let (input, bot) = opt(char('b'))(input)?;
    let (input, id) = map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>)(input)?;
    let (input, _) = char(',')(input)?;
    Ok((input, (team, bot.is_some(), id)))
}

/// Parse a `Team,Id,Name` player token
///
/// # Returns
/// `None` when the field is not a player token (for example a non-player
/// killer such as an AI defence)
pub fn parse_player(token: &str) -> Option<PlayerRef> {
    let (name, (team, is_bot, id)) = player_prefix(token).ok()?;
    if name.is_empty() {
        return None;
    }

    Some(PlayerRef {
        team: Team::from_wire(team),
        id: PlayerId::new(id),
        name: name.to_string(),
        is_bot,
    })
}

/// Parse a `Team,Object` pair
pub fn parse_team_object(token: &str) -> Option<(Team, String)> {
    let (team, object) = token.split_once(',')?;
    if object.is_empty() {
        return None;
    }
    Some((Team::from_wire(team), object.to_string()))
}

/// Parse a `Key=Value` assignment into its numeric value
pub fn parse_assignment<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = token.split_once('=')?;
    k.eq_ignore_ascii_case(key).then_some(v)
}

/// Parse an account id as sent by the server
///
/// # Format
/// - `0x0110000104AE0666` hexadecimal
/// - `76561197960265728` decimal
/// - `-` or empty for players without an account
pub fn parse_account_id(token: &str) -> u64 {
    let token = token.trim();
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).unwrap_or(0);
    }
    token.parse().unwrap_or(0)
}

/// Render an account id the way the server sends it
pub fn format_account_id(account_id: u64) -> String {
    format!("0x{:016X}", account_id)
}

/// Parse a numeric field leniently (whitespace tolerated, garbage → default)
pub fn parse_number<T: std::str::FromStr + Default>(token: &str) -> T {
    token.trim().parse().unwrap_or_default()
}
