//! In-game chat commands
//!
//! Chat lines that start with the configured prefix (`!rank Bob`) are routed
//! to the [`GameCommand`] registered for their first word. Matching is
//! case-insensitive.

use crate::connection::Connection;
use crate::context::HostContext;
use rcon_game::Player;
use rcon_storage::LadderEntry;
use std::collections::HashMap;

/// A chat command
pub trait GameCommand: Send + Sync {
    /// Words that trigger the command (without the prefix)
    fn triggers(&self) -> &[&'static str];

    /// One-line usage text
    fn help(&self) -> &str;

    /// Run the command
    ///
    /// # Arguments
    /// * `ctx` - Host context (stores, other commands)
    /// * `conn` - Server the command was typed on
    /// * `player` - Who typed it
    /// * `params` - Everything after the trigger word, trimmed
    fn trigger(&self, ctx: &HostContext, conn: &mut Connection, player: &Player, params: &str);
}

/// Trigger word to command table
#[derive(Default)]
pub struct GameCommandRouter {
    commands: Vec<Box<dyn GameCommand>>,
    by_trigger: HashMap<String, usize>,
}

impl GameCommandRouter {
    /// Empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with `help` and `rank`
    pub fn with_builtins() -> Self {
        let mut router = Self::new();
        router.register(HelpCommand);
        router.register(RankCommand);
        router
    }

    /// Register a command under each of its triggers
    ///
    /// A later registration takes over triggers already in use.
    pub fn register<C: GameCommand + 'static>(&mut self, command: C) {
        let index = self.commands.len();
        for trigger in command.triggers() {
            if self.by_trigger.insert(trigger.to_ascii_lowercase(), index).is_some() {
                tracing::warn!("Game command trigger '{}' re-registered", trigger);
            }
        }
        self.commands.push(Box::new(command));
    }

    /// Look up a command by trigger word
    pub fn get(&self, trigger: &str) -> Option<&dyn GameCommand> {
        self.by_trigger
            .get(&trigger.to_ascii_lowercase())
            .map(|&index| self.commands[index].as_ref())
    }

    /// All trigger words, sorted
    pub fn triggers(&self) -> Vec<&str> {
        let mut triggers: Vec<&str> = self.by_trigger.keys().map(String::as_str).collect();
        triggers.sort_unstable();
        triggers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Route a chat message that already had its prefix removed
    ///
    /// # Returns
    /// `true` when a command handled it
    pub fn route(&self, ctx: &HostContext, conn: &mut Connection, player: &Player, text: &str) -> bool {
        // Chat keeps raw field delimiters inside the message
        let text = text.replace('\u{2}', " ");
        let text = text.trim();
        let (word, params) = match text.split_once(char::is_whitespace) {
            Some((word, params)) => (word, params.trim()),
            None => (text, ""),
        };
        if word.is_empty() {
            return false;
        }

        let Some(command) = self.get(word) else {
            tracing::debug!("[{}] {} used unknown command '{}'", conn.name(), player.name, word);
            return false;
        };

        tracing::debug!("[{}] {} triggered '{}' ({})", conn.name(), player.name, word, params);
        command.trigger(ctx, conn, player, params);
        true
    }
}

impl std::fmt::Debug for GameCommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCommandRouter").field("triggers", &self.triggers()).finish()
    }
}

//=== Built-ins ===//

/// `help [command]`
pub struct HelpCommand;

impl GameCommand for HelpCommand {
    fn triggers(&self) -> &[&'static str] {
        &["help", "commands"]
    }

    fn help(&self) -> &str {
        "help [command] - list commands or show one command's usage"
    }

    fn trigger(&self, ctx: &HostContext, conn: &mut Connection, player: &Player, params: &str) {
        let prefix = &ctx.config.command_prefix;
        let reply = if params.is_empty() {
            format!("Commands: {}", ctx.commands.triggers().iter().map(|t| format!("{prefix}{t}")).collect::<Vec<_>>().join(" "))
        } else {
            let word = params.trim_start_matches(prefix.as_str());
            match ctx.commands.get(word) {
                Some(command) => format!("{prefix}{}", command.help()),
                None => format!("No such command: {word}"),
            }
        };
        conn.send_private_message(player.id, &reply);
    }
}

/// `rank [name]`
pub struct RankCommand;

impl RankCommand {
    fn describe(entry: &LadderEntry) -> String {
        format!(
            "#{} {} - score {}, {} kills, {} deaths (K/D {:.2}), {} games, {} wins",
            entry.rank,
            entry.most_recent_name,
            entry.totals.score,
            entry.totals.kills,
            entry.totals.deaths,
            entry.totals.kill_death_ratio(),
            entry.totals.games,
            entry.totals.wins
        )
    }
}

impl GameCommand for RankCommand {
    fn triggers(&self) -> &[&'static str] {
        &["rank", "ladder"]
    }

    fn help(&self) -> &str {
        "rank [name] - show a ladder position (yours when no name is given)"
    }

    fn trigger(&self, ctx: &HostContext, conn: &mut Connection, player: &Player, params: &str) {
        let Some(ladder) = ctx.ladder.as_ref() else {
            conn.send_private_message(player.id, "The ladder is disabled.");
            return;
        };

        let reply = {
            let ladder = ladder.lock();
            if params.is_empty() {
                match ladder.get_by_id(player.account_id) {
                    Some(entry) => Self::describe(entry),
                    None => "You are not ranked yet.".to_string(),
                }
            } else {
                match ladder.get_all_by_part_name(params).as_slice() {
                    [] => format!("No ranked player matches \"{params}\"."),
                    [entry] => Self::describe(entry),
                    many => match ladder.get_by_name(params) {
                        Some(entry) => Self::describe(entry),
                        None => format!("{} ranked players match \"{params}\"; be more specific.", many.len()),
                    },
                }
            }
        };

        conn.send_private_message(player.id, &reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rcon_config::{HostConfig, ServerSettings};
    use rcon_core::PlayerId;
    use std::sync::Arc;

    struct Echo(Arc<Mutex<Vec<String>>>);

    impl GameCommand for Echo {
        fn triggers(&self) -> &[&'static str] {
            &["echo"]
        }

        fn help(&self) -> &str {
            "echo <text>"
        }

        fn trigger(&self, _ctx: &HostContext, _conn: &mut Connection, player: &Player, params: &str) {
            self.0.lock().push(format!("{}:{}", player.name, params));
        }
    }

    #[test]
    fn test_route_is_case_insensitive() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = HostContext::new(Arc::new(HostConfig::default()));
        ctx.commands.register(Echo(seen.clone()));

        let mut conn = Connection::new(ServerSettings::new("test"));
        let player = Player::new(PlayerId::new(3), "Alice");

        assert!(ctx.commands.route(&ctx, &mut conn, &player, "ECHO  hello there "));
        assert!(ctx.commands.route(&ctx, &mut conn, &player, "echo\u{2}x"));
        assert!(!ctx.commands.route(&ctx, &mut conn, &player, "nope"));
        assert!(!ctx.commands.route(&ctx, &mut conn, &player, "   "));
        assert_eq!(*seen.lock(), vec!["Alice:hello there", "Alice:x"]);
    }

    #[test]
    fn test_builtins_registered() {
        let router = GameCommandRouter::with_builtins();
        assert_eq!(router.len(), 2);
        assert!(router.get("Rank").is_some());
        assert!(router.get("commands").is_some());
        assert_eq!(router.triggers(), vec!["commands", "help", "ladder", "rank"]);
    }

    #[test]
    fn test_builtins_without_socket_do_not_panic() {
        let ctx = HostContext::new(Arc::new(HostConfig::default()));
        let mut conn = Connection::new(ServerSettings::new("test"));
        let player = Player::new(PlayerId::new(3), "Alice");
        assert!(ctx.commands.route(&ctx, &mut conn, &player, "rank"));
        assert!(ctx.commands.route(&ctx, &mut conn, &player, "help rank"));
    }
}
