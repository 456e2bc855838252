//! Shared host state handed to every connection on each tick

use crate::commands::GameCommandRouter;
use crate::dispatcher::EventDispatcher;
use crate::rdns::RdnsPool;
use parking_lot::Mutex;
use rcon_config::HostConfig;
use rcon_core::BanFlags;
use rcon_game::Player;
use rcon_storage::{BanStore, LadderStore};
use std::sync::Arc;

/// Everything a connection needs beyond its own socket
///
/// # Fields
/// - `config`: loaded host configuration
/// - `dispatcher`: observers of every server's events
/// - `bans` / `ladder`: persistent stores, `None` when disabled
/// - `rdns`: reverse DNS pool
/// - `commands`: in-game chat commands
#[derive(Debug)]
pub struct HostContext {
    pub config: Arc<HostConfig>,
    pub dispatcher: EventDispatcher,
    pub bans: Option<Mutex<BanStore>>,
    pub ladder: Option<Mutex<LadderStore>>,
    pub rdns: RdnsPool,
    pub commands: GameCommandRouter,
}

impl HostContext {
    /// Context without persistent stores
    pub fn new(config: Arc<HostConfig>) -> Self {
        Self {
            rdns: RdnsPool::new(config.rdns_workers),
            config,
            dispatcher: EventDispatcher::new(),
            bans: None,
            ladder: None,
            commands: GameCommandRouter::with_builtins(),
        }
    }

    /// Context with the stores named in the configuration opened
    ///
    /// # Errors
    /// Only when a store file cannot be created or read at all; damaged or
    /// newer-versioned files are archived and reset by the store itself
    pub fn open(config: Arc<HostConfig>) -> rcon_storage::Result<Self> {
        let bans = match &config.ban_file {
            Some(path) => Some(BanStore::open(path)?),
            None => None,
        };
        let ladder = match &config.ladder_file {
            Some(path) => Some(LadderStore::open(path)?),
            None => None,
        };

        let mut ctx = Self::new(config);
        if let Some(bans) = bans {
            ctx = ctx.with_bans(bans);
        }
        if let Some(ladder) = ladder {
            ctx = ctx.with_ladder(ladder);
        }
        Ok(ctx)
    }

    pub fn with_bans(mut self, bans: BanStore) -> Self {
        self.bans = Some(Mutex::new(bans));
        self
    }

    pub fn with_ladder(mut self, ladder: LadderStore) -> Self {
        self.ladder = Some(Mutex::new(ladder));
        self
    }

    /// Persist a ban for `player`, with every plugin's annotations attached
    ///
    /// # Returns
    /// The new record's index, `None` when bans are disabled or the write failed
    pub fn add_ban(&self, player: &Player, banner: &str, reason: &str, duration: u64, kinds: BanFlags) -> Option<usize> {
        let bans = self.bans.as_ref()?;
        let result = bans
            .lock()
            .add(player, banner, reason, duration, kinds, |record| self.dispatcher.ban_annotations(record));
        match result {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::error!("Failed to store ban for {}: {}", player.name, e);
                None
            }
        }
    }

    /// Write the ladder to disk (shutdown, after a match)
    pub fn save_ladder(&self) -> rcon_storage::Result<()> {
        match &self.ladder {
            Some(ladder) => ladder.lock().write(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_core::PlayerId;

    #[test]
    fn test_open_creates_stores() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig {
            ban_file: Some(dir.path().join("bans.db")),
            ladder_file: None,
            ..HostConfig::default()
        };

        let ctx = HostContext::open(Arc::new(config)).unwrap();
        assert!(ctx.bans.is_some());
        assert!(ctx.ladder.is_none());
        assert!(dir.path().join("bans.db").exists());
        ctx.save_ladder().unwrap();
    }

    #[test]
    fn test_add_ban_without_store() {
        let ctx = HostContext::new(Arc::new(HostConfig::default()));
        let player = Player::new(PlayerId::new(1), "Alice");
        assert_eq!(ctx.add_ban(&player, "admin", "test", 0, BanFlags::GAME), None);
    }

    #[test]
    fn test_add_ban_persists() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = HostContext::new(Arc::new(HostConfig::default()))
            .with_bans(BanStore::open(dir.path().join("bans.db")).unwrap());

        let mut player = Player::new(PlayerId::new(1), "Alice");
        player.account_id = 42;
        let index = ctx.add_ban(&player, "admin", "griefing", 3600, BanFlags::CHAT).unwrap();

        let bans = ctx.bans.as_ref().unwrap().lock();
        let record = bans.get(index).unwrap();
        assert_eq!(record.account_id, 42);
        assert!(record.flags.contains(BanFlags::CHAT | BanFlags::ACTIVE));
    }
}
