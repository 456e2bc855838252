//! Building records

use rcon_core::Team;
use serde::Serialize;

/// A capturable or destructible structure on the current map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Building {
    pub name: String,
    pub team: Team,
    pub health: i32,
    pub max_health: i32,
    pub armor: i32,
    pub max_armor: i32,
    pub capturable: bool,
    pub destroyed: bool,
}

impl Building {
    pub fn new(name: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            team,
            health: 0,
            max_health: 0,
            armor: 0,
            max_armor: 0,
            capturable: false,
            destroyed: false,
        }
    }

    /// Health plus armor as a fraction of the maximum (0.0 when unknown)
    pub fn integrity(&self) -> f64 {
        let max = i64::from(self.max_health) + i64::from(self.max_armor);
        if max <= 0 {
            return 0.0;
        }
        let current = i64::from(self.health) + i64::from(self.armor);
        current.max(0) as f64 / max as f64
    }
}
