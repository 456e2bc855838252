//! Every server session owned by the host

use crate::connection::{Connection, ConnectionStatus};
use crate::context::HostContext;
use rcon_config::ServerSettings;

/// Owns the connections and drives them one tick at a time
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server; it connects on the next tick
    ///
    /// # Returns
    /// `false` when a server with the same name (case-insensitive) exists
    pub fn add(&mut self, settings: ServerSettings) -> bool {
        if self.get(&settings.name).is_some() {
            tracing::warn!("Server {} is already registered", settings.name);
            return false;
        }
        tracing::debug!("Registered server {} ({})", settings.name, settings.address());
        self.connections.push(Connection::new(settings));
        true
    }

    /// Run one `think` per connection and drop those that gave up
    ///
    /// # Returns
    /// Number of connections with an open socket
    pub fn tick(&mut self, ctx: &HostContext) -> usize {
        let mut online = 0;
        self.connections.retain_mut(|conn| match conn.think(ctx) {
            ConnectionStatus::Online => {
                online += 1;
                true
            }
            ConnectionStatus::Offline => true,
            ConnectionStatus::Terminated => {
                tracing::error!(
                    "[{}] Connection to {} closed for good: {}",
                    conn.name(),
                    conn.settings().address(),
                    conn.termination_reason().unwrap_or("unknown reason")
                );
                false
            }
        });
        online
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Look up a connection by server name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.iter_mut()
    }

    /// Send a public chat message on every fully connected server
    ///
    /// # Returns
    /// Number of servers the message was queued on
    pub fn broadcast(&mut self, message: &str) -> usize {
        let sent = self
            .connections
            .iter_mut()
            .filter(|conn| conn.is_fully_connected())
            .map(|conn| conn.send_message(message))
            .filter(|&queued| queued > 0)
            .count();
        tracing::debug!("Broadcast to {} servers", sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_config::HostConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn settings(name: &str, port: u16) -> ServerSettings {
        let mut settings = ServerSettings::new(name);
        settings.hostname = "127.0.0.1".into();
        settings.port = port;
        settings
    }

    #[test]
    fn test_add_and_lookup() {
        let mut registry = ConnectionRegistry::new();
        assert!(registry.add(settings("Alpha", 7777)));
        assert!(registry.add(settings("Bravo", 7778)));
        assert!(!registry.add(settings("alpha", 7779)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("ALPHA").map(|c| c.settings().port), Some(7777));
        assert!(registry.get_mut("bravo").is_some());
        assert!(registry.get("charlie").is_none());
        // Nothing is connected yet
        assert_eq!(registry.broadcast("hello"), 0);
    }

    #[tokio::test]
    async fn test_tick_drops_terminated() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = HostConfig {
            rdns_workers: 0,
            ..HostConfig::default()
        };
        let ctx = HostContext::new(Arc::new(config));

        let mut registry = ConnectionRegistry::new();
        let mut doomed = settings("doomed", port);
        doomed.max_attempts = 1;
        registry.add(doomed);
        let mut patient = settings("patient", port);
        patient.reconnect_delay = Duration::from_secs(60);
        registry.add(patient);

        for _ in 0..200 {
            registry.tick(&ctx);
            if registry.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(registry.len(), 1);
        assert!(registry.get("patient").is_some());
        assert_eq!(registry.iter().count(), 1);
    }
}
