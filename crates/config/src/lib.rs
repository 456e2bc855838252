//! rconhub Configuration
//!
//! Loads the host configuration and the list of game servers to connect to.
//!
//! # File Format
//! ```text
//! # host options
//! log_level = info
//! command_prefix = !
//! ban_file = bans.db
//! ladder_file = ladder.db
//!
//! [server Marathon]
//! hostname = 127.0.0.1
//! port = 7777
//! password = secret
//! ```
//!
//! Keys before the first section belong to the host; each `[server NAME]`
//! section describes one connection. Unknown keys are ignored and values
//! that do not parse keep their defaults.

use rcon_core::{RconError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One game server to connect to
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Display name (from the section header)
    pub name: String,
    /// Server address (from "hostname")
    pub hostname: String,
    /// RCON port (from "port", default: 7777)
    pub port: u16,
    /// RCON password (from "password")
    pub password: String,

    /// Base reconnect delay (from "reconnect_delay", seconds)
    pub reconnect_delay: Duration,
    /// Reconnect delay cap (from "max_reconnect_delay", seconds)
    pub max_reconnect_delay: Duration,
    /// Consecutive failed connects before giving up (from "max_attempts", 0 = never)
    pub max_attempts: u32,
    /// Connect timeout (from "connect_timeout", seconds)
    pub connect_timeout: Duration,

    /// Idle time before a keepalive ping (from "ping_rate", seconds)
    pub ping_rate: Duration,
    /// Silence tolerated while a ping is outstanding (from "ping_timeout", seconds)
    pub ping_timeout: Duration,
    /// Roster refresh interval (from "client_update_rate", milliseconds)
    pub client_update_rate: Duration,

    /// Fold finished matches into the ladder (from "ladder")
    pub ladder: bool,
    /// Check joining players against the ban list (from "ban_check")
    pub ban_check: bool,
}

impl ServerSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: String::new(),
            port: 7777,
            password: String::new(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(300),
            max_attempts: 0,
            connect_timeout: Duration::from_secs(5),
            ping_rate: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(30),
            client_update_rate: Duration::from_millis(2500),
            ladder: true,
            ban_check: true,
        }
    }

    /// `hostname:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "hostname" => self.hostname = value.into(),
            "port" => self.port = value.parse().unwrap_or(7777),
            "password" => self.password = value.into(),
            "reconnect_delay" => self.reconnect_delay = parse_secs(value, 5),
            "max_reconnect_delay" => self.max_reconnect_delay = parse_secs(value, 300),
            "max_attempts" => self.max_attempts = value.parse().unwrap_or(0),
            "connect_timeout" => self.connect_timeout = parse_secs(value, 5),
            "ping_rate" => self.ping_rate = parse_secs(value, 60),
            "ping_timeout" => self.ping_timeout = parse_secs(value, 30),
            "client_update_rate" => {
                self.client_update_rate = Duration::from_millis(value.parse().unwrap_or(2500));
            }
            "ladder" => self.ladder = parse_bool(value, true),
            "ban_check" => self.ban_check = parse_bool(value, true),
            _ => {
                tracing::debug!("Unknown server option: {} = {}", key, value);
            }
        }
    }
}

/// Complete host configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Default log filter (from "log_level", overridden by `RUST_LOG`)
    pub log_level: String,
    /// Poll loop period (from "tick_rate", milliseconds)
    pub tick_rate: Duration,
    /// Prefix of in-game chat commands (from "command_prefix")
    pub command_prefix: String,
    /// Ban list file (from "ban_file", empty disables bans)
    pub ban_file: Option<PathBuf>,
    /// Ladder file (from "ladder_file", empty disables the ladder)
    pub ladder_file: Option<PathBuf>,
    /// Concurrent reverse DNS lookups (from "rdns_workers", 0 disables them)
    pub rdns_workers: usize,

    pub servers: Vec<ServerSettings>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            tick_rate: Duration::from_millis(50),
            command_prefix: "!".into(),
            ban_file: Some(PathBuf::from("bans.db")),
            ladder_file: Some(PathBuf::from("ladder.db")),
            rdns_workers: 4,
            servers: Vec::new(),
        }
    }
}

fn parse_secs(value: &str, default: u64) -> Duration {
    Duration::from_secs(value.parse().unwrap_or(default))
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => true,
        "false" | "no" | "off" | "0" => false,
        _ => default,
    }
}

fn parse_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

impl HostConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Config` when no usable server is
    /// configured
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current: Option<ServerSettings> = None;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some(server) = current.take() {
                    config.push_server(server);
                }
                let header = header.trim();
                match header.split_once(char::is_whitespace) {
                    Some((kind, name)) if kind.eq_ignore_ascii_case("server") => {
                        current = Some(ServerSettings::new(name.trim()));
                    }
                    _ => {
                        tracing::warn!("Line {}: ignoring unknown section [{}]", number + 1, header);
                    }
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Line {}: expected key = value", number + 1);
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match current.as_mut() {
                Some(server) => server.parse_option(&key, value),
                None => config.parse_option(&key, value),
            }
        }

        if let Some(server) = current.take() {
            config.push_server(server);
        }

        if config.servers.is_empty() {
            return Err(RconError::Config("no [server NAME] section with a hostname".into()));
        }

        Ok(config)
    }

    fn push_server(&mut self, server: ServerSettings) {
        if server.hostname.is_empty() {
            tracing::warn!("Server '{}' has no hostname; skipping", server.name);
            return;
        }
        if server.password.is_empty() {
            tracing::warn!("Server '{}' has no password; authentication will fail", server.name);
        }
        self.servers.push(server);
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "log_level" => self.log_level = value.into(),
            "tick_rate" => self.tick_rate = Duration::from_millis(value.parse().unwrap_or(50)),
            "command_prefix" => self.command_prefix = value.into(),
            "ban_file" => self.ban_file = parse_path(value),
            "ladder_file" => self.ladder_file = parse_path(value),
            "rdns_workers" => self.rdns_workers = value.parse().unwrap_or(4),
            _ => {
                tracing::debug!("Unknown host option: {} = {}", key, value);
            }
        }
    }

    /// Look up a server section by name (case-insensitive)
    pub fn server(&self, name: &str) -> Option<&ServerSettings> {
        self.servers.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Host configuration:");
        tracing::info!("    Log level: {}", self.log_level);
        tracing::info!("    Tick rate: {:?}", self.tick_rate);
        tracing::info!("    Command prefix: {}", self.command_prefix);
        tracing::info!(
            "    Ban file: {}",
            self.ban_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(disabled)".into())
        );
        tracing::info!(
            "    Ladder file: {}",
            self.ladder_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(disabled)".into())
        );
        tracing::info!("    Reverse DNS workers: {}", self.rdns_workers);
        tracing::info!("  Servers: {}", self.servers.len());
        for server in &self.servers {
            tracing::info!(
                "    [{}] {} (ladder: {}, ban check: {}, max attempts: {})",
                server.name,
                server.address(),
                server.ladder,
                server.ban_check,
                server.max_attempts
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.tick_rate, Duration::from_millis(50));
        let server = ServerSettings::new("x");
        assert_eq!(server.port, 7777);
        assert_eq!(server.max_reconnect_delay, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_sections() {
        let config_text = r#"
# host
log_level = debug
command_prefix = .
ladder_file =

[server Marathon]
hostname = 10.0.0.5
port = 7778
password = hunter2
ping_rate = 15
ladder = no

[server AOW]
hostname = 10.0.0.6
password = pw
client_update_rate = 1000
"#;
        let config = HostConfig::parse(config_text).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.command_prefix, ".");
        assert_eq!(config.ladder_file, None);
        assert_eq!(config.servers.len(), 2);

        let marathon = config.server("marathon").unwrap();
        assert_eq!(marathon.address(), "10.0.0.5:7778");
        assert_eq!(marathon.ping_rate, Duration::from_secs(15));
        assert!(!marathon.ladder);

        let aow = config.server("AOW").unwrap();
        assert_eq!(aow.port, 7777);
        assert_eq!(aow.client_update_rate, Duration::from_millis(1000));
        assert!(aow.ladder);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = HostConfig::parse("[server A]\nhostname = h\nport = banana\nmax_attempts = -3\n").unwrap();
        assert_eq!(config.servers[0].port, 7777);
        assert_eq!(config.servers[0].max_attempts, 0);
    }

    #[test]
    fn test_requires_a_server() {
        assert!(HostConfig::parse("log_level = info\n").is_err());
        assert!(HostConfig::parse("[server NoHost]\nport = 1\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rconhub.cfg");
        fs::write(&path, "[server Local]\nhostname = 127.0.0.1\npassword = pw\n").unwrap();
        let config = HostConfig::load_from_file(&path).unwrap();
        assert_eq!(config.servers[0].name, "Local");
        assert!(HostConfig::load_from_file(dir.path().join("missing.cfg")).is_err());
    }
}
