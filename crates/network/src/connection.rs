//! # RCON Connection
//!
//! One outbound session to one game server.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Subscribing → FullyConnected ⇄ Travelling
//!      ↑              │             │              │              │
//!      └──────────────┴─────────────┴──────────────┴──────────────┘
//!                      (socket error, ping timeout: reconnect)
//! ```
//!
//! - **Connecting**: a spawned task runs the TCP connect; [`Connection::think`]
//!   polls it without waiting
//! - **Handshaking**: the `v` banner picks the field delimiter, then `a<password>`
//! - **Subscribing**: after `a` the client subscribes and requests the roster,
//!   buildings, game info and map rotation, then `ping srv_init_done`
//! - **FullyConnected**: the `PONG` for that token means the initial data is in
//!
//! A response block ends at the next line that is not an `r` row, never at a
//! read boundary, so every table request is followed by a `ping` whose echo
//! closes it.
//!
//! A bad password or an unsupported protocol version ends the connection for
//! good; everything else schedules a reconnect with exponential backoff.
//!
//! # Polling
//!
//! Nothing here blocks. Reads use `try_read`, writes go to an outbound buffer
//! flushed with `try_write` once per tick, and events are dispatched from the
//! same call that read the line they came from.

use crate::context::HostContext;
use bytes::{Buf, BytesMut};
use futures::FutureExt;
use rand::Rng;
use rcon_config::ServerSettings;
use rcon_core::{BanFlags, ConnectionState, PlayerId, RconError, Team};
use rcon_game::{GameEvent, GameState, ResponseTable};
use rcon_protocol::{
    classify_log, delimiter_for_version, parse_version_banner, Command, CommandType, Outbound, RconCodec,
};
use socket2::{SockRef, TcpKeepalive};
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};

/// Bytes requested per `try_read`
const READ_CHUNK: usize = 8192;

/// Reads per tick before yielding to the other connections
const MAX_READS_PER_TICK: usize = 64;

/// Roster request; the server answers with these columns
pub const ROSTER_COMMAND: &str = "clientvarlist ID Name Team Kills Deaths Score Credits Ping IP HWID Steam Admin IsBot";

/// Ping token that marks the end of the initial requests
pub const INIT_TOKEN: &str = "srv_init_done";

/// Ping token used for keepalives
pub const KEEPALIVE_TOKEN: &str = "keepalive";

/// Ping token sent after a table request so its echo closes the table
pub const TABLE_END_TOKEN: &str = "table_end";

/// Backoff stops doubling after this many failures
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Result of one [`Connection::think`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Socket open
    Online,

    /// Connecting or waiting to reconnect
    Offline,

    /// Gave up; the connection should be dropped
    Terminated,
}

/// Session to one game server
#[derive(Debug)]
pub struct Connection {
    settings: ServerSettings,
    state: ConnectionState,
    game: GameState,

    socket: Option<TcpStream>,
    pending_connect: Option<JoinHandle<io::Result<TcpStream>>>,
    codec: RconCodec,
    read_buffer: BytesMut,
    outbound: BytesMut,

    /// Chosen from the version banner; `None` until it arrives
    delimiter: Option<u8>,
    rcon_version: u32,
    game_version: String,
    rcon_user: String,

    /// Response block being collected
    response: Option<ResponseTable>,

    connection_attempts: u32,
    next_connection_attempt: Option<Instant>,
    connected_at: Option<Instant>,
    subscribed_at: Option<Instant>,
    last_send: Instant,
    last_recv: Instant,
    last_client_update: Instant,
    ping_sent_at: Option<Instant>,

    gameover_at: Option<Instant>,
    gameover_when_empty: bool,

    /// Events waiting for dispatch
    events: VecDeque<GameEvent>,
    terminated: Option<String>,
}

impl Connection {
    /// Create an idle connection; the first [`Connection::think`] connects
    pub fn new(settings: ServerSettings) -> Self {
        let now = Instant::now();
        Self {
            settings,
            state: ConnectionState::Disconnected,
            game: GameState::new(),
            socket: None,
            pending_connect: None,
            codec: RconCodec::new(),
            read_buffer: BytesMut::with_capacity(READ_CHUNK),
            outbound: BytesMut::with_capacity(1024),
            delimiter: None,
            rcon_version: 0,
            game_version: String::new(),
            rcon_user: String::new(),
            response: None,
            connection_attempts: 0,
            next_connection_attempt: None,
            connected_at: None,
            subscribed_at: None,
            last_send: now,
            last_recv: now,
            last_client_update: now,
            ping_sent_at: None,
            gameover_at: None,
            gameover_when_empty: false,
            events: VecDeque::new(),
            terminated: None,
        }
    }

    //=== Accessors ===//

    #[inline]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    #[inline]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Live model of the server
    #[inline]
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Negotiated RCON protocol version (0 before the banner)
    #[inline]
    pub fn rcon_version(&self) -> u32 {
        self.rcon_version
    }

    #[inline]
    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    /// RCON user name the server authenticated us as
    #[inline]
    pub fn rcon_user(&self) -> &str {
        &self.rcon_user
    }

    #[inline]
    pub fn is_fully_connected(&self) -> bool {
        matches!(self.state, ConnectionState::FullyConnected | ConnectionState::Travelling)
    }

    /// Consecutive failed attempts since the last successful login
    #[inline]
    pub fn connection_attempts(&self) -> u32 {
        self.connection_attempts
    }

    /// Why the connection gave up, once it has
    pub fn termination_reason(&self) -> Option<&str> {
        self.terminated.as_deref()
    }

    /// Time since the socket opened
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|at| at.elapsed())
    }

    //=== Polling ===//

    /// Advance the connection by one tick
    ///
    /// # Process
    /// 1. Start or poll the connect, or read and handle every available line
    /// 2. Run timers (keepalive, roster refresh, scheduled game over)
    /// 3. Flush the outbound buffer
    /// 4. Dispatch queued events
    pub fn think(&mut self, ctx: &HostContext) -> ConnectionStatus {
        if self.terminated.is_some() {
            return ConnectionStatus::Terminated;
        }

        match self.state {
            ConnectionState::Disconnected => {
                let due = self.next_connection_attempt.map_or(true, |at| Instant::now() >= at);
                if due {
                    self.start_connect();
                }
            }
            ConnectionState::Connecting => self.poll_connect(),
            _ => {
                self.read_socket(ctx);
                if self.socket.is_some() {
                    self.do_timed_events();
                }
            }
        }

        self.flush_outbound();
        self.flush_events(ctx);
        self.status()
    }

    fn status(&self) -> ConnectionStatus {
        if self.terminated.is_some() {
            ConnectionStatus::Terminated
        } else if self.socket.is_some() {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }

    //=== Connect / reconnect ===//

    fn start_connect(&mut self) {
        let address = self.settings.address();
        let timeout = self.settings.connect_timeout;
        tracing::info!("[{}] Connecting to {}", self.name(), address);

        self.pending_connect = Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            }
        }));
        self.next_connection_attempt = None;
        self.state = ConnectionState::Connecting;
    }

    fn poll_connect(&mut self) {
        let Some(handle) = self.pending_connect.as_mut() else {
            self.state = ConnectionState::Disconnected;
            return;
        };
        let Some(result) = handle.now_or_never() else {
            return;
        };
        self.pending_connect = None;

        match result {
            Ok(Ok(stream)) => self.on_connected(stream),
            Ok(Err(e)) => {
                let message = format!("connect to {} failed: {}", self.settings.address(), e);
                self.fail(RconError::Network(message));
            }
            Err(e) => self.fail(RconError::Network(format!("connect task failed: {}", e))),
        }
    }

    fn on_connected(&mut self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("[{}] TCP_NODELAY: {}", self.name(), e);
        }
        let keepalive = TcpKeepalive::new().with_time(self.settings.ping_rate);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            tracing::debug!("[{}] SO_KEEPALIVE: {}", self.name(), e);
        }

        let now = Instant::now();
        self.socket = Some(stream);
        self.state = ConnectionState::Handshaking;
        self.connected_at = Some(now);
        self.last_recv = now;
        self.last_send = now;
        self.ping_sent_at = None;

        tracing::info!("[{}] Connected to {}, waiting for version banner", self.name(), self.settings.address());
        self.emit(GameEvent::Connected);
    }

    /// Delay before the next attempt, given the failures so far
    ///
    /// `reconnect_delay * 2^attempts`, capped at `max_reconnect_delay`,
    /// plus up to one second of jitter so servers restarted together are
    /// not all hit at once.
    pub fn get_delay(&self) -> Duration {
        let exponent = self.connection_attempts.min(MAX_BACKOFF_EXPONENT);
        let backoff = self
            .settings
            .reconnect_delay
            .saturating_mul(1u32 << exponent)
            .min(self.settings.max_reconnect_delay);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=1000));
        backoff + jitter
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.get_delay();
        self.connection_attempts = self.connection_attempts.saturating_add(1);

        let max_attempts = self.settings.max_attempts;
        if max_attempts > 0 && self.connection_attempts >= max_attempts {
            self.terminate(&format!("gave up after {} failed attempts", self.connection_attempts));
            return;
        }

        tracing::info!(
            "[{}] Reconnecting in {:.1}s (attempt {})",
            self.name(),
            delay.as_secs_f64(),
            self.connection_attempts + 1
        );
        self.next_connection_attempt = Some(Instant::now() + delay);
    }

    /// Route an error: terminal ones end the connection, the rest reconnect
    fn fail(&mut self, error: RconError) {
        if error.is_terminal() {
            self.terminate(&error.to_string());
            return;
        }
        tracing::warn!("[{}] {}", self.name(), error);
        self.close(&error.to_string());
        self.schedule_reconnect();
    }

    /// Drop the socket and every piece of session state
    fn close(&mut self, reason: &str) {
        if let Some(handle) = self.pending_connect.take() {
            handle.abort();
        }
        let had_session = self.socket.take().is_some();

        self.read_buffer.clear();
        self.outbound.clear();
        self.codec.reset();
        self.delimiter = None;
        self.rcon_version = 0;
        self.response = None;
        self.ping_sent_at = None;
        self.connected_at = None;
        self.subscribed_at = None;
        self.game.wipe();
        self.state = ConnectionState::Disconnected;

        if had_session {
            tracing::info!("[{}] Disconnected: {}", self.name(), reason);
            self.emit(GameEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Close the session and wipe the model; a reconnect is scheduled
    pub fn disconnect(&mut self, reason: &str) {
        self.close(reason);
        self.schedule_reconnect();
    }

    /// Close the session for good; the next [`Connection::think`] reports
    /// [`ConnectionStatus::Terminated`]
    pub fn terminate(&mut self, reason: &str) {
        self.close(reason);
        tracing::debug!("[{}] Terminating: {}", self.name(), reason);
        self.terminated = Some(reason.to_string());
    }

    //=== I/O ===//

    fn read_socket(&mut self, ctx: &HostContext) {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_TICK {
            let Some(socket) = self.socket.as_ref() else {
                return;
            };
            match socket.try_read(&mut buf) {
                Ok(0) => {
                    self.fail(RconError::Network("connection closed by server".into()));
                    return;
                }
                Ok(n) => self.process_data(ctx, &buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.fail(e.into());
                    return;
                }
            }
        }
    }

    fn flush_outbound(&mut self) {
        while !self.outbound.is_empty() {
            let Some(socket) = self.socket.as_ref() else {
                self.outbound.clear();
                return;
            };
            match socket.try_write(&self.outbound) {
                Ok(0) => {
                    self.fail(RconError::Network("socket closed while writing".into()));
                    return;
                }
                Ok(n) => self.outbound.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.fail(e.into());
                    return;
                }
            }
        }
    }

    /// Feed raw bytes from the server
    ///
    /// Complete lines are handled at once; a trailing partial line waits for
    /// the rest. An open response block stays open across calls.
    pub fn process_data(&mut self, ctx: &HostContext, data: &[u8]) {
        self.read_buffer.extend_from_slice(data);
        self.last_recv = Instant::now();

        while self.terminated.is_none() {
            match self.codec.decode(&mut self.read_buffer) {
                Ok(Some(line)) => self.process_line(ctx, &line),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("[{}] Framing error: {}", self.name(), e);
                    break;
                }
            }
        }

        self.flush_events(ctx);
    }

    fn process_line(&mut self, ctx: &HostContext, line: &[u8]) {
        let Some(delimiter) = self.delimiter else {
            self.handle_version(line);
            self.flush_events(ctx);
            let raw = String::from_utf8_lossy(line).into_owned();
            ctx.dispatcher.dispatch_raw(self, &raw);
            return;
        };

        let Some(command) = Command::parse(line, delimiter) else {
            return;
        };
        tracing::trace!("[{}] << {}", self.name(), command.joined(" | "));

        if command.kind != CommandType::Response {
            self.finish_response(ctx);
        }

        let mut unmatched = false;
        match command.kind {
            CommandType::Version => {
                tracing::debug!("[{}] Ignoring repeated version banner", self.name());
                unmatched = true;
            }
            CommandType::Authenticated => self.handle_authenticated(&command),
            CommandType::Error => self.handle_error(&command),
            CommandType::CommandEcho => {
                self.response = Some(ResponseTable::new(command.field(0)));
            }
            CommandType::Response => self.handle_response(&command),
            CommandType::Log => {
                let log = classify_log(&command);
                if log.is_known() {
                    let events = self.game.apply(&log);
                    self.handle_game_events(ctx, events);
                } else {
                    unmatched = true;
                }
            }
            CommandType::Other(_) => unmatched = true,
        }

        self.sync_travelling();
        self.flush_events(ctx);
        if unmatched {
            ctx.dispatcher.dispatch_other(self, &command);
        }
        ctx.dispatcher.dispatch_raw(self, &command.to_raw());
    }

    //=== Handlers ===//

    fn handle_version(&mut self, line: &[u8]) {
        let Some(banner) = parse_version_banner(line) else {
            let message = format!("malformed version banner: {}", String::from_utf8_lossy(line));
            self.fail(RconError::Protocol(message));
            return;
        };
        let Some(delimiter) = delimiter_for_version(banner.rcon_version) else {
            let message = format!("unsupported RCON protocol version {}", banner.rcon_version);
            self.fail(RconError::Protocol(message));
            return;
        };

        self.delimiter = Some(delimiter);
        self.rcon_version = banner.rcon_version;
        self.game_version = banner.game_version;
        tracing::info!(
            "[{}] RCON v{} ({}), authenticating",
            self.name(),
            self.rcon_version,
            self.game_version
        );

        let password = self.settings.password.clone();
        self.send_outbound(Outbound::Authenticate(password));
    }

    fn handle_authenticated(&mut self, command: &Command) {
        if self.state != ConnectionState::Handshaking {
            tracing::debug!("[{}] Unexpected authentication line in state {}", self.name(), self.state.as_str());
            return;
        }

        self.rcon_user = command.field(0).to_string();
        self.connection_attempts = 0;
        self.state = ConnectionState::Subscribing;
        self.subscribed_at = Some(Instant::now());
        tracing::info!("[{}] Authenticated as {}", self.name(), self.rcon_user);

        self.send_outbound(Outbound::Subscribe);
        for request in [ROSTER_COMMAND, "binfo", "gameinfo", "rotation"] {
            self.send(request);
        }
        self.send(&format!("ping {}", INIT_TOKEN));

        self.emit(GameEvent::Authenticated {
            user: self.rcon_user.clone(),
        });
    }

    fn handle_error(&mut self, command: &Command) {
        let message = command.joined(" ");
        if self.state == ConnectionState::Handshaking {
            self.fail(RconError::Authentication(message));
            return;
        }
        tracing::warn!("[{}] Server error: {}", self.name(), message);
        self.emit(GameEvent::ServerError { message });
    }

    fn handle_response(&mut self, command: &Command) {
        if command.field(0) == "PONG" {
            self.handle_pong(command.field(1));
            return;
        }
        match self.response.as_mut() {
            Some(table) => table.push(command.fields.clone()),
            None => tracing::trace!("[{}] Response row outside a block", self.name()),
        }
    }

    fn handle_pong(&mut self, token: &str) {
        self.ping_sent_at = None;
        if token != INIT_TOKEN || self.state != ConnectionState::Subscribing {
            return;
        }

        self.subscribed_at = None;
        self.state = ConnectionState::FullyConnected;
        self.last_client_update = Instant::now();
        tracing::info!(
            "[{}] Fully connected ({} players on {})",
            self.name(),
            self.game.player_count(),
            self.game.map()
        );
        self.emit(GameEvent::FullyConnected);
    }

    fn finish_response(&mut self, ctx: &HostContext) {
        if let Some(table) = self.response.take() {
            let events = self.game.apply_table(&table);
            self.handle_game_events(ctx, events);
        }
    }

    fn sync_travelling(&mut self) {
        let travelling = self.game.phase().travelling;
        self.state = match self.state {
            ConnectionState::FullyConnected if travelling => ConnectionState::Travelling,
            ConnectionState::Travelling if !travelling => ConnectionState::FullyConnected,
            state => state,
        };
    }

    /// Host-side reactions to model events, then queue them for dispatch
    fn handle_game_events(&mut self, ctx: &HostContext, events: Vec<GameEvent>) {
        for mut event in events {
            let mut matched = BanFlags::NONE;

            match &mut event {
                GameEvent::PlayerJoin { player } | GameEvent::PlayerDiscovered { player } => {
                    matched = self.screen_player(ctx, player.id);
                    if let Some(current) = self.game.get_player(player.id) {
                        *player = current.clone();
                    }
                }
                GameEvent::MatchEnd { winner, tie, .. } => {
                    let (winner, tie) = (*winner, *tie);
                    self.finalize_match(ctx, winner, tie);
                }
                GameEvent::MapStart { .. } => {
                    self.send("binfo");
                    self.send("gameinfo");
                    self.send(&format!("ping {}", TABLE_END_TOKEN));
                }
                _ => {}
            }

            let player = event.player().cloned();
            self.emit(event);

            if let Some(player) = player.filter(|_| !matched.is_empty()) {
                tracing::info!("[{}] {} matched bans: {}", self.name(), player.name, matched);
                if matched.contains(BanFlags::GAME) {
                    self.kick_player(player.id, "You are banned from this server.");
                }
                self.emit(GameEvent::BanMatched { player, flags: matched });
            }
        }
    }

    /// Start the reverse lookup and run the ban check for a new player
    fn screen_player(&mut self, ctx: &HostContext, id: PlayerId) -> BanFlags {
        let ban_check = self.settings.ban_check;
        let Some(player) = self.game.get_player_mut(id) else {
            return BanFlags::NONE;
        };

        ctx.rdns.resolve(player.ip32, player.rdns.clone());

        let Some(bans) = ctx.bans.as_ref().filter(|_| ban_check) else {
            return BanFlags::NONE;
        };
        match bans.lock().check(player) {
            Ok(flags) => flags,
            Err(e) => {
                tracing::warn!("[{}] Ban check for {} failed: {}", self.settings.name, player.name, e);
                BanFlags::NONE
            }
        }
    }

    fn finalize_match(&mut self, ctx: &HostContext, winner: Option<Team>, tie: bool) {
        self.gameover_at = None;
        self.gameover_when_empty = false;

        if !self.settings.ladder {
            return;
        }
        let Some(ladder) = ctx.ladder.as_ref() else {
            return;
        };

        let mut ladder = ladder.lock();
        if ladder.update(&self.game, winner, tie) > 0 {
            if let Err(e) = ladder.write() {
                tracing::error!("[{}] Failed to write ladder: {}", self.name(), e);
            }
        }
    }

    //=== Events ===//

    fn emit(&mut self, event: GameEvent) {
        self.events.push_back(event);
    }

    fn flush_events(&mut self, ctx: &HostContext) {
        while let Some(event) = self.events.pop_front() {
            ctx.dispatcher.dispatch(self, &event);
            self.route_chat(ctx, &event);
        }
    }

    fn route_chat(&mut self, ctx: &HostContext, event: &GameEvent) {
        let (GameEvent::Chat { player, message } | GameEvent::TeamChat { player, message }) = event else {
            return;
        };
        let prefix = ctx.config.command_prefix.as_str();
        if prefix.is_empty() || player.is_banned(BanFlags::BOT) {
            return;
        }
        if let Some(text) = message.strip_prefix(prefix) {
            ctx.commands.route(ctx, self, player, text);
        }
    }

    //=== Timers ===//

    fn do_timed_events(&mut self) {
        let now = Instant::now();

        if self.state == ConnectionState::Handshaking {
            let opened = self.connected_at.unwrap_or(now);
            if now.duration_since(opened) >= self.settings.ping_timeout {
                self.fail(RconError::Network("handshake timed out".into()));
            }
            return;
        }

        if self.state == ConnectionState::Subscribing {
            let subscribed = self.subscribed_at.unwrap_or(now);
            if now.duration_since(subscribed) >= self.settings.ping_timeout {
                self.fail(RconError::Network("initial data not received in time".into()));
                return;
            }
        }

        match self.ping_sent_at {
            Some(sent) => {
                let quiet_since = self.last_recv.max(sent);
                if now.duration_since(quiet_since) >= self.settings.ping_timeout {
                    self.fail(RconError::Network(format!(
                        "no reply within {:.1}s of a ping",
                        self.settings.ping_timeout.as_secs_f64()
                    )));
                    return;
                }
            }
            None => {
                let rate = self.settings.ping_rate;
                if now.duration_since(self.last_send) >= rate || now.duration_since(self.last_recv) >= rate {
                    if self.send(&format!("ping {}", KEEPALIVE_TOKEN)) > 0 {
                        self.ping_sent_at = Some(now);
                    }
                }
            }
        }

        if self.state == ConnectionState::FullyConnected
            && now.duration_since(self.last_client_update) >= self.settings.client_update_rate
        {
            self.last_client_update = now;
            self.send(ROSTER_COMMAND);
            self.send(&format!("ping {}", TABLE_END_TOKEN));
        }

        if self.gameover_at.is_some_and(|at| now >= at) {
            self.gameover_at = None;
            tracing::info!("[{}] Ending the match (scheduled)", self.name());
            self.send("gameover");
        }

        if self.gameover_when_empty
            && self.state == ConnectionState::FullyConnected
            && self.game.players().iter().all(|p| p.is_bot)
        {
            self.gameover_when_empty = false;
            tracing::info!("[{}] Ending the match (server empty)", self.name());
            self.send("gameover");
        }
    }

    /// End the match after `delay`
    pub fn gameover(&mut self, delay: Duration) {
        self.gameover_at = Some(Instant::now() + delay);
        if !delay.is_zero() {
            self.send_message(&format!("The match will end in {} seconds.", delay.as_secs()));
        }
    }

    /// End the match as soon as no human player is left
    pub fn gameover_when_empty(&mut self) {
        self.gameover_when_empty = true;
    }

    /// Cancel a scheduled game over
    ///
    /// # Returns
    /// `true` when one was pending
    pub fn gameover_stop(&mut self) -> bool {
        let pending = self.gameover_at.is_some() || self.gameover_when_empty;
        self.gameover_at = None;
        self.gameover_when_empty = false;
        pending
    }

    //=== Sends ===//

    fn send_outbound(&mut self, command: Outbound) -> usize {
        if self.socket.is_none() {
            return 0;
        }
        let before = self.outbound.len();
        if let Err(e) = self.codec.encode(command, &mut self.outbound) {
            tracing::warn!("[{}] Failed to encode command: {}", self.name(), e);
            return 0;
        }
        self.last_send = Instant::now();
        self.outbound.len() - before
    }

    /// Execute a console command
    ///
    /// # Returns
    /// Bytes queued, 0 when no socket is open
    pub fn send(&mut self, command: &str) -> usize {
        tracing::trace!("[{}] >> {}", self.name(), command);
        self.send_outbound(Outbound::Execute(command.to_string()))
    }

    /// Public chat message
    pub fn send_message(&mut self, message: &str) -> usize {
        self.send(&format!("say {}", message))
    }

    /// Admin message (shown prominently)
    pub fn send_admin_message(&mut self, message: &str) -> usize {
        self.send(&format!("amsg {}", message))
    }

    /// Message to one player
    pub fn send_private_message(&mut self, player: PlayerId, message: &str) -> usize {
        self.send(&format!("pamsg pid{} {}", player, message))
    }

    pub fn kick_player(&mut self, player: PlayerId, reason: &str) -> usize {
        self.send(&format!("kick pid{} {}", player, reason))
    }

    /// Store a game ban for a connected player and kick them
    ///
    /// # Arguments
    /// * `duration` - Seconds, 0 for permanent
    ///
    /// # Returns
    /// Bytes queued for the kick, 0 when no socket is open
    pub fn ban_player(&mut self, ctx: &HostContext, player: PlayerId, banner: &str, reason: &str, duration: u64) -> usize {
        if let Some(target) = self.game.get_player_mut(player) {
            target.ban_flags |= BanFlags::GAME;
            let target = target.clone();
            ctx.add_ban(&target, banner, reason, duration, BanFlags::GAME);
        }
        self.kick_player(player, reason)
    }
}
