//! # Event Dispatcher
//!
//! Fans every [`GameEvent`] out to the registered observers.
//!
//! # Observers
//!
//! - **Plugins** implement [`Plugin`]. Every hook has a no-op default, and
//!   [`Plugin::wants`] filters which event kinds reach `on_event`.
//! - **Closures** are registered per [`EventKind`] with
//!   [`EventDispatcher::subscribe`].
//!
//! # Ordering
//!
//! For one inbound line:
//! 1. each event goes to the plugins, then to the closures, in registration
//!    order
//! 2. `on_other` when the line matched nothing
//! 3. `on_raw` for every line, last
//!
//! # Thread Safety
//!
//! The dispatcher is shared read-only by the polling loop once built;
//! observers keep their own state behind whatever lock they need.

use crate::connection::Connection;
use rcon_game::{EventKind, GameEvent};
use rcon_protocol::Command;
use rcon_storage::BanRecord;
use std::collections::HashMap;

/// An observer of one or more servers
///
/// # Example
///
/// ```no_run
/// use rcon_network::{Connection, Plugin};
/// use rcon_game::{EventKind, GameEvent};
///
/// struct Greeter;
///
/// impl Plugin for Greeter {
///     fn name(&self) -> &str {
///         "greeter"
///     }
///
///     fn wants(&self, kind: EventKind) -> bool {
///         kind == EventKind::PlayerJoin
///     }
///
///     fn on_event(&self, conn: &mut Connection, event: &GameEvent) {
///         if let Some(player) = event.player() {
///             conn.send_message(&format!("Welcome, {}", player.name));
///         }
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Capability filter for [`Plugin::on_event`]
    fn wants(&self, _kind: EventKind) -> bool {
        true
    }

    fn on_event(&self, _conn: &mut Connection, _event: &GameEvent) {}

    /// A line no classifier recognised
    fn on_other(&self, _conn: &mut Connection, _command: &Command) {}

    /// Every inbound line, rendered back to text
    fn on_raw(&self, _conn: &mut Connection, _line: &str) {}

    /// Extra key/value pairs to persist with a new ban
    fn ban_annotation(&self, _record: &BanRecord) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Closure subscribed to one event kind
pub type EventHandler = Box<dyn Fn(&mut Connection, &GameEvent) + Send + Sync>;

/// Registry of observers
#[derive(Default)]
pub struct EventDispatcher {
    plugins: Vec<Box<dyn Plugin>>,
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin
    pub fn register_plugin<P: Plugin + 'static>(&mut self, plugin: P) {
        tracing::info!("Registered plugin: {}", plugin.name());
        self.plugins.push(Box::new(plugin));
    }

    /// Register a closure for one event kind
    ///
    /// # Arguments
    /// * `kind` - Event kind to receive
    /// * `handler` - Called with the originating connection and the event
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&mut Connection, &GameEvent) + Send + Sync + 'static,
    {
        tracing::debug!("Subscribed handler for {:?}", kind);
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    #[inline]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Names of the registered plugins, in registration order
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Deliver one event
    pub fn dispatch(&self, conn: &mut Connection, event: &GameEvent) {
        let kind = event.kind();
        tracing::trace!("[{}] dispatch {:?}", conn.name(), kind);

        for plugin in &self.plugins {
            if plugin.wants(kind) {
                plugin.on_event(conn, event);
            }
        }

        if let Some(handlers) = self.handlers.get(&kind) {
            for handler in handlers {
                handler(conn, event);
            }
        }
    }

    /// Deliver a line nothing recognised
    pub fn dispatch_other(&self, conn: &mut Connection, command: &Command) {
        for plugin in &self.plugins {
            plugin.on_other(conn, command);
        }
    }

    /// Deliver the raw text of a line
    pub fn dispatch_raw(&self, conn: &mut Connection, line: &str) {
        for plugin in &self.plugins {
            plugin.on_raw(conn, line);
        }
    }

    /// Collect every plugin's annotations for a new ban
    pub fn ban_annotations(&self, record: &BanRecord) -> Vec<(String, String)> {
        self.plugins
            .iter()
            .flat_map(|plugin| plugin.ban_annotation(record))
            .collect()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("plugins", &self.plugin_names())
            .field("handlers", &self.handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rcon_config::ServerSettings;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        only: Option<EventKind>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn wants(&self, kind: EventKind) -> bool {
            self.only.map_or(true, |only| only == kind)
        }

        fn on_event(&self, _conn: &mut Connection, event: &GameEvent) {
            self.log.lock().push(format!("{}:{:?}", self.name, event.kind()));
        }

        fn on_other(&self, _conn: &mut Connection, _command: &Command) {
            self.log.lock().push(format!("{}:other", self.name));
        }

        fn on_raw(&self, _conn: &mut Connection, _line: &str) {
            self.log.lock().push(format!("{}:raw", self.name));
        }

        fn ban_annotation(&self, _record: &BanRecord) -> Vec<(String, String)> {
            vec![(self.name.to_string(), "seen".to_string())]
        }
    }

    fn recorder(name: &'static str, only: Option<EventKind>, log: &Arc<Mutex<Vec<String>>>) -> Recorder {
        Recorder {
            name,
            only,
            log: log.clone(),
        }
    }

    #[test]
    fn test_plugins_then_closures_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_plugin(recorder("a", None, &log));
        dispatcher.register_plugin(recorder("b", Some(EventKind::HostChat), &log));
        let closure_log = log.clone();
        dispatcher.subscribe(EventKind::FullyConnected, move |_, _| {
            closure_log.lock().push("closure".into());
        });

        let mut conn = Connection::new(ServerSettings::new("test"));
        dispatcher.dispatch(&mut conn, &GameEvent::FullyConnected);
        dispatcher.dispatch(&mut conn, &GameEvent::HostChat { message: "hi".into() });

        assert_eq!(
            *log.lock(),
            vec!["a:FullyConnected", "closure", "a:HostChat", "b:HostChat"]
        );
    }

    #[test]
    fn test_other_raw_and_annotations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_plugin(recorder("a", None, &log));
        dispatcher.register_plugin(recorder("b", None, &log));

        let mut conn = Connection::new(ServerSettings::new("test"));
        let command = Command::parse(b"xwhatever", rcon_protocol::DELIMITER_V3).unwrap();
        dispatcher.dispatch_other(&mut conn, &command);
        dispatcher.dispatch_raw(&mut conn, "xwhatever");
        assert_eq!(*log.lock(), vec!["a:other", "b:other", "a:raw", "b:raw"]);

        let annotations = dispatcher.ban_annotations(&BanRecord::default());
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[1].0, "b");
        assert_eq!(dispatcher.plugin_names(), vec!["a", "b"]);
    }
}
