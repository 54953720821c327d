use crate::{Error, FlagId, HostApi, PlayerId, Plugin, Registrations};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lifecycle notifications delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A player connected
    PlayerJoin { player_id: PlayerId },
    /// A player disconnected
    PlayerPart { player_id: PlayerId },
    /// A player came to life
    PlayerSpawn { player_id: PlayerId },
    /// A player dropped or lost a flag
    FlagDropped {
        player_id: PlayerId,
        #[serde(default)]
        flag_id: Option<FlagId>,
        #[serde(default)]
        flag: Option<String>,
    },
    /// Periodic server tick
    Tick,
    /// A live player's state was updated
    PlayerUpdate { player_id: PlayerId },
}

/// Event tags that plugins register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PlayerJoin,
    PlayerPart,
    PlayerSpawn,
    FlagDropped,
    Tick,
    PlayerUpdate,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::PlayerJoin,
        EventType::PlayerPart,
        EventType::PlayerSpawn,
        EventType::FlagDropped,
        EventType::Tick,
        EventType::PlayerUpdate,
    ];
}

impl Event {
    /// Tag of this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::PlayerJoin { .. } => EventType::PlayerJoin,
            Event::PlayerPart { .. } => EventType::PlayerPart,
            Event::PlayerSpawn { .. } => EventType::PlayerSpawn,
            Event::FlagDropped { .. } => EventType::FlagDropped,
            Event::Tick => EventType::Tick,
            Event::PlayerUpdate { .. } => EventType::PlayerUpdate,
        }
    }

    /// Convert event to JSON string
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self)
            .map_err(|e| Error::Event(format!("Failed to serialize event: {}", e)))
    }

    /// Create event from JSON string
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::Event(format!("Failed to deserialize event: {}", e)))
    }
}

struct LoadedPlugin {
    plugin: Box<dyn Plugin>,
    registrations: Registrations,
}

/// Delivers host events to the plugins registered for them.
///
/// Dispatch is serial: every handler runs to completion before the next one
/// starts, in the order the plugins were loaded.
#[derive(Default)]
pub struct EventBus {
    plugins: Vec<LoadedPlugin>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise a plugin with its config string and start delivering to it
    pub fn load(&mut self, mut plugin: Box<dyn Plugin>, config: &str) -> Result<(), Error> {
        let name = plugin.name();
        if self.plugins.iter().any(|loaded| loaded.plugin.name() == name) {
            return Err(Error::AlreadyLoaded(name));
        }

        let mut registrations = Registrations::new();
        plugin.init(config, &mut registrations);

        info!(
            "Loaded plugin '{}' listening for {:?}",
            name,
            registrations.iter().collect::<Vec<_>>()
        );

        self.plugins.push(LoadedPlugin {
            plugin,
            registrations,
        });
        Ok(())
    }

    /// Clean up a plugin and drop all of its subscriptions
    pub fn unload(&mut self, name: &str) -> Result<(), Error> {
        let index = self
            .plugins
            .iter()
            .position(|loaded| loaded.plugin.name() == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        let mut loaded = self.plugins.remove(index);
        loaded.plugin.cleanup(&mut loaded.registrations);
        info!("Unloaded plugin '{}'", name);
        Ok(())
    }

    /// Unload every plugin, most recently loaded first
    pub fn unload_all(&mut self) {
        while let Some(mut loaded) = self.plugins.pop() {
            loaded.plugin.cleanup(&mut loaded.registrations);
            info!("Unloaded plugin '{}'", loaded.plugin.name());
        }
    }

    /// Emit an event
    pub fn emit(&mut self, host: &mut dyn HostApi, event: &Event) {
        let event_type = event.event_type();
        for loaded in &mut self.plugins {
            if loaded.registrations.is_registered(event_type) {
                loaded.plugin.event(host, event);
            }
        }
    }

    /// Names of the plugins registered for an event type
    pub fn subscribers(&self, event_type: EventType) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|loaded| loaded.registrations.is_registered(event_type))
            .map(|loaded| loaded.plugin.name())
            .collect()
    }

    /// Names of all loaded plugins
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|loaded| loaded.plugin.name()).collect()
    }

    /// Status reports of all loaded plugins, keyed by name
    pub fn plugin_status(&self) -> serde_json::Value {
        let statuses: serde_json::Map<String, serde_json::Value> = self
            .plugins
            .iter()
            .map(|loaded| (loaded.plugin.name(), loaded.plugin.status()))
            .collect();
        serde_json::Value::Object(statuses)
    }

    /// Get statistics about the event bus
    pub fn stats(&self) -> EventBusStats {
        let total_subscriptions = self
            .plugins
            .iter()
            .map(|loaded| loaded.registrations.len())
            .sum();
        let total_event_types = EventType::ALL
            .iter()
            .filter(|event_type| !self.subscribers(**event_type).is_empty())
            .count();

        EventBusStats {
            total_plugins: self.plugins.len(),
            total_event_types,
            total_subscriptions,
        }
    }
}

/// Event bus statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusStats {
    pub total_plugins: usize,
    pub total_event_types: usize,
    pub total_subscriptions: usize,
}
