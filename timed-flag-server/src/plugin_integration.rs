use timed_flag_plugin::{
    Event, EventBus, EventType, HostApi, PlayerId, ServerState, TimedFlagOnSpawn,
    api_host::HeldFlag,
};
use tracing::{info, warn};

/// Plugin system integration for the in-memory server
pub struct PluginSystem {
    /// Server state the plugins act on
    pub host: ServerState,
    /// Event bus holding the loaded plugins
    pub event_bus: EventBus,
    /// Whether plugin system is initialized
    initialized: bool,
}

impl PluginSystem {
    /// Create a new plugin system around a server
    pub fn new(host: ServerState) -> Self {
        Self {
            host,
            event_bus: EventBus::new(),
            initialized: false,
        }
    }

    /// Load the timed flag plugin with its config string
    pub fn initialize(&mut self, config: &str) -> Result<(), Error> {
        if self.initialized {
            warn!("Plugin system already initialized");
            return Ok(());
        }

        info!("Starting plugin system initialization");
        self.event_bus
            .load(Box::new(TimedFlagOnSpawn::new()), config)?;
        self.initialized = true;

        info!("Loaded {} plugins", self.event_bus.plugin_names().len());
        Ok(())
    }

    /// Unload all plugins
    pub fn shutdown(&mut self) {
        if !self.initialized {
            warn!("Plugin system not initialized");
            return;
        }

        info!("Shutting down plugin system");
        self.event_bus.unload_all();
        self.initialized = false;
    }

    /// Deliver an event to the plugins
    pub fn handle_event(&mut self, event: &Event) {
        self.event_bus.emit(&mut self.host, event);
    }

    // ===== Server activity =====

    /// Connect a player
    pub fn join(&mut self, player_id: PlayerId, callsign: &str) {
        self.host.add_player(player_id, callsign);
        self.handle_event(&Event::PlayerJoin { player_id });
    }

    /// Disconnect a player
    pub fn part(&mut self, player_id: PlayerId) -> Result<(), Error> {
        self.host.remove_player(player_id)?;
        self.handle_event(&Event::PlayerPart { player_id });
        Ok(())
    }

    /// Bring a player to life
    pub fn spawn(&mut self, player_id: PlayerId) -> Result<(), Error> {
        self.host.spawn_player(player_id)?;
        self.handle_event(&Event::PlayerSpawn { player_id });
        Ok(())
    }

    /// Kill a player, dropping whatever they held
    pub fn kill(&mut self, player_id: PlayerId) -> Result<Option<HeldFlag>, Error> {
        let dropped = self.host.kill_player(player_id)?;
        self.flag_dropped(player_id, dropped.as_ref());
        Ok(dropped)
    }

    /// Drop the player's flag
    pub fn drop_flag(&mut self, player_id: PlayerId) -> Result<Option<HeldFlag>, Error> {
        let dropped = self.host.drop_flag(player_id)?;
        self.flag_dropped(player_id, dropped.as_ref());
        Ok(dropped)
    }

    /// Pick up a flag through normal play
    pub fn pick_up(&mut self, player_id: PlayerId, flag: &str) -> Result<bool, Error> {
        Ok(self.host.pick_up_flag(player_id, flag)?)
    }

    /// Send a player update; dead players get none. Returns whether it was sent
    pub fn update(&mut self, player_id: PlayerId) -> Result<bool, Error> {
        let player = self
            .host
            .player(player_id)
            .ok_or(timed_flag_plugin::Error::PlayerNotFound(player_id))?;
        if !player.alive {
            return Ok(false);
        }
        self.handle_event(&Event::PlayerUpdate { player_id });
        Ok(true)
    }

    /// One server tick: the tick event plus an update for every live player
    pub fn tick(&mut self) {
        self.handle_event(&Event::Tick);
        for player_id in self.host.player_index_list() {
            if self.host.player_is_alive(player_id) {
                self.handle_event(&Event::PlayerUpdate { player_id });
            }
        }
    }

    fn flag_dropped(&mut self, player_id: PlayerId, dropped: Option<&HeldFlag>) {
        if let Some(flag) = dropped {
            self.handle_event(&Event::FlagDropped {
                player_id,
                flag_id: Some(flag.id),
                flag: Some(flag.flag.clone()),
            });
        }
    }

    /// Get plugin system status
    pub fn status(&self) -> PluginSystemStatus {
        let stats = self.event_bus.stats();
        PluginSystemStatus {
            initialized: self.initialized,
            loaded_plugins: stats.total_plugins,
            event_subscriptions: stats.total_subscriptions,
            tick_subscribers: self.event_bus.subscribers(EventType::Tick).len(),
            update_subscribers: self.event_bus.subscribers(EventType::PlayerUpdate).len(),
            connected_players: self.host.players().count(),
            flags_held: self.host.players().filter(|player| player.flag.is_some()).count(),
            server_time: self.host.current_time(),
        }
    }
}

/// Plugin system status
#[derive(Debug, Clone)]
pub struct PluginSystemStatus {
    pub initialized: bool,
    pub loaded_plugins: usize,
    pub event_subscriptions: usize,
    pub tick_subscribers: usize,
    pub update_subscribers: usize,
    pub connected_players: usize,
    pub flags_held: usize,
    pub server_time: f64,
}

/// Error type for plugin system
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Plugin system error: {0}")]
    PluginSystem(String),
}

impl From<timed_flag_plugin::Error> for Error {
    fn from(e: timed_flag_plugin::Error) -> Self {
        Error::PluginSystem(format!("{}", e))
    }
}
