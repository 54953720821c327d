use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Host-assigned player identifier
pub type PlayerId = i32;

/// Host-assigned identifier of one concrete flag instance
pub type FlagId = i32;

/// Capabilities the host server exposes to plugins.
///
/// Commands are fire-and-forget from the plugin's point of view: the returned
/// success flag may be inspected but nothing is retried.
pub trait HostApi {
    /// Current server time in seconds
    fn current_time(&self) -> f64;

    /// Identifiers of all connected players
    fn player_index_list(&self) -> Vec<PlayerId>;

    /// Instance id of the flag the player currently holds
    fn player_flag_id(&self, player_id: PlayerId) -> Option<FlagId>;

    /// Whether the player is currently alive
    fn player_is_alive(&self, player_id: PlayerId) -> bool;

    /// Give a flag to a player; `force` bypasses the one-flag-at-a-time rule
    fn give_player_flag(&mut self, player_id: PlayerId, flag: &str, force: bool) -> bool;

    /// Take away whatever flag the player holds
    fn remove_player_flag(&mut self, player_id: PlayerId) -> bool;
}

/// A flag held by a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldFlag {
    pub id: FlagId,
    pub flag: String,
}

/// Player information
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub callsign: String,
    pub alive: bool,
    pub flag: Option<HeldFlag>,
}

/// In-memory server state implementing the host capabilities
#[derive(Debug, Default)]
pub struct ServerState {
    /// Connected players, ordered by id
    players: BTreeMap<PlayerId, PlayerRecord>,
    /// Flag codes the server knows about; empty accepts any code
    known_flags: HashSet<String>,
    /// Last flag instance id handed out
    last_flag_id: FlagId,
    /// Server clock in seconds
    now: f64,
}

impl ServerState {
    /// Create an empty server at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict grants to the given flag codes
    pub fn with_known_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    // ===== Clock =====

    /// Move the clock forward
    pub fn advance_time(&mut self, seconds: f64) {
        self.now += seconds;
    }

    /// Set the clock to an absolute time
    pub fn set_time(&mut self, now: f64) {
        self.now = now;
    }

    // ===== Player Management =====

    /// Connect a player; a reused id replaces the previous record
    pub fn add_player(&mut self, player_id: PlayerId, callsign: impl Into<String>) {
        let callsign = callsign.into();
        debug!("Player {} ({}) connected", player_id, callsign);
        self.players.insert(
            player_id,
            PlayerRecord {
                id: player_id,
                callsign,
                alive: false,
                flag: None,
            },
        );
    }

    /// Disconnect a player
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<PlayerRecord> {
        debug!("Player {} disconnected", player_id);
        self.players
            .remove(&player_id)
            .ok_or(Error::PlayerNotFound(player_id))
    }

    /// Bring a player to life
    pub fn spawn_player(&mut self, player_id: PlayerId) -> Result<()> {
        let player = self.player_mut(player_id)?;
        player.alive = true;
        Ok(())
    }

    /// Kill a player, returning the flag they were holding
    pub fn kill_player(&mut self, player_id: PlayerId) -> Result<Option<HeldFlag>> {
        let player = self.player_mut(player_id)?;
        player.alive = false;
        Ok(player.flag.take())
    }

    /// Drop the player's flag, returning it if they held one
    pub fn drop_flag(&mut self, player_id: PlayerId) -> Result<Option<HeldFlag>> {
        Ok(self.player_mut(player_id)?.flag.take())
    }

    /// Pick up a flag through normal play; fails if already holding one
    pub fn pick_up_flag(&mut self, player_id: PlayerId, flag: &str) -> Result<bool> {
        if !self.is_known_flag(flag) {
            return Ok(false);
        }
        let player = self.players.get(&player_id).ok_or(Error::PlayerNotFound(player_id))?;
        if !player.alive || player.flag.is_some() {
            return Ok(false);
        }
        self.grant(player_id, flag);
        Ok(true)
    }

    /// Get a player record
    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&player_id)
    }

    /// All connected players
    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    // ===== Helper Methods =====

    fn player_mut(&mut self, player_id: PlayerId) -> Result<&mut PlayerRecord> {
        self.players
            .get_mut(&player_id)
            .ok_or(Error::PlayerNotFound(player_id))
    }

    fn is_known_flag(&self, flag: &str) -> bool {
        self.known_flags.is_empty() || self.known_flags.contains(flag)
    }

    fn grant(&mut self, player_id: PlayerId, flag: &str) -> Option<FlagId> {
        self.last_flag_id += 1;
        let id = self.last_flag_id;
        let player = self.players.get_mut(&player_id)?;
        player.flag = Some(HeldFlag {
            id,
            flag: flag.to_string(),
        });
        Some(id)
    }
}

impl HostApi for ServerState {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn player_index_list(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    fn player_flag_id(&self, player_id: PlayerId) -> Option<FlagId> {
        self.players
            .get(&player_id)
            .and_then(|player| player.flag.as_ref())
            .map(|flag| flag.id)
    }

    fn player_is_alive(&self, player_id: PlayerId) -> bool {
        self.players
            .get(&player_id)
            .map(|player| player.alive)
            .unwrap_or(false)
    }

    fn give_player_flag(&mut self, player_id: PlayerId, flag: &str, force: bool) -> bool {
        if !self.is_known_flag(flag) {
            debug!("Refusing unknown flag {} for player {}", flag, player_id);
            return false;
        }
        match self.players.get(&player_id) {
            Some(player) if player.alive && (force || player.flag.is_none()) => {}
            _ => return false,
        }
        self.grant(player_id, flag).is_some()
    }

    fn remove_player_flag(&mut self, player_id: PlayerId) -> bool {
        self.players
            .get_mut(&player_id)
            .and_then(|player| player.flag.take())
            .is_some()
    }
}
