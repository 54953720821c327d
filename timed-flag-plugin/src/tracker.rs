//! Hands out a random flag on spawn and takes it back once its delay runs out.

use crate::{
    Event, EventType, ExpiryMode, FlagDefinition, FlagId, HostApi, PlayerId, Plugin,
    PluginConfig, PluginMetadata, Registrations, definition::parse_flag_list,
};
use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, error, warn};

pub const METADATA: PluginMetadata = PluginMetadata {
    name: "Timed Flag On Spawn",
    major: 1,
    minor: 0,
    rev: 0,
    build: 3,
};

/// What the plugin remembers about the flag it gave a player
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagStatus {
    /// Instance id of the granted flag
    pub flag_id: Option<FlagId>,
    /// Seconds the flag may be held
    pub delay: u32,
    /// Server time of the grant
    pub given_at: f64,
    /// Whether the flag still has to be taken back
    pub needs_to_be_taken: bool,
}

impl FlagStatus {
    fn is_expired(&self, now: f64) -> bool {
        self.given_at + f64::from(self.delay) < now
    }
}

/// The Timed Flag On Spawn plugin
pub struct TimedFlagOnSpawn {
    definitions: Vec<FlagDefinition>,
    flags_given: HashMap<PlayerId, FlagStatus>,
    expiry: ExpiryMode,
    strict_grants: bool,
    rng: StdRng,
}

impl Default for TimedFlagOnSpawn {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedFlagOnSpawn {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            flags_given: HashMap::new(),
            expiry: ExpiryMode::default(),
            strict_grants: false,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Apply a resolved configuration, replacing any previous definitions
    pub fn configure(&mut self, config: &PluginConfig) {
        self.definitions = parse_flag_list(&config.flags);
        self.expiry = config.expiry;
        self.strict_grants = config.strict_grants;
        if let Some(seed) = config.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
    }

    pub fn definitions(&self) -> &[FlagDefinition] {
        &self.definitions
    }

    pub fn expiry(&self) -> ExpiryMode {
        self.expiry
    }

    /// Tracked status of a player
    pub fn flag_status(&self, player_id: PlayerId) -> Option<&FlagStatus> {
        self.flags_given.get(&player_id)
    }

    /// Number of players whose flag still has to be taken back
    pub fn pending_expiries(&self) -> usize {
        self.flags_given
            .values()
            .filter(|status| status.needs_to_be_taken)
            .count()
    }

    fn on_player_join(&mut self, player_id: PlayerId) {
        self.flags_given.insert(player_id, FlagStatus::default());
    }

    fn on_player_part(&mut self, player_id: PlayerId) {
        self.flags_given.remove(&player_id);
    }

    fn on_player_spawn(&mut self, host: &mut dyn HostApi, player_id: PlayerId) {
        let Some(definition) = self.definitions.choose(&mut self.rng) else {
            return;
        };

        let success = host.give_player_flag(player_id, &definition.flag, true);
        let flag_id = host.player_flag_id(player_id);

        let duration = if definition.expires() {
            format!("for {} seconds", definition.delay)
        } else {
            "indefinitely".to_string()
        };
        debug!(
            "player {} was given the {} flag ({:?}) {}",
            player_id, definition.flag, flag_id, duration
        );

        if !success {
            warn!(
                "host refused to give the {} flag to player {}",
                definition.flag, player_id
            );
            if self.strict_grants {
                self.flags_given.insert(player_id, FlagStatus::default());
                return;
            }
        }

        // Recorded even when the grant failed unless strict grants are on;
        // the expiry then stays armed for a flag the player may never hold.
        let status = self.flags_given.entry(player_id).or_default();
        status.needs_to_be_taken = definition.expires();
        status.given_at = host.current_time();
        status.flag_id = flag_id;
        status.delay = definition.delay;
    }

    fn on_flag_dropped(&mut self, player_id: PlayerId) {
        self.flags_given.entry(player_id).or_default().needs_to_be_taken = false;
    }

    fn on_tick(&mut self, host: &mut dyn HostApi) {
        for player_id in host.player_index_list() {
            // Don't bother doing any checks if the player isn't alive
            if !host.player_is_alive(player_id) {
                continue;
            }
            self.check_player_flag(host, player_id);
        }
    }

    fn check_player_flag(&mut self, host: &mut dyn HostApi, player_id: PlayerId) {
        let Some(status) = self.flags_given.get_mut(&player_id) else {
            return;
        };
        if !status.needs_to_be_taken {
            return;
        }

        let now = host.current_time();
        let times_up = status.is_expired(now);
        let same_flag = status.flag_id == host.player_flag_id(player_id);

        if times_up && same_flag {
            host.remove_player_flag(player_id);
            status.needs_to_be_taken = false;

            debug!(
                "took flag from player {} at {} (given at {} for {} seconds)",
                player_id, now, status.given_at, status.delay
            );
        }
    }
}

impl Plugin for TimedFlagOnSpawn {
    fn name(&self) -> String {
        METADATA.to_string()
    }

    fn init(&mut self, config: &str, registrations: &mut Registrations) {
        registrations.register(EventType::FlagDropped);
        registrations.register(EventType::PlayerJoin);
        registrations.register(EventType::PlayerPart);
        registrations.register(EventType::PlayerSpawn);

        match PluginConfig::from_init(config) {
            Ok(config) => self.configure(&config),
            Err(e) => error!("{}", e),
        }

        registrations.register(match self.expiry {
            ExpiryMode::Tick => EventType::Tick,
            ExpiryMode::PlayerUpdate => EventType::PlayerUpdate,
        });

        if self.definitions.is_empty() {
            warn!("You have not loaded any flag definitions");
        }
    }

    fn cleanup(&mut self, registrations: &mut Registrations) {
        registrations.flush();
        self.flags_given.clear();
    }

    fn event(&mut self, host: &mut dyn HostApi, event: &Event) {
        match event {
            Event::FlagDropped { player_id, .. } => self.on_flag_dropped(*player_id),
            Event::PlayerJoin { player_id } => self.on_player_join(*player_id),
            Event::PlayerPart { player_id } => self.on_player_part(*player_id),
            Event::PlayerSpawn { player_id } => self.on_player_spawn(host, *player_id),
            Event::Tick => self.on_tick(host),
            Event::PlayerUpdate { player_id } => self.check_player_flag(host, *player_id),
        }
    }

    fn status(&self) -> serde_json::Value {
        let mut players: Vec<_> = self.flags_given.iter().collect();
        players.sort_by_key(|(player_id, _)| **player_id);

        json!({
            "definitions": self.definitions,
            "expiry": self.expiry,
            "strict_grants": self.strict_grants,
            "pending_expiries": self.pending_expiries(),
            "players": players
                .into_iter()
                .map(|(player_id, status)| json!({ "player_id": player_id, "status": status }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerState;

    fn plugin(config: &str) -> (TimedFlagOnSpawn, Registrations) {
        let mut plugin = TimedFlagOnSpawn::new();
        let mut registrations = Registrations::new();
        plugin.init(config, &mut registrations);
        (plugin, registrations)
    }

    fn join_and_spawn(plugin: &mut TimedFlagOnSpawn, host: &mut ServerState, player_id: PlayerId) {
        host.add_player(player_id, format!("player{}", player_id));
        plugin.event(host, &Event::PlayerJoin { player_id });
        host.spawn_player(player_id).unwrap();
        plugin.event(host, &Event::PlayerSpawn { player_id });
    }

    #[test]
    fn test_registrations_follow_expiry_mode() {
        let (_, registrations) = plugin("WG=15");
        assert!(registrations.is_registered(EventType::Tick));
        assert!(!registrations.is_registered(EventType::PlayerUpdate));
        assert!(registrations.is_registered(EventType::PlayerSpawn));
        assert!(registrations.is_registered(EventType::FlagDropped));
        assert!(registrations.is_registered(EventType::PlayerJoin));
        assert!(registrations.is_registered(EventType::PlayerPart));
    }

    #[test]
    fn test_cleanup_unregisters_everything() {
        let (mut plugin, mut registrations) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);

        plugin.cleanup(&mut registrations);
        assert!(registrations.is_empty());
        assert!(plugin.flag_status(1).is_none());
    }

    #[test]
    fn test_player_update_mode_from_file() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "flags = \"WG=15\"\nexpiry = \"player_update\"").unwrap();

        let (plugin, registrations) = plugin(file.path().to_str().unwrap());
        assert_eq!(plugin.expiry(), ExpiryMode::PlayerUpdate);
        assert!(registrations.is_registered(EventType::PlayerUpdate));
        assert!(!registrations.is_registered(EventType::Tick));
    }

    #[test]
    fn test_bad_config_file_leaves_plugin_inert() {
        let (mut plugin, registrations) = plugin("/nonexistent/timed-flag.toml");
        assert!(plugin.definitions().is_empty());
        assert!(registrations.is_registered(EventType::Tick));

        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);
        assert_eq!(host.player_flag_id(1), None);
    }

    #[test]
    fn test_join_resets_status() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);
        assert!(plugin.flag_status(1).unwrap().needs_to_be_taken);

        // same id reused by a new connection
        plugin.event(&mut host, &Event::PlayerJoin { player_id: 1 });
        assert_eq!(plugin.flag_status(1), Some(&FlagStatus::default()));
    }

    #[test]
    fn test_spawn_grants_flag() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        host.set_time(100.0);
        join_and_spawn(&mut plugin, &mut host, 1);

        let held = host.player(1).unwrap().flag.clone().unwrap();
        assert_eq!(held.flag, "WG");

        let status = plugin.flag_status(1).unwrap();
        assert_eq!(status.flag_id, Some(held.id));
        assert_eq!(status.delay, 15);
        assert_eq!(status.given_at, 100.0);
        assert!(status.needs_to_be_taken);
        assert_eq!(plugin.pending_expiries(), 1);
    }

    #[test]
    fn test_spawn_without_definitions_does_nothing() {
        let (mut plugin, _) = plugin("garbage");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);

        assert_eq!(host.player_flag_id(1), None);
        assert_eq!(plugin.flag_status(1), Some(&FlagStatus::default()));
    }

    #[test]
    fn test_flag_removed_after_delay() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);

        host.set_time(10.0);
        plugin.event(&mut host, &Event::Tick);
        assert!(host.player_flag_id(1).is_some());

        // exactly at the deadline the flag is still held
        host.set_time(15.0);
        plugin.event(&mut host, &Event::Tick);
        assert!(host.player_flag_id(1).is_some());

        host.set_time(15.5);
        plugin.event(&mut host, &Event::Tick);
        assert_eq!(host.player_flag_id(1), None);
        assert!(!plugin.flag_status(1).unwrap().needs_to_be_taken);
        assert_eq!(plugin.pending_expiries(), 0);
    }

    #[test]
    fn test_zero_delay_is_never_removed() {
        let (mut plugin, _) = plugin("ST=0");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);
        assert!(!plugin.flag_status(1).unwrap().needs_to_be_taken);

        for second in 1..=100 {
            host.set_time(f64::from(second) * 10.0);
            plugin.event(&mut host, &Event::Tick);
        }
        assert!(host.player_flag_id(1).is_some());
    }

    #[test]
    fn test_drop_cancels_expiry() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);

        host.set_time(5.0);
        let dropped = host.drop_flag(1).unwrap().unwrap();
        plugin.event(
            &mut host,
            &Event::FlagDropped {
                player_id: 1,
                flag_id: Some(dropped.id),
                flag: Some(dropped.flag),
            },
        );

        // picks the same kind of flag back up through normal play
        assert!(host.pick_up_flag(1, "GM").unwrap());
        host.set_time(60.0);
        plugin.event(&mut host, &Event::Tick);
        assert!(host.player_flag_id(1).is_some());
    }

    #[test]
    fn test_different_flag_instance_keeps_expiry_pending() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);

        // flag swapped without a drop notification reaching the plugin
        host.drop_flag(1).unwrap();
        assert!(host.pick_up_flag(1, "SW").unwrap());

        host.set_time(30.0);
        plugin.event(&mut host, &Event::Tick);
        assert!(host.player_flag_id(1).is_some());
        assert!(plugin.flag_status(1).unwrap().needs_to_be_taken);
    }

    /// Host with a single player whose liveness and flag are fixed
    struct FixedHost {
        now: f64,
        alive: bool,
        flag_id: Option<FlagId>,
        removals: usize,
    }

    impl HostApi for FixedHost {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn player_index_list(&self) -> Vec<PlayerId> {
            vec![1]
        }

        fn player_flag_id(&self, _player_id: PlayerId) -> Option<FlagId> {
            self.flag_id
        }

        fn player_is_alive(&self, _player_id: PlayerId) -> bool {
            self.alive
        }

        fn give_player_flag(&mut self, _player_id: PlayerId, _flag: &str, _force: bool) -> bool {
            self.flag_id = Some(40);
            true
        }

        fn remove_player_flag(&mut self, _player_id: PlayerId) -> bool {
            self.removals += 1;
            self.flag_id.take().is_some()
        }
    }

    #[test]
    fn test_tick_skips_dead_players() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = FixedHost {
            now: 0.0,
            alive: true,
            flag_id: None,
            removals: 0,
        };
        plugin.event(&mut host, &Event::PlayerJoin { player_id: 1 });
        plugin.event(&mut host, &Event::PlayerSpawn { player_id: 1 });

        host.now = 30.0;
        host.alive = false;
        plugin.event(&mut host, &Event::Tick);
        assert_eq!(host.removals, 0);
        assert!(plugin.flag_status(1).unwrap().needs_to_be_taken);

        // player updates are only sent for live players, so no check there
        plugin.event(&mut host, &Event::PlayerUpdate { player_id: 1 });
        assert_eq!(host.removals, 1);
        assert!(!plugin.flag_status(1).unwrap().needs_to_be_taken);
    }

    #[test]
    fn test_player_update_checks_only_that_player() {
        let mut plugin = TimedFlagOnSpawn::new();
        plugin.configure(&PluginConfig {
            expiry: ExpiryMode::PlayerUpdate,
            ..PluginConfig::from_flags("WG=15")
        });
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 1);
        join_and_spawn(&mut plugin, &mut host, 2);

        host.set_time(20.0);
        plugin.event(&mut host, &Event::PlayerUpdate { player_id: 2 });

        assert!(host.player_flag_id(1).is_some());
        assert_eq!(host.player_flag_id(2), None);
        assert_eq!(plugin.pending_expiries(), 1);
    }

    #[test]
    fn test_failed_grant_still_arms_expiry() {
        let (mut plugin, _) = plugin("XX=10");
        let mut host = ServerState::new().with_known_flags(["WG"]);
        join_and_spawn(&mut plugin, &mut host, 1);

        let status = plugin.flag_status(1).unwrap();
        assert_eq!(status.flag_id, None);
        assert!(status.needs_to_be_taken);
    }

    #[test]
    fn test_strict_grants_skip_failed_grant() {
        let mut plugin = TimedFlagOnSpawn::new();
        plugin.configure(&PluginConfig {
            strict_grants: true,
            ..PluginConfig::from_flags("XX=10")
        });
        let mut host = ServerState::new().with_known_flags(["WG"]);
        join_and_spawn(&mut plugin, &mut host, 1);

        assert!(!plugin.flag_status(1).unwrap().needs_to_be_taken);
        assert_eq!(plugin.pending_expiries(), 0);
    }

    #[test]
    fn test_strict_grants_clear_previous_grant() {
        let mut plugin = TimedFlagOnSpawn::new();
        plugin.configure(&PluginConfig {
            strict_grants: true,
            ..PluginConfig::from_flags("WG=10")
        });
        let mut host = ServerState::new().with_known_flags(["WG"]);
        host.set_time(5.0);
        join_and_spawn(&mut plugin, &mut host, 1);
        assert!(plugin.flag_status(1).unwrap().flag_id.is_some());

        // dead players cannot be given flags
        host.kill_player(1).unwrap();
        plugin.event(&mut host, &Event::PlayerSpawn { player_id: 1 });

        let status = plugin.flag_status(1).unwrap();
        assert_eq!(status.flag_id, None);
        assert_eq!(status.delay, 0);
        assert_eq!(status.given_at, 0.0);
        assert!(!status.needs_to_be_taken);
    }

    #[test]
    fn test_part_forgets_player() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 7);

        plugin.event(&mut host, &Event::PlayerPart { player_id: 7 });
        assert!(plugin.flag_status(7).is_none());
    }

    #[test]
    fn test_seeded_choice_is_reproducible() {
        let config = PluginConfig {
            seed: Some(7),
            ..PluginConfig::from_flags("WG=15;ST=0;GM=30;SW=5")
        };
        let grants = || {
            let mut plugin = TimedFlagOnSpawn::new();
            plugin.configure(&config);
            let mut host = ServerState::new();
            (1..=20)
                .map(|player_id| {
                    join_and_spawn(&mut plugin, &mut host, player_id);
                    host.player(player_id).unwrap().flag.clone().unwrap().flag
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(grants(), grants());
    }

    #[test]
    fn test_choice_covers_every_definition() {
        let config = PluginConfig {
            seed: Some(42),
            ..PluginConfig::from_flags("WG=15;ST=0;GM=30;SW=5")
        };
        let mut plugin = TimedFlagOnSpawn::new();
        plugin.configure(&config);
        let mut host = ServerState::new();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for player_id in 1..=400 {
            join_and_spawn(&mut plugin, &mut host, player_id);
            let flag = host.player(player_id).unwrap().flag.clone().unwrap().flag;
            *counts.entry(flag).or_default() += 1;
        }

        assert_eq!(counts.len(), 4, "{:?}", counts);
        for (flag, count) in &counts {
            assert!((50..=150).contains(count), "{} granted {} times", flag, count);
        }
    }

    #[test]
    fn test_status_report() {
        let (mut plugin, _) = plugin("WG=15");
        let mut host = ServerState::new();
        join_and_spawn(&mut plugin, &mut host, 2);

        let status = plugin.status();
        assert_eq!(status["pending_expiries"], 1);
        assert_eq!(status["expiry"], "tick");
        assert_eq!(status["definitions"][0]["flag"], "WG");
        assert_eq!(status["players"][0]["player_id"], 2);
        assert_eq!(plugin.name(), "Timed Flag On Spawn 1.0.0 (3)");
    }
}
