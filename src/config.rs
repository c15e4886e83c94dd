//! Runtime configuration loaded from environment variables (and `.env`).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Limits and timers that shape a room's life
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Range upper bound when a challenge doesn't name one
    pub default_max_number: u32,
    /// Largest range a challenge may ask for
    pub max_number_ceiling: u32,
    pub max_name_chars: usize,
    pub max_challenge_chars: usize,
    /// Rooms older than this are swept regardless of state
    pub idle_ttl: Duration,
    /// How long a completed room stays around for rejoins and spectators
    pub completed_grace: Duration,
    pub sweep_interval: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_max_number: 10,
            max_number_ceiling: 1000,
            max_name_chars: 30,
            max_challenge_chars: 200,
            idle_ttl: Duration::from_secs(60 * 60),
            completed_grace: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RoomConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_number: env_parse::<u32>("DEFAULT_MAX_NUMBER")
                .filter(|n| *n >= 1)
                .unwrap_or(defaults.default_max_number),
            max_number_ceiling: env_parse::<u32>("MAX_NUMBER_CEILING")
                .filter(|n| *n >= 1)
                .unwrap_or(defaults.max_number_ceiling),
            max_name_chars: env_parse("MAX_NAME_CHARS").unwrap_or(defaults.max_name_chars),
            max_challenge_chars: env_parse("MAX_CHALLENGE_CHARS")
                .unwrap_or(defaults.max_challenge_chars),
            idle_ttl: env_parse::<u64>("ROOM_IDLE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_ttl),
            completed_grace: env_parse::<u64>("ROOM_COMPLETED_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.completed_grace),
            sweep_interval: env_parse::<u64>("ROOM_SWEEP_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// SQLite file for game history (`:memory:` for a throwaway store)
    pub db_path: String,
    pub static_dir: String,
    /// Max rows returned by `GET /history`
    pub history_limit: u32,
    pub rooms: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            db_path: "data/games.db".to_string(),
            static_dir: "public".to_string(),
            history_limit: 50,
            rooms: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            bind_addr: env_parse("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_parse("PORT").unwrap_or(defaults.port),
            db_path: env_string("DB_PATH").unwrap_or(defaults.db_path),
            static_dir: env_string("STATIC_DIR").unwrap_or(defaults.static_dir),
            history_limit: env_parse::<u32>("HISTORY_LIMIT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.history_limit),
            rooms: RoomConfig::from_env(),
        };

        tracing::info!(
            port = config.port,
            db_path = %config.db_path,
            static_dir = %config.static_dir,
            idle_ttl_secs = config.rooms.idle_ttl.as_secs(),
            completed_grace_secs = config.rooms.completed_grace.as_secs(),
            "Server config loaded"
        );

        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Non-empty, trimmed environment variable
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Environment variable parsed into `T`; unparsable values are ignored with a warning
pub(crate) fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            None
        }
    }
}

/// Boolean flag: anything but "0"/"false" counts as on
pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    env_string(key)
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(default)
}
