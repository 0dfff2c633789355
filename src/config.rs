//! Configuration
//!
//! Game and server settings with defaults, overridable through environment
//! variables. Unset variables keep the default; a set but unparsable one is
//! an error rather than a silent fallback.

use std::fmt::Display;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Variable set to something that does not parse.
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// Tick rate of zero.
    #[error("Tick rate must be at least 1 Hz")]
    ZeroTickRate,

    /// Negative or non-finite phase duration.
    #[error("{0} must be a finite, non-negative number of seconds")]
    BadDuration(&'static str),

    /// Negative starting balance.
    #[error("Starting balance must not be negative")]
    NegativeBalance,
}

/// Match engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Seconds spent in Starting (betting window).
    pub waiting_time: f64,
    /// Seconds spent in Ended before betting reopens.
    pub end_time: f64,
    /// Balance given to every new player.
    pub starting_balance: Decimal,
    /// House edge parameter: one round in `crash_per` crashes instantly.
    pub crash_per: NonZeroU32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 64,
            waiting_time: 5.0,
            end_time: 3.0,
            starting_balance: Decimal::from(100),
            crash_per: NonZeroU32::MIN.saturating_add(19),
        }
    }
}

impl GameConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            tick_rate: parse_var(&lookup, "CRASH_TICK_RATE", defaults.tick_rate)?,
            waiting_time: parse_var(&lookup, "CRASH_WAITING_TIME", defaults.waiting_time)?,
            end_time: parse_var(&lookup, "CRASH_END_TIME", defaults.end_time)?,
            starting_balance: parse_var(&lookup, "CRASH_STARTING_BALANCE", defaults.starting_balance)?,
            crash_per: parse_var(&lookup, "CRASH_PER", defaults.crash_per)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if !self.waiting_time.is_finite() || self.waiting_time < 0.0 {
            return Err(ConfigError::BadDuration("Waiting time"));
        }
        if !self.end_time.is_finite() || self.end_time < 0.0 {
            return Err(ConfigError::BadDuration("End time"));
        }
        if self.starting_balance < Decimal::ZERO {
            return Err(ConfigError::NegativeBalance);
        }
        Ok(())
    }

    /// Seconds per tick (`dt`).
    pub fn tick_dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    /// Wall-clock tick period.
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Server version string.
    pub version: String,
    /// Match engine settings.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            max_connections: 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parse_var(&lookup, "CRASH_BIND_ADDR", defaults.bind_addr)?,
            max_connections: parse_var(&lookup, "CRASH_MAX_CONNECTIONS", defaults.max_connections)?,
            version: defaults.version,
            game: GameConfig::from_lookup(lookup)?,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.tick_rate, 64);
        assert_eq!(config.crash_per.get(), 20);
        assert_eq!(config.tick_dt(), 0.015625);
        assert_eq!(config.tick_period(), Duration::from_micros(15_625));
        assert!(config.validate().is_ok());

        let server = ServerConfig::default();
        assert_eq!(server.bind_addr.port(), 3001);
        assert_eq!(server.max_connections, 1000);
    }

    #[test]
    fn test_unset_vars_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CRASH_BIND_ADDR", "127.0.0.1:9000"),
            ("CRASH_TICK_RATE", "128"),
            ("CRASH_WAITING_TIME", "7.5"),
            ("CRASH_END_TIME", " 2 "),
            ("CRASH_STARTING_BALANCE", "250.50"),
            ("CRASH_PER", "33"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.game.tick_rate, 128);
        assert_eq!(config.game.waiting_time, 7.5);
        assert_eq!(config.game.end_time, 2.0);
        assert_eq!(config.game.starting_balance, Decimal::new(25050, 2));
        assert_eq!(config.game.crash_per.get(), 33);
    }

    #[test]
    fn test_invalid_values() {
        let err = GameConfig::from_lookup(lookup(&[("CRASH_PER", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CRASH_PER", .. }));

        let err = GameConfig::from_lookup(lookup(&[("CRASH_TICK_RATE", "fast")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CRASH_TICK_RATE", .. }));

        let err = GameConfig::from_lookup(lookup(&[("CRASH_TICK_RATE", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroTickRate);

        let err = GameConfig::from_lookup(lookup(&[("CRASH_END_TIME", "-1")])).unwrap_err();
        assert_eq!(err, ConfigError::BadDuration("End time"));

        let err = GameConfig::from_lookup(lookup(&[("CRASH_STARTING_BALANCE", "-10")])).unwrap_err();
        assert_eq!(err, ConfigError::NegativeBalance);
    }
}
