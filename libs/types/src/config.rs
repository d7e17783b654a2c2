//! Process-level configuration
//!
//! All recognized options with their defaults, loaded from `FEED_*`
//! environment variables. Range violations abort initialization; the
//! service never starts on a bad config.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Market regime applied to every instrument's volatility and drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Normal,
    HighVol,
    TrendingUp,
    TrendingDown,
    FlashEvent,
}

impl Scenario {
    /// Volatility multiplier for this regime.
    pub fn volatility_multiplier(&self) -> f64 {
        match self {
            Scenario::Normal => 1.0,
            Scenario::HighVol => 3.0,
            Scenario::TrendingUp | Scenario::TrendingDown => 1.5,
            // Flash regimes take their excursions from the flash
            // draw, not a standing multiplier.
            Scenario::FlashEvent => 1.0,
        }
    }

    /// Directional bias applied to the primary move, in units of
    /// effective volatility.
    pub fn trend_bias(&self) -> f64 {
        match self {
            Scenario::TrendingUp => 0.1,
            Scenario::TrendingDown => -0.1,
            _ => 0.0,
        }
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Scenario::Normal),
            "high_vol" => Ok(Scenario::HighVol),
            "trending_up" => Ok(Scenario::TrendingUp),
            "trending_down" => Ok(Scenario::TrendingDown),
            "flash_event" => Ok(Scenario::FlashEvent),
            other => Err(ConfigError::InvalidValue {
                key: "FEED_SCENARIO".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Trading-day phase shaping intraday volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    MarketOpen,
    Morning,
    Lunch,
    Afternoon,
    MarketClose,
    AfterHours,
}

impl TimeOfDay {
    /// Volatility multiplier for this phase.
    pub fn volatility_multiplier(&self) -> f64 {
        match self {
            TimeOfDay::MarketOpen | TimeOfDay::MarketClose => 2.0,
            TimeOfDay::Lunch => 0.5,
            TimeOfDay::Morning | TimeOfDay::Afternoon | TimeOfDay::AfterHours => 1.0,
        }
    }

    /// Derive the phase from a local wall-clock time.
    ///
    /// Cash-session boundaries: open 09:30-10:30, lunch 12:00-13:30,
    /// close 15:00-16:00.
    pub fn from_clock(hour: u32, minute: u32) -> TimeOfDay {
        let hm = hour * 60 + minute;
        match hm {
            hm if (570..630).contains(&hm) => TimeOfDay::MarketOpen,
            hm if (630..720).contains(&hm) => TimeOfDay::Morning,
            hm if (720..810).contains(&hm) => TimeOfDay::Lunch,
            hm if (810..900).contains(&hm) => TimeOfDay::Afternoon,
            hm if (900..960).contains(&hm) => TimeOfDay::MarketClose,
            _ => TimeOfDay::AfterHours,
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market_open" => Ok(TimeOfDay::MarketOpen),
            "morning" => Ok(TimeOfDay::Morning),
            "lunch" => Ok(TimeOfDay::Lunch),
            "afternoon" => Ok(TimeOfDay::Afternoon),
            "market_close" => Ok(TimeOfDay::MarketClose),
            "after_hours" => Ok(TimeOfDay::AfterHours),
            other => Err(ConfigError::InvalidValue {
                key: "FEED_TIME_OF_DAY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Whether the time-of-day phase tracks the wall clock or is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDayMode {
    /// Derive the phase from the local clock at each tick
    Auto,
    /// Pin the phase regardless of wall time
    Fixed(TimeOfDay),
}

/// Configuration errors abort initialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{key} = {value} outside [{min}, {max}]")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Process configuration for the feed service.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Tick cadence in milliseconds
    pub update_frequency_ms: u64,
    /// Base volatility, 0..1
    pub volatility_factor: f64,
    /// Correlation strength, 0..1
    pub correlation_strength: f64,
    pub scenario: Scenario,
    pub time_of_day: TimeOfDayMode,
    /// Per-tick flash excursion probability, 0..1
    pub flash_event_probability: f64,
    /// Volatility multiplier on a flash tick
    pub flash_event_magnitude: f64,
    /// Default per-subscriber refill rate, updates/second
    pub max_updates_per_second: f64,
    /// Per-subscriber token bucket capacity
    pub bucket_size: f64,
    /// HTTP/WebSocket listen port
    pub listen_port: u16,
    /// Fixed simulator seed for reproducible runs
    pub rng_seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_frequency_ms: 500,
            volatility_factor: 0.2,
            correlation_strength: 0.7,
            scenario: Scenario::Normal,
            time_of_day: TimeOfDayMode::Auto,
            flash_event_probability: 0.001,
            flash_event_magnitude: 3.0,
            max_updates_per_second: 10.0,
            bucket_size: 20.0,
            listen_port: 8080,
            rng_seed: None,
        }
    }
}

impl FeedConfig {
    /// Load configuration from `FEED_*` environment variables,
    /// falling back to defaults for unset keys.
    pub fn from_env() -> Result<FeedConfig, ConfigError> {
        let mut config = FeedConfig::default();

        if let Some(v) = read("FEED_UPDATE_FREQUENCY_MS")? {
            config.update_frequency_ms = parse_num("FEED_UPDATE_FREQUENCY_MS", &v)?;
        }
        if let Some(v) = read("FEED_VOLATILITY_FACTOR")? {
            config.volatility_factor = parse_num("FEED_VOLATILITY_FACTOR", &v)?;
        }
        if let Some(v) = read("FEED_CORRELATION_STRENGTH")? {
            config.correlation_strength = parse_num("FEED_CORRELATION_STRENGTH", &v)?;
        }
        if let Some(v) = read("FEED_SCENARIO")? {
            config.scenario = v.parse()?;
        }
        if let Some(v) = read("FEED_TIME_OF_DAY")? {
            config.time_of_day = if v == "auto" {
                TimeOfDayMode::Auto
            } else {
                TimeOfDayMode::Fixed(v.parse()?)
            };
        }
        if let Some(v) = read("FEED_FLASH_EVENT_PROBABILITY")? {
            config.flash_event_probability = parse_num("FEED_FLASH_EVENT_PROBABILITY", &v)?;
        }
        if let Some(v) = read("FEED_FLASH_EVENT_MAGNITUDE")? {
            config.flash_event_magnitude = parse_num("FEED_FLASH_EVENT_MAGNITUDE", &v)?;
        }
        if let Some(v) = read("FEED_MAX_UPDATES_PER_SECOND")? {
            config.max_updates_per_second = parse_num("FEED_MAX_UPDATES_PER_SECOND", &v)?;
        }
        if let Some(v) = read("FEED_BUCKET_SIZE")? {
            config.bucket_size = parse_num("FEED_BUCKET_SIZE", &v)?;
        }
        if let Some(v) = read("FEED_LISTEN_PORT")? {
            config.listen_port = parse_num("FEED_LISTEN_PORT", &v)?;
        }
        if let Some(v) = read("FEED_RNG_SEED")? {
            config.rng_seed = Some(parse_num("FEED_RNG_SEED", &v)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check option ranges. Called by `from_env`; exposed for
    /// programmatic configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "FEED_VOLATILITY_FACTOR",
            self.volatility_factor,
            0.0,
            1.0,
        )?;
        check_range(
            "FEED_CORRELATION_STRENGTH",
            self.correlation_strength,
            0.0,
            1.0,
        )?;
        check_range(
            "FEED_FLASH_EVENT_PROBABILITY",
            self.flash_event_probability,
            0.0,
            1.0,
        )?;
        if self.update_frequency_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FEED_UPDATE_FREQUENCY_MS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.flash_event_magnitude < 1.0 {
            return Err(ConfigError::OutOfRange {
                key: "FEED_FLASH_EVENT_MAGNITUDE".to_string(),
                value: self.flash_event_magnitude,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        if self.max_updates_per_second <= 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "FEED_MAX_UPDATES_PER_SECOND".to_string(),
                value: self.max_updates_per_second,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        if self.bucket_size < 1.0 {
            return Err(ConfigError::OutOfRange {
                key: "FEED_BUCKET_SIZE".to_string(),
                value: self.bucket_size,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }
}

fn read(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(v) if v.is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "<non-unicode>".to_string(),
        }),
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn check_range(key: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            key: key.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}
