//! Engine configuration.
//!
//! Configuration is resolved in three layers: built-in defaults, then an
//! optional YAML file named by `HOSTLINK_CONFIG`, then `HOSTLINK_*`
//! environment variable overrides.

use hostlink_protocol::{accum::DEFAULT_CAPACITY, DEFAULT_MAGIC};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Environment variable naming the YAML config file.
pub const CONFIG_FILE_ENV: &str = "HOSTLINK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),
}

/// Tunables for one link instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame sync magic. YAML accepts `"0xBBACCAAA"` or a plain integer.
    #[serde(with = "magic_serde")]
    pub magic: u32,

    /// Receive accumulator capacity in bytes.
    pub accumulator_capacity: usize,

    /// Maximum bytes pulled from the transport per read.
    pub read_chunk: usize,

    /// Poll interval while within the fast window after startup.
    pub fast_poll_ms: u64,

    /// Poll interval after the fast window has elapsed.
    pub slow_poll_ms: u64,

    /// How long after startup the fast interval applies.
    pub fast_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            magic: DEFAULT_MAGIC,
            accumulator_capacity: DEFAULT_CAPACITY,
            read_chunk: 128,
            fast_poll_ms: 20,
            slow_poll_ms: 200,
            fast_window_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Resolves the configuration: defaults, then the file named by
    /// `HOSTLINK_CONFIG` (if set), then `HOSTLINK_*` env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parses a YAML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        serde_yaml::from_str(&text).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
    }

    /// Applies `HOSTLINK_*` environment variables on top of `self`.
    /// Unparseable values are logged and skipped.
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parsed("HOSTLINK_MAGIC", parse_magic) {
            self.magic = value;
        }
        if let Some(value) = env_parsed("HOSTLINK_ACCUM_CAPACITY", |s| s.parse().ok()) {
            self.accumulator_capacity = value;
        }
        if let Some(value) = env_parsed("HOSTLINK_READ_CHUNK", |s| s.parse().ok()) {
            self.read_chunk = value;
        }
        if let Some(value) = env_parsed("HOSTLINK_FAST_POLL_MS", |s| s.parse().ok()) {
            self.fast_poll_ms = value;
        }
        if let Some(value) = env_parsed("HOSTLINK_SLOW_POLL_MS", |s| s.parse().ok()) {
            self.slow_poll_ms = value;
        }
        if let Some(value) = env_parsed("HOSTLINK_FAST_WINDOW_MS", |s| s.parse().ok()) {
            self.fast_window_ms = value;
        }
    }

    pub fn fast_poll(&self) -> Duration {
        Duration::from_millis(self.fast_poll_ms)
    }

    pub fn slow_poll(&self) -> Duration {
        Duration::from_millis(self.slow_poll_ms)
    }

    pub fn fast_window(&self) -> Duration {
        Duration::from_millis(self.fast_window_ms)
    }
}

fn env_parsed<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match parse(&raw) {
        Some(value) => Some(value),
        None => {
            warn!(var = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

fn parse_magic(raw: &str) -> Option<u32> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

mod magic_serde {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(magic: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{magic:#010x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        struct MagicVisitor;

        impl Visitor<'_> for MagicVisitor {
            type Value = u32;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a u32 or a hex string like \"0xBBACCAAA\"")
            }

            fn visit_str<E: de::Error>(self, raw: &str) -> Result<u32, E> {
                super::parse_magic(raw)
                    .ok_or_else(|| E::custom(format!("invalid magic value: {raw}")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
                u32::try_from(value)
                    .map_err(|_| E::custom(format!("magic out of range: {value}")))
            }
        }

        deserializer.deserialize_any(MagicVisitor)
    }
}
