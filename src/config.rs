/*!
 * Cabinet Configuration
 * Serde-loadable settings for the sandbox and the bundled backends
 */

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::limits::*;
use crate::types::{FsError, FsResult, Layer};

/// Sandbox resolution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Symlinks followed per resolution before failing with SymlinkLoop
    pub max_symlink_hops: u32,
    /// Whether `open_path` follows a symlink in the final component
    pub follow_final_symlink: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_symlink_hops: MAX_SYMLINK_HOPS,
            follow_final_symlink: FOLLOW_FINAL_SYMLINK,
        }
    }
}

impl SandboxConfig {
    /// Validate settings
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> FsResult<()> {
        if self.max_symlink_hops == 0 {
            return Err(config_error("max_symlink_hops must be at least 1"));
        }
        Ok(())
    }
}

/// In-memory cabinet settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Limit on total file bytes; `None` is unbounded
    pub capacity: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMFS_CAPACITY,
        }
    }
}

/// Host cabinet settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalConfig {
    pub readonly: bool,
}

/// Complete configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CabinetConfig {
    pub sandbox: SandboxConfig,
    pub memory: MemoryConfig,
    pub local: LocalConfig,
}

fn config_error(message: impl Into<String>) -> FsError {
    FsError::InvalidArgument {
        layer: Layer::CONFIG,
        message: message.into(),
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> FsResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| config_error(format!("{}: cannot parse {:?}", key, raw)))
}

fn parse_flag(key: &str, raw: &str) -> FsResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(config_error(format!("{}: expected a boolean, got {:?}", key, raw))),
    }
}

impl CabinetConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> FsResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error(format!("invalid configuration: {}", e)))?;
        config.sandbox.validate()?;
        Ok(config)
    }

    /// Apply `CABINET_*` overrides from the process environment
    pub fn apply_env(&mut self) -> FsResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> FsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_SYMLINK_HOPS) {
            self.sandbox.max_symlink_hops = parse_env(ENV_MAX_SYMLINK_HOPS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FOLLOW_FINAL_SYMLINK) {
            self.sandbox.follow_final_symlink = parse_flag(ENV_FOLLOW_FINAL_SYMLINK, &raw)?;
        }
        if let Some(raw) = lookup(ENV_READONLY) {
            self.local.readonly = parse_flag(ENV_READONLY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MEMFS_CAPACITY) {
            self.memory.capacity = match raw.trim() {
                "" | "unbounded" => None,
                _ => Some(parse_env(ENV_MEMFS_CAPACITY, &raw)?),
            };
        }
        self.sandbox.validate()
    }
}
