//! Core configuration types.
//!
//! This module contains the root [`Config`] struct read from
//! `config.yaml` in the port-selector config directory.

use super::parse_duration_string;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT_START: u16 = 3000;
pub const DEFAULT_PORT_END: u16 = 3999;
pub const DEFAULT_FREEZE_PERIOD_MINUTES: u64 = 24 * 60;
pub const DEFAULT_ALLOCATION_TTL: &str = "30d";

/// Root configuration structure for config.yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_port_start")]
    pub port_start: u16,

    #[serde(default = "default_port_end")]
    pub port_end: u16,

    /// Minutes a recently used port stays out of fresh issuance.
    #[serde(default = "default_freeze_period")]
    pub freeze_period_minutes: u64,

    /// Inactivity after which unlocked allocations are reclaimed.
    /// `"0"` or an empty string disables expiration.
    #[serde(
        default = "default_allocation_ttl",
        rename = "allocationTTL",
        alias = "allocationTtl"
    )]
    pub allocation_ttl: String,

    /// Append logs to this file instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
}

fn default_port_start() -> u16 {
    DEFAULT_PORT_START
}

fn default_port_end() -> u16 {
    DEFAULT_PORT_END
}

fn default_freeze_period() -> u64 {
    DEFAULT_FREEZE_PERIOD_MINUTES
}

fn default_allocation_ttl() -> String {
    DEFAULT_ALLOCATION_TTL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port_start: DEFAULT_PORT_START,
            port_end: DEFAULT_PORT_END,
            freeze_period_minutes: DEFAULT_FREEZE_PERIOD_MINUTES,
            allocation_ttl: default_allocation_ttl(),
            log: None,
        }
    }
}

impl Config {
    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_start..=self.port_end
    }

    /// Parsed TTL. `None` when expiration is disabled or the value is invalid
    /// (validation rejects invalid values before this is consulted).
    pub fn ttl(&self) -> Option<Duration> {
        if self.allocation_ttl.trim().is_empty() {
            return None;
        }
        parse_duration_string(&self.allocation_ttl).filter(|d| !d.is_zero())
    }

    /// The subset of the config the selection algorithm consumes.
    pub fn policy(&self) -> crate::allocation::Policy {
        crate::allocation::Policy {
            port_start: self.port_start,
            port_end: self.port_end,
            freeze_period_minutes: self.freeze_period_minutes,
            ttl: self.ttl(),
        }
    }
}
