//! Engine configuration
//!
//! Every timing and quality tunable of the routing engine lives here:
//! - Broadcast interval, jitter and initial TTL
//! - Purge timeout and sweep cadence
//! - Link-quality thresholds and hop penalty
//! - Host announcement aging and packet size bound
//! - Gateway class / selection preferences

use crate::routing::address::LinkAddr;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors that can occur during configuration validation
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Invalid originator interval: must be > 0")]
    InvalidInterval,

    #[error("Invalid jitter: {jitter_ms}ms must be smaller than the interval {interval_ms}ms")]
    InvalidJitter { jitter_ms: u64, interval_ms: u64 },

    #[error("Invalid initial TTL: must be >= 2, got {0}")]
    InvalidTtl(u8),

    #[error("Invalid purge timeout: must be > 0")]
    InvalidPurgeTimeout,

    #[error("Invalid sweep interval: must be > 0")]
    InvalidSweepInterval,

    #[error("Invalid hop penalty {penalty}: must be below the quality maximum {max}")]
    InvalidHopPenalty { penalty: u8, max: u8 },

    #[error("Invalid quality maximum: must be > 0")]
    InvalidQualityMax,

    #[error("Invalid bidirectional limit {limit}: must be 1..={max}")]
    InvalidBidirectionalLimit { limit: u8, max: u8 },

    #[error("Invalid routing class: must be 0-3, got {0}")]
    InvalidRoutingClass(u8),

    #[error("Invalid max packet size: {0} bytes cannot hold a routing header")]
    InvalidPacketSize(usize),

    #[error("Invalid {field}: {value_ms}ms exceeds the {max_ms}ms limit")]
    DurationTooLong {
        field: String,
        value_ms: u64,
        max_ms: u64,
    },
}

/// Longest accepted timer or timeout (about 49 days)
pub const MAX_DURATION_MS: u64 = u32::MAX as u64;

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of self-originated broadcasts (milliseconds)
    pub originator_interval_ms: u64,

    /// Symmetric random offset applied to each broadcast period (milliseconds)
    pub jitter_ms: u64,

    /// TTL of self-originated broadcasts
    pub initial_ttl: u8,

    /// Staleness timeout; entries are purged after twice this (milliseconds)
    pub purge_timeout_ms: u64,

    /// Maintenance sweep cadence (milliseconds)
    pub sweep_interval_ms: u64,

    /// Quality deducted per relay hop
    pub hop_penalty: u8,

    /// Quality value representing a perfect link
    pub tq_max: u8,

    /// Minimum echoed own broadcasts before a local link quality is computed
    pub local_send_minimum: u32,

    /// Minimum received packets before a local link quality is computed
    pub local_recv_minimum: u32,

    /// Final quality at or above which a link counts as bidirectional
    pub bidirectional_limit: u8,

    /// Age after which announced hosts, ours included, expire unless refreshed (milliseconds)
    pub announce_age_ms: u64,

    /// Gateway class advertised in our own broadcasts (0 = no gateway)
    pub gateway_class: u8,

    /// Gateway selection mode (0 = off, 1/2 = class weighted, 3 = quality only)
    pub routing_class: u8,

    /// Gateway to prefer whenever it is routable
    pub preferred_gateway: Option<LinkAddr>,

    /// Upper bound of an encoded routing packet including announcements
    pub max_packet_size: usize,

    /// Seed for the jitter RNG; entropy when unset
    pub rng_seed: Option<u64>,
}

impl EngineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.originator_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        if self.jitter_ms >= self.originator_interval_ms {
            return Err(ConfigError::InvalidJitter {
                jitter_ms: self.jitter_ms,
                interval_ms: self.originator_interval_ms,
            });
        }

        if self.initial_ttl < 2 {
            return Err(ConfigError::InvalidTtl(self.initial_ttl));
        }

        if self.purge_timeout_ms == 0 {
            return Err(ConfigError::InvalidPurgeTimeout);
        }

        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        if self.tq_max == 0 {
            return Err(ConfigError::InvalidQualityMax);
        }

        if self.hop_penalty >= self.tq_max {
            return Err(ConfigError::InvalidHopPenalty {
                penalty: self.hop_penalty,
                max: self.tq_max,
            });
        }

        if self.bidirectional_limit == 0 || self.bidirectional_limit > self.tq_max {
            return Err(ConfigError::InvalidBidirectionalLimit {
                limit: self.bidirectional_limit,
                max: self.tq_max,
            });
        }

        if self.routing_class > 3 {
            return Err(ConfigError::InvalidRoutingClass(self.routing_class));
        }

        if self.max_packet_size < crate::wire::ROUTING_HEADER_LEN {
            return Err(ConfigError::InvalidPacketSize(self.max_packet_size));
        }

        for (field, value_ms) in [
            ("originator interval", self.originator_interval_ms),
            ("purge timeout", self.purge_timeout_ms),
            ("sweep interval", self.sweep_interval_ms),
            ("announcement age", self.announce_age_ms),
        ] {
            if value_ms > MAX_DURATION_MS {
                return Err(ConfigError::DurationTooLong {
                    field: field.to_string(),
                    value_ms,
                    max_ms: MAX_DURATION_MS,
                });
            }
        }

        Ok(())
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EngineConfig =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), contents).context("Failed to write config file")?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            originator_interval_ms: 1000,
            jitter_ms: 100,
            initial_ttl: 50,
            purge_timeout_ms: 200_000,
            sweep_interval_ms: 1000,
            hop_penalty: 10,
            tq_max: 255,
            local_send_minimum: 1,
            local_recv_minimum: 1,
            bidirectional_limit: 1,
            announce_age_ms: 200_000,
            gateway_class: 0,
            routing_class: 0,
            preferred_gateway: None,
            max_packet_size: 1500,
            rng_seed: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
