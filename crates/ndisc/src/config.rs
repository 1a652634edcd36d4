//! Construction-only engine configuration.
//!
//! All options are fixed for the lifetime of the engine. `validate` runs
//! before anything else is built, so an engine that exists is always
//! within range.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AddrGenMode, StableType};

/// Default cap on autoconf addresses. 0 disables the cap.
pub const MAX_ADDRESSES_DEFAULT: u32 = 16;
/// Default router solicitation retry budget (RFC 4861 `MAX_RTR_SOLICITATIONS`).
pub const ROUTER_SOLICITATIONS_DEFAULT: i32 = 3;
/// Default spacing between solicitations in seconds (RFC 4861 `RTR_SOLICITATION_INTERVAL`).
pub const ROUTER_SOLICITATION_INTERVAL_DEFAULT: i32 = 4;

// ════════════════════════════════════════════════════════════════════════════
// CONFIG
// ════════════════════════════════════════════════════════════════════════════

/// Per-interface engine configuration.
///
/// | Option | Range / default | Effect |
/// |--------|-----------------|--------|
/// | `ifindex` | > 0 | Bound interface |
/// | `ifname` | non-empty | Input to stable-privacy derivation, log context |
/// | `stable_type` | default `uuid` | Input to stable-privacy derivation |
/// | `network_id` | optional | Input to stable-privacy derivation |
/// | `addr_gen_mode` | default `eui64` | Selects the synthesiser branch |
/// | `max_addresses` | ≥ 0, default 16 | 0 disables the address cap |
/// | `router_solicitations` | ≥ 1, default 3 | RS retry budget |
/// | `router_solicitation_interval` | ≥ 1, default 4 | RS retry spacing (seconds) |
#[derive(Clone, Debug, Deserialize)]
pub struct NdiscConfig {
    /// Kernel interface index the engine is bound to.
    pub ifindex: i32,
    /// Interface name.
    pub ifname: String,
    /// Seed selector for stable-privacy derivation.
    #[serde(default)]
    pub stable_type: StableType,
    /// Optional network identity mixed into stable-privacy derivation.
    #[serde(default)]
    pub network_id: Option<String>,
    /// Host-bit synthesis mode.
    #[serde(default)]
    pub addr_gen_mode: AddrGenMode,
    /// Maximum number of autoconf addresses kept at once; 0 disables the cap.
    #[serde(default = "default_max_addresses")]
    pub max_addresses: u32,
    /// How many solicitations to send before giving up.
    #[serde(default = "default_router_solicitations")]
    pub router_solicitations: i32,
    /// Seconds between solicitation retries.
    #[serde(default = "default_router_solicitation_interval")]
    pub router_solicitation_interval: i32,
}

fn default_max_addresses() -> u32 {
    MAX_ADDRESSES_DEFAULT
}

fn default_router_solicitations() -> i32 {
    ROUTER_SOLICITATIONS_DEFAULT
}

fn default_router_solicitation_interval() -> i32 {
    ROUTER_SOLICITATION_INTERVAL_DEFAULT
}

impl NdiscConfig {
    /// A configuration for `ifindex`/`ifname` with every other option at
    /// its documented default.
    #[must_use]
    pub fn new(ifindex: i32, ifname: impl Into<String>) -> Self {
        NdiscConfig {
            ifindex,
            ifname: ifname.into(),
            stable_type: StableType::default(),
            network_id: None,
            addr_gen_mode: AddrGenMode::default(),
            max_addresses: MAX_ADDRESSES_DEFAULT,
            router_solicitations: ROUTER_SOLICITATIONS_DEFAULT,
            router_solicitation_interval: ROUTER_SOLICITATION_INTERVAL_DEFAULT,
        }
    }

    /// Rejects out-of-range values. Called by the engine constructor; an
    /// engine is never built from an invalid configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ifindex <= 0 {
            return Err(ConfigError::InvalidIfindex(self.ifindex));
        }
        if self.ifname.is_empty() {
            return Err(ConfigError::EmptyIfname);
        }
        if self.router_solicitations < 1 {
            return Err(ConfigError::InvalidSolicitations(self.router_solicitations));
        }
        if self.router_solicitation_interval < 1 {
            return Err(ConfigError::InvalidInterval(self.router_solicitation_interval));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Construction refused: a configuration value is out of range.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `ifindex` must identify a real interface.
    #[error("ifindex must be positive, got {0}")]
    InvalidIfindex(i32),

    /// The interface name feeds stable-privacy derivation and log context.
    #[error("interface name must not be empty")]
    EmptyIfname,

    /// Fewer than one solicitation would never solicit.
    #[error("router_solicitations must be at least 1, got {0}")]
    InvalidSolicitations(i32),

    /// The retry spacing must be at least one second.
    #[error("router_solicitation_interval must be at least 1 second, got {0}")]
    InvalidInterval(i32),

    /// Stable-privacy mode needs the caller-supplied derivation function.
    #[error("addr_gen_mode stable_privacy requires a derivation function")]
    MissingStableDerive,
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
