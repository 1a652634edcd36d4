//! # Address Synthesiser
//!
//! Fills the host bits of an address whose network bits were copied from a
//! received prefix, in one of two modes fixed at construction:
//!
//! - **Modified EUI-64**: write the installed interface identifier into
//!   host bits that are still all-zero. If the host bits are already set,
//!   this is a DAD retry, and EUI-64 has no retry budget, so it fails.
//! - **Stable privacy** (RFC 7217): delegate to a caller-injected
//!   derivation closure keyed on `(stable_type, prefix, ifname,
//!   network_id, dad_counter)`. The counter is post-incremented on
//!   success so the *next* attempt after a DAD failure uses a fresh
//!   value. Retries are bounded by [`DAD_COUNTER_LIMIT`].
//!
//! The synthesiser owns no collection; callers decide what a failure
//! means (drop the incoming record, or remove the stored one).

use std::net::Ipv6Addr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, NdiscConfig};
use crate::types::{AddrGenMode, InterfaceId, SlaacAddress, StableType};

/// Upper bound on stable-privacy DAD retries. The counter is an octet on
/// the wire-facing side; half the range is far beyond any link that can
/// still be considered functional.
pub const DAD_COUNTER_LIMIT: u8 = 128;

/// Caller-supplied stable-privacy derivation.
///
/// Receives the seed selector, the address with its network bits set, the
/// interface name, the optional network id and the current DAD counter;
/// returns the completed address.
pub type StableDeriveFn = Box<
    dyn Fn(StableType, &Ipv6Addr, &str, Option<&str>, u8) -> Result<Ipv6Addr, SynthError>
        + Send,
>;

// ════════════════════════════════════════════════════════════════════════════
// SYNTH ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Why host bits could not be produced. Absorbed internally: the affected
/// address is dropped with a warning, nothing else stops.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SynthError {
    /// EUI-64 mode with no interface identifier installed yet.
    #[error("no interface identifier installed")]
    MissingInterfaceId,

    /// EUI-64 host bits are already set; there is no second identifier to
    /// try after a DAD failure.
    #[error("EUI-64 address already completed, no retry possible")]
    Eui64Exhausted,

    /// The stable-privacy retry counter reached [`DAD_COUNTER_LIMIT`].
    #[error("DAD retry counter exhausted")]
    DadCounterExhausted,

    /// The injected derivation reported a failure.
    #[error("stable-privacy derivation failed: {0}")]
    Derive(String),
}

// ════════════════════════════════════════════════════════════════════════════
// SYNTHESISER
// ════════════════════════════════════════════════════════════════════════════

/// Mode, seed material and the current interface identifier.
pub struct AddressSynthesizer {
    mode: AddrGenMode,
    stable_type: StableType,
    ifname: String,
    network_id: Option<String>,
    iid: InterfaceId,
    derive: Option<StableDeriveFn>,
}

impl AddressSynthesizer {
    /// Builds the synthesiser from the engine configuration.
    ///
    /// Stable-privacy mode requires `derive`; EUI-64 mode ignores it.
    pub fn new(config: &NdiscConfig, derive: Option<StableDeriveFn>) -> Result<Self, ConfigError> {
        if config.addr_gen_mode == AddrGenMode::StablePrivacy && derive.is_none() {
            return Err(ConfigError::MissingStableDerive);
        }
        Ok(AddressSynthesizer {
            mode: config.addr_gen_mode,
            stable_type: config.stable_type,
            ifname: config.ifname.clone(),
            network_id: config.network_id.clone(),
            iid: InterfaceId::ZERO,
            derive,
        })
    }

    #[must_use]
    pub fn mode(&self) -> AddrGenMode {
        self.mode
    }

    #[must_use]
    pub fn iid(&self) -> InterfaceId {
        self.iid
    }

    /// Installs a new interface identifier. The engine decides whether
    /// existing addresses must be flushed.
    pub fn set_iid(&mut self, iid: InterfaceId) {
        self.iid = iid;
    }

    /// Completes `addr` in place.
    ///
    /// For stable privacy this regenerates the host bits from the current
    /// DAD counter and then bumps it, whether the address was fresh or a
    /// DAD-rejected previous attempt. For EUI-64 only untouched host bits
    /// can be filled.
    pub fn complete(&mut self, addr: &mut SlaacAddress) -> Result<(), SynthError> {
        match self.mode {
            AddrGenMode::StablePrivacy => {
                if addr.dad_counter >= DAD_COUNTER_LIMIT {
                    warn!(
                        ifname = %self.ifname,
                        address = %addr.address,
                        counter = addr.dad_counter,
                        "complete-address: giving up, DAD retry counter exhausted"
                    );
                    return Err(SynthError::DadCounterExhausted);
                }
                let derive = match &self.derive {
                    Some(derive) => derive,
                    None => return Err(SynthError::Derive("no derivation function".to_string())),
                };
                match derive(
                    self.stable_type,
                    &addr.address,
                    &self.ifname,
                    self.network_id.as_deref(),
                    addr.dad_counter,
                ) {
                    Ok(full) => {
                        addr.address = full;
                        addr.dad_counter += 1;
                        debug!(ifname = %self.ifname, "complete-address: using a stable-privacy address");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(
                            ifname = %self.ifname,
                            error = %err,
                            "complete-address: failed to generate a stable-privacy address"
                        );
                        Err(err)
                    }
                }
            }
            AddrGenMode::Eui64 => {
                if self.iid.is_zero() {
                    warn!(
                        ifname = %self.ifname,
                        "complete-address: can't generate an EUI-64 address: no interface identifier"
                    );
                    return Err(SynthError::MissingInterfaceId);
                }
                if host_bits_zero(&addr.address) {
                    debug!(ifname = %self.ifname, "complete-address: adding an EUI-64 address");
                    set_interface_identifier(&mut addr.address, self.iid);
                    return Ok(());
                }
                warn!(
                    ifname = %self.ifname,
                    address = %addr.address,
                    "complete-address: can't generate a new EUI-64 address"
                );
                Err(SynthError::Eui64Exhausted)
            }
        }
    }
}

/// Whether both 32-bit halves of the interface-identifier part are zero.
#[inline]
fn host_bits_zero(addr: &Ipv6Addr) -> bool {
    addr.octets()[8..] == [0u8; 8]
}

/// Overwrites the host bits with `iid`, keeping the network bits.
#[inline]
fn set_interface_identifier(addr: &mut Ipv6Addr, iid: InterfaceId) {
    let mut octets = addr.octets();
    octets[8..].copy_from_slice(&iid.0);
    *addr = Ipv6Addr::from(octets);
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
