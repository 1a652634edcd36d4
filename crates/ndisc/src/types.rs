//! # Neighbor Discovery Value Types
//!
//! Plain value records for everything a Router Advertisement can teach us,
//! plus the small enums and the change bitmap shared across the crate.
//!
//! ## Time Model
//!
//! All timestamps are **signed 32-bit monotonic seconds** supplied by the
//! injected clock. Lifetimes are unsigned 32-bit seconds where
//! [`LIFETIME_INFINITE`] (`0xFFFF_FFFF`) means the record never expires and
//! is never refreshed. A record's expiry is `timestamp + lifetime`,
//! evaluated in 64-bit arithmetic so the comparison cannot wrap near the
//! end of the 32-bit range.
//!
//! ## Collections & Keys
//!
//! | Record | Keyed by | Ordering in its collection |
//! |--------|----------|----------------------------|
//! | [`Gateway`] | `address` | descending [`RouterPreference`] |
//! | [`SlaacAddress`] | `address` | insertion order |
//! | [`RouteInfo`] | `(network, plen)` | descending [`RouterPreference`] |
//! | [`DnsServer`] | `address` | insertion order |
//! | [`DnsDomain`] | `domain` | insertion order |
//!
//! Within each collection no two entries share a key; a record arriving
//! with `lifetime == 0` is a withdrawal of that key.

use std::fmt;
use std::net::Ipv6Addr;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Lifetime sentinel: the record never expires and is never refreshed.
pub const LIFETIME_INFINITE: u32 = u32::MAX;

// ════════════════════════════════════════════════════════════════════════════
// ROUTER PREFERENCE
// ════════════════════════════════════════════════════════════════════════════

/// Three-level router/route preference (RFC 4191).
///
/// Derives `Ord` so that `Low < Medium < High`; gateway and route
/// collections are kept in descending preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterPreference {
    /// Prefer other routers if any are available.
    Low,
    /// The default preference.
    Medium,
    /// Prefer this router over medium/low ones.
    High,
}

impl RouterPreference {
    /// Stable lowercase name, as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RouterPreference::Low => "low",
            RouterPreference::Medium => "medium",
            RouterPreference::High => "high",
        }
    }
}

impl fmt::Display for RouterPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DHCP LEVEL
// ════════════════════════════════════════════════════════════════════════════

/// DHCPv6 hint carried by the RA `M`/`O` flags.
///
/// The engine only propagates this; whether to actually run DHCPv6 is the
/// consumer's decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DhcpLevel {
    /// Neither flag set: SLAAC only.
    #[default]
    None,
    /// `O` flag: other configuration (e.g. DNS) via DHCPv6.
    Otherconf,
    /// `M` flag: addresses themselves via DHCPv6.
    Managed,
}

impl DhcpLevel {
    /// Stable lowercase name, as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DhcpLevel::None => "none",
            DhcpLevel::Otherconf => "otherconf",
            DhcpLevel::Managed => "managed",
        }
    }
}

impl fmt::Display for DhcpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ADDRESS GENERATION
// ════════════════════════════════════════════════════════════════════════════

/// How host bits are filled into a received prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrGenMode {
    /// Modified EUI-64 from the installed interface identifier (RFC 4291).
    #[default]
    Eui64,
    /// Stable, opaque identifiers (RFC 7217) via an injected derivation.
    StablePrivacy,
}

/// Which seed the stable-privacy derivation keys off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableType {
    /// The host's machine id / UUID.
    #[default]
    Uuid,
    /// An explicitly configured stable id.
    StableId,
}

/// A Modified-EUI-64 interface identifier: the 8 host bytes of an address.
///
/// The all-zero identifier means "not installed yet"; the synthesiser
/// refuses to generate EUI-64 addresses until a non-zero one is installed
/// via [`crate::engine::Ndisc::set_iid`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterfaceId(pub [u8; 8]);

impl InterfaceId {
    /// The not-yet-installed identifier.
    pub const ZERO: InterfaceId = InterfaceId([0; 8]);

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}:{:02x}{:02x}:{:02x}{:02x}:{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LEARNED RECORDS
// ════════════════════════════════════════════════════════════════════════════

/// A default gateway learned from an RA's router lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    /// The router's (link-local) address. Collection key.
    pub address: Ipv6Addr,
    /// Monotonic second the advertisement was received.
    pub timestamp: i32,
    /// Router lifetime in seconds; 0 withdraws, [`LIFETIME_INFINITE`] pins.
    pub lifetime: u32,
    /// RFC 4191 preference.
    pub preference: RouterPreference,
}

impl Gateway {
    /// Expiry instant in widened arithmetic. Meaningless for infinite records.
    #[must_use]
    #[inline]
    pub fn expires_at(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.lifetime)
    }
}

/// A host address synthesised from an advertised prefix.
///
/// The network bits come from the prefix information option; the host bits
/// are filled in by the address synthesiser. `preferred` never exceeds
/// `lifetime` (valid lifetime).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaacAddress {
    /// The full address once completed. Collection key.
    pub address: Ipv6Addr,
    /// Monotonic second the prefix was received.
    pub timestamp: i32,
    /// Valid lifetime in seconds.
    pub lifetime: u32,
    /// Preferred lifetime in seconds (≤ `lifetime`).
    pub preferred: u32,
    /// Stable-privacy DAD retry counter. The stored value is the one the
    /// *next* regeneration will use.
    pub dad_counter: u8,
}

impl SlaacAddress {
    /// End of the valid lifetime.
    #[must_use]
    #[inline]
    pub fn expires_at(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.lifetime)
    }

    /// End of the preferred lifetime.
    #[must_use]
    #[inline]
    pub fn preferred_until(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.preferred)
    }
}

/// A more-specific route from an RA route information option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    /// Destination network. Keyed together with `plen`.
    pub network: Ipv6Addr,
    /// Prefix length, `1..=128`. Default routes are modelled as gateways,
    /// never as routes.
    pub plen: u8,
    /// Next hop.
    pub gateway: Ipv6Addr,
    /// Monotonic second the advertisement was received.
    pub timestamp: i32,
    /// Route lifetime in seconds.
    pub lifetime: u32,
    /// RFC 4191 preference.
    pub preference: RouterPreference,
}

impl RouteInfo {
    #[must_use]
    #[inline]
    pub fn expires_at(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.lifetime)
    }
}

/// A recursive DNS server from an RDNSS option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServer {
    /// Server address. Collection key.
    pub address: Ipv6Addr,
    /// Monotonic second the option was received.
    pub timestamp: i32,
    /// Lifetime in seconds.
    pub lifetime: u32,
}

impl DnsServer {
    #[must_use]
    #[inline]
    pub fn expires_at(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.lifetime)
    }
}

/// A DNS search domain from a DNSSL option.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsDomain {
    /// Search domain. Collection key.
    pub domain: String,
    /// Monotonic second the option was received.
    pub timestamp: i32,
    /// Lifetime in seconds.
    pub lifetime: u32,
}

impl DnsDomain {
    #[must_use]
    #[inline]
    pub fn expires_at(&self) -> i64 {
        i64::from(self.timestamp) + i64::from(self.lifetime)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CHANGE BITMAP
// ════════════════════════════════════════════════════════════════════════════

/// Bitmap of snapshot categories touched within one logical transaction
/// (one RA ingest, one lifetime sweep, one DAD fix-up).
///
/// The compact [`ConfigMap::summary`] string (`dGARSD`) prefixes every
/// change dump in the logs.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigMap(u32);

impl ConfigMap {
    /// Nothing changed.
    pub const NONE: ConfigMap = ConfigMap(0);
    /// The DHCPv6 hint changed.
    pub const DHCP_LEVEL: ConfigMap = ConfigMap(1 << 0);
    /// The gateway list changed.
    pub const GATEWAYS: ConfigMap = ConfigMap(1 << 1);
    /// The address list changed.
    pub const ADDRESSES: ConfigMap = ConfigMap(1 << 2);
    /// The route list changed.
    pub const ROUTES: ConfigMap = ConfigMap(1 << 3);
    /// The DNS server list changed.
    pub const DNS_SERVERS: ConfigMap = ConfigMap(1 << 4);
    /// The DNS domain list changed.
    pub const DNS_DOMAINS: ConfigMap = ConfigMap(1 << 5);

    /// Raw bit value, stable within a build.
    #[must_use]
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    #[inline]
    pub fn contains(self, other: ConfigMap) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: ConfigMap) {
        self.0 |= other.0;
    }

    /// Compact category string: one character per set bit, in the fixed
    /// order `d G A R S D`.
    #[must_use]
    pub fn summary(self) -> String {
        let mut s = String::with_capacity(6);
        if self.contains(ConfigMap::DHCP_LEVEL) {
            s.push('d');
        }
        if self.contains(ConfigMap::GATEWAYS) {
            s.push('G');
        }
        if self.contains(ConfigMap::ADDRESSES) {
            s.push('A');
        }
        if self.contains(ConfigMap::ROUTES) {
            s.push('R');
        }
        if self.contains(ConfigMap::DNS_SERVERS) {
            s.push('S');
        }
        if self.contains(ConfigMap::DNS_DOMAINS) {
            s.push('D');
        }
        s
    }
}

impl BitOr for ConfigMap {
    type Output = ConfigMap;

    fn bitor(self, rhs: ConfigMap) -> ConfigMap {
        ConfigMap(self.0 | rhs.0)
    }
}

impl BitOrAssign for ConfigMap {
    fn bitor_assign(&mut self, rhs: ConfigMap) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ConfigMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigMap({})", self.summary())
    }
}

impl fmt::Display for ConfigMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SNAPSHOT VIEW
// ════════════════════════════════════════════════════════════════════════════

/// Read-only view of the engine's state, handed to the consumer on every
/// change signal.
///
/// The borrows are valid only for the duration of the signal dispatch; the
/// consumer must copy out anything it wants to keep.
#[derive(Clone, Copy, Debug)]
pub struct NdiscData<'a> {
    /// DHCPv6 hint from the last RA.
    pub dhcp_level: DhcpLevel,
    /// Advertised hop limit (default 64).
    pub hop_limit: u8,
    /// Advertised link MTU; 0 when no RA carried one.
    pub mtu: u32,
    /// Gateways in descending preference order.
    pub gateways: &'a [Gateway],
    /// Synthesised addresses in insertion order.
    pub addresses: &'a [SlaacAddress],
    /// Routes in descending preference order.
    pub routes: &'a [RouteInfo],
    /// DNS servers in insertion order.
    pub dns_servers: &'a [DnsServer],
    /// DNS search domains in insertion order.
    pub dns_domains: &'a [DnsDomain],
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
