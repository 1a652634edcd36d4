//! # ndisc: IPv6 Neighbor Discovery / SLAAC engine
//!
//! The RA-driven lifetime manager behind stateless IPv6
//! autoconfiguration: one [`Ndisc`] per interface solicits Router
//! Advertisements, merges the gateways, prefixes, routes and DNS state
//! they carry into a preference-ordered, lifetime-tracked snapshot,
//! synthesises host addresses from advertised prefixes (Modified EUI-64
//! or stable privacy, with DAD retry), ages everything out on a single
//! consolidated timer and notifies one registered consumer of changes.
//!
//! ## What this crate is not
//!
//! It opens no sockets and installs no addresses. The wire side is an
//! injected [`RsTransport`]; decoded RA contents come back in through the
//! `add_*` ingress followed by [`Ndisc::ra_received`]; applying the
//! resulting snapshot to the kernel is the consumer's job, as is running
//! DHCPv6 when the propagated [`DhcpLevel`] asks for it.
//!
//! ## Module Map
//!
//! | Module | Holds |
//! |--------|-------|
//! | [`types`] | value records, preference/DHCP enums, change bitmap |
//! | [`config`] | construction-only options + validation |
//! | [`clock`] | injected monotonic time source |
//! | [`platform`] | platform / network-namespace seams |
//! | [`transport`] | router-solicitation strategy trait |
//! | [`synth`] | EUI-64 / stable-privacy address synthesis |
//! | [`tables`] | the five collections, merge engine, lifetime sweep |
//! | [`engine`] | solicitation scheduler, timers, signals |
//! | [`metrics`] | lock-free counters |
//! | [`driver`] | tokio event-loop integration |

pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod metrics;
pub mod platform;
pub mod synth;
pub mod tables;
pub mod transport;
pub mod types;

pub use clock::{ManualClock, MonotonicClock, StartupClock};
pub use config::{ConfigError, NdiscConfig};
pub use driver::NdiscDriver;
pub use engine::{Ndisc, NdiscError, NdiscEvents};
pub use metrics::NdiscMetrics;
pub use platform::{Netns, NetnsError, NetnsGuard, NoopPlatform, Platform};
pub use synth::{StableDeriveFn, SynthError, DAD_COUNTER_LIMIT};
pub use tables::{AddressMerge, NdiscTables, SweepOutcome};
pub use transport::{MockTransport, RsTransport, TransportError};
pub use types::{
    AddrGenMode, ConfigMap, DhcpLevel, DnsDomain, DnsServer, Gateway, InterfaceId, NdiscData,
    RouteInfo, RouterPreference, SlaacAddress, StableType, LIFETIME_INFINITE,
};
