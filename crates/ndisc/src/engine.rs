//! # The Neighbor Discovery Engine
//!
//! [`Ndisc`] is one long-lived object per interface. It solicits Router
//! Advertisements through the injected transport, lets the transport feed
//! decoded RA contents back through the `add_*` ingress, synthesises host
//! addresses from advertised prefixes, ages everything out and tells the
//! single registered consumer what changed.
//!
//! ## Timers as Data
//!
//! The engine never talks to an event loop directly. Its three timers
//! (the RS retransmission, the first-RA timeout and the lifetime reaper)
//! are plain `Option<i64>` deadlines in monotonic seconds. The embedding
//! loop asks [`Ndisc::next_wakeup`] for the earliest one, sleeps, and
//! calls [`Ndisc::handle_timeouts`] with the current time; tests drive the
//! same two methods with a manual clock. Rescheduling a timer is an
//! assignment, so at most one deadline per timer exists by construction.
//!
//! ## Serialisation
//!
//! All entry points take `&mut self`: mutations within one call are atomic
//! with respect to the consumer, and the change signal is dispatched
//! synchronously *before* the call returns, with the post-mutation
//! snapshot visible. The consumer must not call back into the engine from
//! inside the signal.
//!
//! ## Error Absorption
//!
//! Nothing that happens on a timer path escapes: send failures are logged
//! (deduplicated) and counted, namespace-entry failures abort the callback
//! without touching state, synthesis failures drop the affected address.
//! Only [`Ndisc::start`] reports errors to the caller.

use std::net::Ipv6Addr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn, Level};

use crate::clock::MonotonicClock;
use crate::config::{ConfigError, NdiscConfig};
use crate::metrics::NdiscMetrics;
use crate::platform::{Netns, NetnsError, NetnsGuard, Platform};
use crate::synth::{AddressSynthesizer, StableDeriveFn};
use crate::tables::{AddressMerge, NdiscTables};
use crate::transport::{RsTransport, TransportError};
use crate::types::{
    AddrGenMode, ConfigMap, DhcpLevel, DnsDomain, DnsServer, Gateway, InterfaceId, NdiscData,
    RouteInfo, SlaacAddress,
};

// ════════════════════════════════════════════════════════════════════════════
// CONSUMER SEAM
// ════════════════════════════════════════════════════════════════════════════

/// The single consumer of engine signals, registered at construction.
pub trait NdiscEvents: Send {
    /// The snapshot changed; `changed` says in which categories. The
    /// borrows in `data` are valid only for the duration of this call.
    fn config_changed(&mut self, data: &NdiscData<'_>, changed: ConfigMap);

    /// No RA arrived within the solicitation window. The consumer decides
    /// whether to fall back to another configuration method.
    fn ra_timeout(&mut self);
}

// ════════════════════════════════════════════════════════════════════════════
// ENGINE ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Failures surfaced by [`Ndisc::start`]. Everything later is absorbed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NdiscError {
    /// `start` may only run once per engine.
    #[error("neighbor discovery already started")]
    AlreadyStarted,

    /// The transport's one-time initialisation failed.
    #[error("transport initialisation failed: {0}")]
    Transport(#[from] TransportError),

    /// The engine could not enter its owning namespace.
    #[error(transparent)]
    Netns(#[from] NetnsError),
}

// ════════════════════════════════════════════════════════════════════════════
// ENGINE
// ════════════════════════════════════════════════════════════════════════════

/// Per-interface neighbor discovery state machine. See the module docs.
pub struct Ndisc {
    // immutable identity
    ifindex: i32,
    ifname: String,
    router_solicitations: i32,
    router_solicitation_interval: i32,

    // learned state and synthesis
    tables: NdiscTables,
    synth: AddressSynthesizer,

    // collaborators
    clock: Arc<dyn MonotonicClock>,
    #[allow(dead_code)] // held for the engine's lifetime; only netns is used directly
    platform: Arc<dyn Platform>,
    netns: Option<Arc<dyn Netns>>,
    transport: Box<dyn RsTransport>,
    events: Box<dyn NdiscEvents>,
    metrics: Arc<NdiscMetrics>,

    // solicitation scheduler
    solicitations_left: i32,
    last_rs: i32,
    last_send_rs_error: Option<String>,

    // timer deadlines, monotonic seconds
    rs_deadline: Option<i64>,
    ra_timeout_deadline: Option<i64>,
    reaper_deadline: Option<i64>,

    started: bool,
}

impl Ndisc {
    /// Builds an engine from a validated configuration and its injected
    /// collaborators. `stable_derive` is required iff
    /// `config.addr_gen_mode` is stable privacy.
    pub fn new(
        config: NdiscConfig,
        clock: Arc<dyn MonotonicClock>,
        platform: Arc<dyn Platform>,
        transport: Box<dyn RsTransport>,
        events: Box<dyn NdiscEvents>,
        stable_derive: Option<StableDeriveFn>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let synth = AddressSynthesizer::new(&config, stable_derive)?;
        let netns = platform.netns();
        Ok(Ndisc {
            ifindex: config.ifindex,
            ifname: config.ifname,
            router_solicitations: config.router_solicitations,
            router_solicitation_interval: config.router_solicitation_interval,
            tables: NdiscTables::new(config.max_addresses),
            synth,
            clock,
            platform,
            netns,
            transport,
            events,
            metrics: Arc::new(NdiscMetrics::new()),
            solicitations_left: 0,
            // Far enough in the past that the first solicit() is
            // scheduled immediately.
            last_rs: i32::MIN,
            last_send_rs_error: None,
            rs_deadline: None,
            ra_timeout_deadline: None,
            reaper_deadline: None,
            started: false,
        })
    }

    #[must_use]
    pub fn ifindex(&self) -> i32 {
        self.ifindex
    }

    #[must_use]
    pub fn ifname(&self) -> &str {
        &self.ifname
    }

    /// Shared handle to this engine's counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<NdiscMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The engine's time source (shared with the event-loop driver).
    #[must_use]
    pub fn clock(&self) -> Arc<dyn MonotonicClock> {
        Arc::clone(&self.clock)
    }

    /// Read-only view of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> NdiscData<'_> {
        self.tables.snapshot()
    }

    // ────────────────────────────────────────────────────────────────────
    // lifecycle
    // ────────────────────────────────────────────────────────────────────

    /// Arms the first-RA timeout, initialises the transport and schedules
    /// the first router solicitation.
    pub fn start(&mut self) -> Result<(), NdiscError> {
        if self.started {
            return Err(NdiscError::AlreadyStarted);
        }

        debug!(ifname = %self.ifname, ifindex = self.ifindex, "starting neighbor discovery");

        let _netns = self.enter_netns()?;
        let now = self.clock.now();

        let ra_wait_secs = (i64::from(self.router_solicitations)
            * i64::from(self.router_solicitation_interval)
            + 1)
        .clamp(30, 120);
        self.ra_timeout_deadline = Some(i64::from(now) + ra_wait_secs);
        debug!(ifname = %self.ifname, secs = ra_wait_secs, "scheduling RA timeout");

        if let Err(err) = self.transport.start() {
            self.ra_timeout_deadline = None;
            return Err(err.into());
        }

        self.started = true;
        self.solicit(now);
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // RA ingress (called by the transport after decoding an RA)
    // ────────────────────────────────────────────────────────────────────

    /// Merges a gateway. Returns whether the snapshot changed; the caller
    /// accumulates the per-category mask for [`Ndisc::ra_received`].
    pub fn add_gateway(&mut self, gateway: Gateway) -> bool {
        self.tables.add_gateway(gateway)
    }

    /// Merges a route. Returns whether the snapshot changed.
    pub fn add_route(&mut self, route: RouteInfo) -> bool {
        self.tables.add_route(route)
    }

    /// Merges a DNS server. Returns whether the snapshot changed.
    pub fn add_dns_server(&mut self, server: DnsServer) -> bool {
        self.tables.add_dns_server(server)
    }

    /// Merges a DNS search domain. Returns whether the snapshot changed.
    pub fn add_dns_domain(&mut self, domain: DnsDomain) -> bool {
        self.tables.add_dns_domain(domain)
    }

    /// Fills the host bits of `new` (whose network bits come from a
    /// received prefix) and merges the result. Returns whether the
    /// snapshot changed; synthesis failures and cap drops report `false`.
    pub fn complete_and_add_address(&mut self, mut new: SlaacAddress) -> bool {
        if self.synth.complete(&mut new).is_err() {
            self.metrics.inc_synthesis_failures();
            return false;
        }
        match self.tables.upsert_address(new) {
            AddressMerge::Changed => true,
            AddressMerge::Unchanged => false,
            AddressMerge::CapExceeded => {
                warn!(
                    ifname = %self.ifname,
                    address = %new.address,
                    "discarding autoconf address, cap reached"
                );
                self.metrics.inc_addresses_dropped();
                false
            }
        }
    }

    /// Installs the RA `M`/`O` hint. Returns whether it changed; the
    /// caller folds that into the mask as the dhcp-level category.
    pub fn set_dhcp_level(&mut self, level: DhcpLevel) -> bool {
        self.tables.set_dhcp_level(level)
    }

    /// Installs the advertised hop limit. Returns whether it changed.
    pub fn set_hop_limit(&mut self, hop_limit: u8) -> bool {
        self.tables.set_hop_limit(hop_limit)
    }

    /// Installs the advertised MTU. Returns whether it changed.
    pub fn set_mtu(&mut self, mtu: u32) -> bool {
        self.tables.set_mtu(mtu)
    }

    /// Completes one RA ingest: cancels the RS retransmission and the
    /// first-RA timeout, forgets the sticky send error and runs a
    /// lifetime sweep whose category mask starts as `changed`.
    pub fn ra_received(&mut self, now: i32, changed: ConfigMap) {
        self.ra_timeout_deadline = None;
        self.rs_deadline = None;
        self.last_send_rs_error = None;
        self.check_timestamps(now, changed);
    }

    // ────────────────────────────────────────────────────────────────────
    // DAD ingress (from the platform)
    // ────────────────────────────────────────────────────────────────────

    /// The kernel reported `address` as a duplicate. Every matching
    /// stored address is re-synthesised (stable privacy retries with the
    /// next counter value; EUI-64 has nothing else to offer) and removed
    /// if that fails.
    pub fn dad_failed(&mut self, address: Ipv6Addr) {
        let mut changed = false;
        {
            let synth = &mut self.synth;
            let metrics = &self.metrics;
            let ifname = &self.ifname;
            let addrs = self.tables.addresses_mut();
            let mut i = 0;
            while i < addrs.len() {
                if addrs[i].address != address {
                    i += 1;
                    continue;
                }
                debug!(ifname = %ifname, address = %address, "DAD failed for discovered address");
                metrics.inc_dad_failures();
                changed = true;
                if synth.complete(&mut addrs[i]).is_err() {
                    metrics.inc_synthesis_failures();
                    addrs.remove(i);
                } else {
                    i += 1;
                }
            }
        }
        if changed {
            self.emit_config_change(ConfigMap::ADDRESSES);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // interface identifier rotation
    // ────────────────────────────────────────────────────────────────────

    /// Installs a new Modified-EUI-64 interface identifier.
    ///
    /// On an actual change in EUI-64 mode every address generated with
    /// the old identifier is wiped, the consumer is notified, and a fresh
    /// solicitation round re-learns them. Stable privacy does not use the
    /// identifier, so addresses are left alone there. Returns whether
    /// addresses need to be regenerated.
    pub fn set_iid(&mut self, iid: InterfaceId) -> bool {
        if self.synth.iid() == iid {
            return false;
        }
        self.synth.set_iid(iid);

        if self.synth.mode() == AddrGenMode::StablePrivacy {
            return false;
        }

        if self.tables.flush_addresses() {
            debug!(ifname = %self.ifname, "IPv6 interface identifier changed, flushing addresses");
            self.emit_config_change(ConfigMap::ADDRESSES);
            let now = self.clock.now();
            self.solicit(now);
        }
        true
    }

    // ────────────────────────────────────────────────────────────────────
    // timers
    // ────────────────────────────────────────────────────────────────────

    /// Earliest pending deadline in monotonic seconds, if any timer is
    /// armed. The embedding loop sleeps until then.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<i64> {
        [self.ra_timeout_deadline, self.rs_deadline, self.reaper_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fires every deadline that is due at `now`. Safe to call spuriously.
    pub fn handle_timeouts(&mut self, now: i32) {
        if self.ra_timeout_deadline.is_some_and(|d| i64::from(now) >= d) {
            self.ra_timeout_deadline = None;
            self.metrics.inc_ra_timeouts();
            debug!(ifname = %self.ifname, "timed out waiting for a router advertisement");
            self.events.ra_timeout();
        }
        if self.rs_deadline.is_some_and(|d| i64::from(now) >= d) {
            self.rs_deadline = None;
            self.send_rs_step(now);
        }
        if self.reaper_deadline.is_some_and(|d| i64::from(now) >= d) {
            self.reaper_deadline = None;
            self.check_timestamps(now, ConfigMap::NONE);
        }
    }

    /// Begins (or re-begins) a solicitation round: resets the retry
    /// budget and schedules the next send, rate-limited against the last
    /// one. A send that is already scheduled is left in place.
    fn solicit(&mut self, now: i32) {
        if self.rs_deadline.is_some() {
            return;
        }

        self.solicitations_left = self.router_solicitations;

        let next = (i64::from(self.last_rs) + i64::from(self.router_solicitation_interval)
            - i64::from(now))
        .clamp(0, i64::from(i32::MAX));
        debug!(ifname = %self.ifname, secs = next, "scheduling explicit router solicitation request");
        self.rs_deadline = Some(i64::from(now) + next);
    }

    /// One RS timer expiry: send, account, reschedule while budget lasts.
    fn send_rs_step(&mut self, now: i32) {
        let _netns = match self.enter_netns() {
            Ok(guard) => guard,
            Err(err) => {
                warn!(ifname = %self.ifname, error = %err, "skipping router solicitation");
                return;
            }
        };

        match self.transport.send_rs() {
            Ok(()) => {
                debug!(ifname = %self.ifname, "router solicitation sent");
                self.solicitations_left -= 1;
                self.last_send_rs_error = None;
                self.metrics.inc_solicitations_sent();
            }
            Err(err) => {
                let message = err.to_string();
                // A repeating failure is only interesting once.
                if self.last_send_rs_error.as_deref() != Some(message.as_str()) {
                    warn!(ifname = %self.ifname, error = %message, "failure sending router solicitation");
                    self.last_send_rs_error = Some(message);
                } else {
                    debug!(ifname = %self.ifname, error = %message, "failure sending router solicitation");
                }
                self.metrics.inc_solicitation_failures();
            }
        }

        self.last_rs = now;
        if self.solicitations_left > 0 {
            debug!(
                ifname = %self.ifname,
                secs = self.router_solicitation_interval,
                "scheduling router solicitation retry"
            );
            self.rs_deadline = Some(i64::from(now) + i64::from(self.router_solicitation_interval));
        } else {
            debug!(
                ifname = %self.ifname,
                solicitations = self.router_solicitations,
                "did not receive a router advertisement after all solicitations"
            );
        }
    }

    /// One reaper pass: sweep, re-solicit for half-expired DNS, emit if
    /// anything (including `changed` carried in by the caller) differs,
    /// and re-arm the consolidated timer for the earliest boundary.
    fn check_timestamps(&mut self, now: i32, mut changed: ConfigMap) {
        self.reaper_deadline = None;

        let outcome = self.tables.sweep(now);
        changed |= outcome.changed;

        if outcome.refresh_needed {
            self.solicit(now);
        }

        if !changed.is_empty() {
            self.emit_config_change(changed);
        }

        if let Some(next_event) = outcome.next_event {
            debug!(
                ifname = %self.ifname,
                secs = next_event - i64::from(now),
                "scheduling next lifetime check"
            );
            self.reaper_deadline = Some(next_event);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // signals
    // ────────────────────────────────────────────────────────────────────

    fn emit_config_change(&mut self, changed: ConfigMap) {
        self.metrics.inc_config_changes();
        self.log_config_change(changed);
        let data = self.tables.snapshot();
        self.events.config_changed(&data, changed);
    }

    fn log_config_change(&self, changed: ConfigMap) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        debug!(
            ifname = %self.ifname,
            categories = %changed.summary(),
            "neighbor discovery configuration changed"
        );
        debug!("  dhcp-level {}", self.tables.dhcp_level().as_str());
        for gateway in self.tables.gateways() {
            debug!(
                "  gateway {} pref {} exp {}",
                gateway.address,
                gateway.preference,
                gateway.expires_at()
            );
        }
        for address in self.tables.addresses() {
            debug!("  address {} exp {}", address.address, address.expires_at());
        }
        for route in self.tables.routes() {
            debug!(
                "  route {}/{} via {} pref {} exp {}",
                route.network,
                route.plen,
                route.gateway,
                route.preference,
                route.expires_at()
            );
        }
        for server in self.tables.dns_servers() {
            debug!("  dns_server {} exp {}", server.address, server.expires_at());
        }
        for domain in self.tables.dns_domains() {
            debug!("  dns_domain {} exp {}", domain.domain, domain.expires_at());
        }
    }

    fn enter_netns(&self) -> Result<Option<NetnsGuard>, NetnsError> {
        match &self.netns {
            Some(netns) => NetnsGuard::enter(Arc::clone(netns)).map(Some),
            None => Ok(None),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::platform::NoopPlatform;
    use crate::transport::MockTransport;
    use crate::types::RouterPreference;
    use parking_lot::Mutex;

    #[derive(Debug, PartialEq, Eq)]
    enum Recorded {
        Change { mask: String, addresses: Vec<Ipv6Addr>, gateways: usize },
        RaTimeout,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<Recorded>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Recorded> {
            std::mem::take(&mut *self.log.lock())
        }
    }

    impl NdiscEvents for Recorder {
        fn config_changed(&mut self, data: &NdiscData<'_>, changed: ConfigMap) {
            self.log.lock().push(Recorded::Change {
                mask: changed.summary(),
                addresses: data.addresses.iter().map(|a| a.address).collect(),
                gateways: data.gateways.len(),
            });
        }

        fn ra_timeout(&mut self) {
            self.log.lock().push(Recorded::RaTimeout);
        }
    }

    struct Rig {
        engine: Ndisc,
        clock: Arc<ManualClock>,
        transport: MockTransport,
        recorder: Recorder,
    }

    fn rig_with(config: NdiscConfig) -> Rig {
        let clock = Arc::new(ManualClock::new(0));
        let transport = MockTransport::new();
        let recorder = Recorder::default();
        let engine = Ndisc::new(
            config,
            clock.clone(),
            Arc::new(NoopPlatform),
            Box::new(transport.clone()),
            Box::new(recorder.clone()),
            None,
        )
        .expect("engine");
        Rig { engine, clock, transport, recorder }
    }

    fn rig() -> Rig {
        rig_with(NdiscConfig::new(3, "eth0"))
    }

    /// Advance the manual clock to `now` and deliver due timers, the way
    /// the event-loop driver would.
    fn run_until(rig: &mut Rig, now: i32) {
        rig.clock.set(now);
        rig.engine.handle_timeouts(now);
    }

    const IID: InterfaceId = InterfaceId([0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

    // ──────────────────────────────────────────────────────────────────────
    // START & SOLICITATION SCHEDULE
    // ──────────────────────────────────────────────────────────────────────

    #[test]
    fn test_start_arms_ra_timeout_clamped_to_30() {
        let mut r = rig();
        r.engine.start().expect("start");
        // 3 * 4 + 1 = 13, clamped up to 30.
        assert_eq!(r.engine.next_wakeup(), Some(0)); // first RS is immediate
        run_until(&mut r, 0);
        assert!(r.engine.next_wakeup().is_some());
        // After the first send the pending deadlines are the RS retry (4)
        // and the RA timeout (30).
        assert_eq!(r.engine.next_wakeup(), Some(4));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut r = rig();
        r.engine.start().expect("start");
        assert_eq!(r.engine.start(), Err(NdiscError::AlreadyStarted));
    }

    #[test]
    fn test_start_initialises_transport_once() {
        let mut r = rig();
        r.engine.start().expect("start");
        assert_eq!(r.transport.starts(), 1);
    }

    #[test]
    fn test_solicitation_budget_spacing() {
        let mut r = rig();
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        assert_eq!(r.transport.sends(), 1);
        run_until(&mut r, 4);
        assert_eq!(r.transport.sends(), 2);
        run_until(&mut r, 8);
        assert_eq!(r.transport.sends(), 3);
        // Budget of 3 exhausted: only the RA timeout remains armed.
        assert_eq!(r.engine.next_wakeup(), Some(30));
        run_until(&mut r, 12);
        assert_eq!(r.transport.sends(), 3);
    }

    #[test]
    fn test_send_failure_does_not_consume_budget() {
        let mut r = rig();
        r.transport.fail_sends_with(Some("link down"));
        r.engine.start().expect("start");
        // Failures keep the retry going well past the nominal budget.
        for step in 0..10 {
            run_until(&mut r, step * 4);
        }
        assert_eq!(r.transport.sends(), 10);
        assert_eq!(r.engine.metrics().solicitation_failures(), 10);
        assert_eq!(r.engine.metrics().solicitations_sent(), 0);
        // Recovery: the full budget is still available.
        r.transport.fail_sends_with(None);
        run_until(&mut r, 40);
        run_until(&mut r, 44);
        run_until(&mut r, 48);
        assert_eq!(r.engine.metrics().solicitations_sent(), 3);
        assert_eq!(r.engine.next_wakeup(), None); // RA timeout fired at 30 already
    }

    #[test]
    fn test_ra_timeout_fires_once() {
        let mut r = rig();
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        run_until(&mut r, 4);
        run_until(&mut r, 8);
        run_until(&mut r, 30);
        assert_eq!(r.recorder.take(), vec![Recorded::RaTimeout]);
        assert_eq!(r.engine.metrics().ra_timeouts(), 1);
        run_until(&mut r, 60);
        assert!(r.recorder.take().is_empty());
    }

    #[test]
    fn test_ra_received_cancels_rs_and_ra_timeout() {
        let mut r = rig();
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        r.engine.ra_received(2, ConfigMap::NONE);
        // Empty tables, empty mask: nothing armed, nothing emitted.
        assert_eq!(r.engine.next_wakeup(), None);
        assert!(r.recorder.take().is_empty());
        run_until(&mut r, 120);
        assert!(r.recorder.take().is_empty());
        assert_eq!(r.transport.sends(), 1);
    }

    // ──────────────────────────────────────────────────────────────────────
    // RA INGEST & REAPER
    // ──────────────────────────────────────────────────────────────────────

    #[test]
    fn test_ra_ingest_emits_with_accumulated_mask() {
        let mut r = rig();
        r.engine.set_iid(IID);
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        r.recorder.take();

        r.clock.set(2);
        let mut mask = ConfigMap::NONE;
        if r.engine.set_dhcp_level(DhcpLevel::None) {
            mask |= ConfigMap::DHCP_LEVEL;
        }
        if r.engine.add_gateway(Gateway {
            address: "fe80::1".parse().expect("addr"),
            timestamp: 2,
            lifetime: 1800,
            preference: RouterPreference::Medium,
        }) {
            mask |= ConfigMap::GATEWAYS;
        }
        if r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8::".parse().expect("addr"),
            timestamp: 2,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        }) {
            mask |= ConfigMap::ADDRESSES;
        }
        r.engine.ra_received(2, mask);

        let events = r.recorder.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Recorded::Change { mask, addresses, gateways } => {
                assert_eq!(mask, "GA"); // dhcp level was already `none`
                assert_eq!(*gateways, 1);
                assert_eq!(
                    addresses,
                    &vec!["2001:db8::200:0:0:1".parse::<Ipv6Addr>().expect("addr")]
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
        // Gateway expires first: 2 + 1800.
        assert_eq!(r.engine.next_wakeup(), Some(1802));
    }

    #[test]
    fn test_reaper_expires_and_disarms() {
        let mut r = rig();
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        r.engine.add_gateway(Gateway {
            address: "fe80::1".parse().expect("addr"),
            timestamp: 100,
            lifetime: 60,
            preference: RouterPreference::Medium,
        });
        r.engine.ra_received(100, ConfigMap::GATEWAYS);
        r.recorder.take();
        assert_eq!(r.engine.next_wakeup(), Some(160));

        run_until(&mut r, 159);
        assert!(r.recorder.take().is_empty());

        run_until(&mut r, 160);
        let events = r.recorder.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Recorded::Change { mask, gateways, .. } => {
                assert_eq!(mask, "G");
                assert_eq!(*gateways, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(r.engine.next_wakeup(), None);
    }

    #[test]
    fn test_dns_half_life_triggers_resolicit() {
        let mut r = rig();
        r.engine.start().expect("start");
        run_until(&mut r, 0); // consume initial send, budget now 2
        r.engine.add_dns_server(DnsServer {
            address: "2001:db8::53".parse().expect("addr"),
            timestamp: 100,
            lifetime: 600,
        });
        r.engine.ra_received(100, ConfigMap::DNS_SERVERS);
        r.recorder.take();
        assert_eq!(r.engine.next_wakeup(), Some(400));

        let sends_before = r.transport.sends();
        run_until(&mut r, 400);
        // The refresh re-armed the solicitation schedule instead of a
        // reaper deadline.
        assert!(r.engine.next_wakeup().is_some());
        run_until(&mut r, 404);
        assert!(r.transport.sends() > sends_before);
        // The entry itself survived.
        assert_eq!(r.engine.snapshot().dns_servers.len(), 1);
    }

    // ──────────────────────────────────────────────────────────────────────
    // IID ROTATION
    // ──────────────────────────────────────────────────────────────────────

    #[test]
    fn test_set_iid_same_value_is_noop() {
        let mut r = rig();
        assert!(r.engine.set_iid(IID));
        assert!(!r.engine.set_iid(IID));
    }

    #[test]
    fn test_set_iid_change_flushes_addresses_and_resolicits() {
        let mut r = rig();
        r.engine.set_iid(IID);
        r.engine.start().expect("start");
        run_until(&mut r, 0);
        r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8::".parse().expect("addr"),
            timestamp: 0,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        });
        r.engine.ra_received(0, ConfigMap::ADDRESSES);
        r.recorder.take();

        r.clock.set(10);
        assert!(r.engine.set_iid(InterfaceId([0x02, 0, 0, 0, 0, 0, 0, 0x02])));
        let events = r.recorder.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Recorded::Change { mask, addresses, .. } => {
                assert_eq!(mask, "A");
                assert!(addresses.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
        // A fresh solicitation round was scheduled.
        assert!(r.engine.next_wakeup().is_some());
    }

    #[test]
    fn test_set_iid_change_with_no_addresses_emits_nothing() {
        let mut r = rig();
        r.engine.set_iid(IID);
        assert!(r.engine.set_iid(InterfaceId([0x02, 0, 0, 0, 0, 0, 0, 0x03])));
        assert!(r.recorder.take().is_empty());
    }

    // ──────────────────────────────────────────────────────────────────────
    // DAD FAILURES
    // ──────────────────────────────────────────────────────────────────────

    #[test]
    fn test_dad_failed_eui64_removes_address() {
        let mut r = rig();
        r.engine.set_iid(IID);
        r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8::".parse().expect("addr"),
            timestamp: 0,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        });
        let stored: Ipv6Addr = "2001:db8::200:0:0:1".parse().expect("addr");
        r.engine.dad_failed(stored);
        let events = r.recorder.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Recorded::Change { mask, addresses, .. } => {
                assert_eq!(mask, "A");
                assert!(addresses.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(r.engine.metrics().dad_failures(), 1);
    }

    #[test]
    fn test_dad_failed_unknown_address_is_silent() {
        let mut r = rig();
        r.engine.dad_failed("2001:db8::dead".parse().expect("addr"));
        assert!(r.recorder.take().is_empty());
        assert_eq!(r.engine.metrics().dad_failures(), 0);
    }

    // ──────────────────────────────────────────────────────────────────────
    // ADDRESS CAP
    // ──────────────────────────────────────────────────────────────────────

    #[test]
    fn test_cap_drop_is_counted() {
        let mut config = NdiscConfig::new(3, "eth0");
        config.max_addresses = 1;
        let mut r = rig_with(config);
        r.engine.set_iid(IID);
        assert!(r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8:1::".parse().expect("addr"),
            timestamp: 0,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        }));
        assert!(!r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8:2::".parse().expect("addr"),
            timestamp: 0,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        }));
        assert_eq!(r.engine.metrics().addresses_dropped(), 1);
        assert_eq!(r.engine.snapshot().addresses.len(), 1);
    }

    #[test]
    fn test_synthesis_failure_drops_address() {
        let mut r = rig(); // no IID installed
        assert!(!r.engine.complete_and_add_address(SlaacAddress {
            address: "2001:db8::".parse().expect("addr"),
            timestamp: 0,
            lifetime: 3600,
            preferred: 1800,
            dad_counter: 0,
        }));
        assert_eq!(r.engine.metrics().synthesis_failures(), 1);
        assert!(r.engine.snapshot().addresses.is_empty());
    }
}
