//! # Learned-State Tables & Lifetime Sweep
//!
//! [`NdiscTables`] owns everything a Router Advertisement can teach the
//! engine: the five keyed collections plus the scalar snapshot state
//! (DHCP hint, hop limit, MTU). It is a pure state machine: every
//! operation takes its inputs (including time) as parameters, performs
//! bounded synchronous work and reports whether the snapshot changed.
//! Timers, signals and transports live a layer above.
//!
//! ## Merge Rules
//!
//! Each `add_*` operation scans its collection linearly (the collections
//! are small: a few gateways, a handful of prefixes, 1–4 DNS entries; a
//! contiguous array beats any keyed structure here and keeps the
//! preference order explicit):
//!
//! - A record with `lifetime == 0` **withdraws** its key: a matching
//!   entry is removed (changed), a missing one is a no-op (unchanged).
//! - A matching key is updated in place, preserving position, unless the
//!   preference changed, in which case the old entry is removed and the
//!   scan continues so the record can be reinserted at the position its
//!   new preference demands.
//! - Gateways and routes insert **before the first entry with strictly
//!   lower preference**; if no such entry exists the record is appended,
//!   keeping the list monotonically non-increasing and equal-preference
//!   peers in arrival order.
//!
//! ## Sweep Rules
//!
//! [`NdiscTables::sweep`] walks all five collections once: entries whose
//! `timestamp + lifetime` (64-bit) has passed are deleted and their
//! category marked; surviving finite entries propose their expiry as the
//! next wake-up. DNS servers and domains additionally track a half-life
//! refresh boundary; crossing it asks the caller to re-solicit so the
//! entry can be re-learned before it is lost.

use tracing::warn;

use crate::types::{
    ConfigMap, DhcpLevel, DnsDomain, DnsServer, Gateway, NdiscData, RouteInfo, SlaacAddress,
    LIFETIME_INFINITE,
};

/// Result of merging one completed address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMerge {
    /// The snapshot changed (entry added, removed, or its expiries moved).
    Changed,
    /// Semantically a no-op.
    Unchanged,
    /// A fresh address was discarded because the cap is reached.
    CapExceeded,
}

/// What one lifetime sweep did and when to look again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Categories that lost entries.
    pub changed: ConfigMap,
    /// Earliest upcoming expiry or refresh boundary, if any finite
    /// lifetime remains. Always strictly after the sweep's `now`.
    pub next_event: Option<i64>,
    /// A DNS entry crossed its half-life; the caller should re-solicit.
    pub refresh_needed: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// TABLES
// ════════════════════════════════════════════════════════════════════════════

/// The engine's learned state. See the module docs for the merge and
/// sweep rules.
#[derive(Debug)]
pub struct NdiscTables {
    dhcp_level: DhcpLevel,
    hop_limit: u8,
    mtu: u32,
    gateways: Vec<Gateway>,
    addresses: Vec<SlaacAddress>,
    routes: Vec<RouteInfo>,
    dns_servers: Vec<DnsServer>,
    dns_domains: Vec<DnsDomain>,
    max_addresses: u32,
}

impl NdiscTables {
    /// Empty tables. `max_addresses == 0` disables the address cap.
    #[must_use]
    pub fn new(max_addresses: u32) -> Self {
        NdiscTables {
            dhcp_level: DhcpLevel::None,
            hop_limit: 64,
            mtu: 0,
            gateways: Vec::new(),
            addresses: Vec::new(),
            routes: Vec::new(),
            dns_servers: Vec::new(),
            dns_domains: Vec::new(),
            max_addresses,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // scalar state
    // ────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn dhcp_level(&self) -> DhcpLevel {
        self.dhcp_level
    }

    /// Returns whether the value changed.
    pub fn set_dhcp_level(&mut self, level: DhcpLevel) -> bool {
        let changed = self.dhcp_level != level;
        self.dhcp_level = level;
        changed
    }

    #[must_use]
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    /// Returns whether the value changed.
    pub fn set_hop_limit(&mut self, hop_limit: u8) -> bool {
        let changed = self.hop_limit != hop_limit;
        self.hop_limit = hop_limit;
        changed
    }

    #[must_use]
    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    /// Returns whether the value changed.
    pub fn set_mtu(&mut self, mtu: u32) -> bool {
        let changed = self.mtu != mtu;
        self.mtu = mtu;
        changed
    }

    // ────────────────────────────────────────────────────────────────────
    // collection accessors
    // ────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    #[must_use]
    pub fn addresses(&self) -> &[SlaacAddress] {
        &self.addresses
    }

    pub(crate) fn addresses_mut(&mut self) -> &mut Vec<SlaacAddress> {
        &mut self.addresses
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    #[must_use]
    pub fn dns_servers(&self) -> &[DnsServer] {
        &self.dns_servers
    }

    #[must_use]
    pub fn dns_domains(&self) -> &[DnsDomain] {
        &self.dns_domains
    }

    /// Borrowed snapshot of everything, for the change signal.
    #[must_use]
    pub fn snapshot(&self) -> NdiscData<'_> {
        NdiscData {
            dhcp_level: self.dhcp_level,
            hop_limit: self.hop_limit,
            mtu: self.mtu,
            gateways: &self.gateways,
            addresses: &self.addresses,
            routes: &self.routes,
            dns_servers: &self.dns_servers,
            dns_domains: &self.dns_domains,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // merge operations
    // ────────────────────────────────────────────────────────────────────

    /// Merges a gateway. Returns whether the snapshot changed.
    pub fn add_gateway(&mut self, new: Gateway) -> bool {
        let mut insert_idx: Option<usize> = None;
        let mut i = 0;
        while i < self.gateways.len() {
            let item = self.gateways[i];

            if item.address == new.address {
                if new.lifetime == 0 {
                    self.gateways.remove(i);
                    return true;
                }
                if item.preference != new.preference {
                    // Reinsertion must find the slot for the new
                    // preference; drop the stale entry and keep scanning.
                    self.gateways.remove(i);
                    continue;
                }
                self.gateways[i] = new;
                return false;
            }

            // Put before less preferable gateways.
            if item.preference < new.preference && insert_idx.is_none() {
                insert_idx = Some(i);
            }
            i += 1;
        }

        if new.lifetime == 0 {
            return false;
        }
        let at = insert_idx.unwrap_or(self.gateways.len());
        self.gateways.insert(at, new);
        true
    }

    /// Merges a route. Keyed by `(network, plen)`, otherwise identical to
    /// gateway merging.
    ///
    /// # Panics
    ///
    /// A `plen` outside `1..=128` is a caller bug: default routes belong
    /// in the gateway list and upper layers never expect anything wider
    /// than a full address.
    pub fn add_route(&mut self, new: RouteInfo) -> bool {
        assert!(
            (1..=128).contains(&new.plen),
            "route prefix length out of range: {}",
            new.plen
        );

        let mut insert_idx: Option<usize> = None;
        let mut i = 0;
        while i < self.routes.len() {
            let item = self.routes[i];

            if item.network == new.network && item.plen == new.plen {
                if new.lifetime == 0 {
                    self.routes.remove(i);
                    return true;
                }
                if item.preference != new.preference {
                    self.routes.remove(i);
                    continue;
                }
                self.routes[i] = new;
                return false;
            }

            // Put before less preferable routes.
            if item.preference < new.preference && insert_idx.is_none() {
                insert_idx = Some(i);
            }
            i += 1;
        }

        if new.lifetime == 0 {
            return false;
        }
        let at = insert_idx.unwrap_or(self.routes.len());
        self.routes.insert(at, new);
        true
    }

    /// Merges a *completed* address (host bits already synthesised).
    ///
    /// An update in place reports [`AddressMerge::Changed`] only when the
    /// expiry or the preferred-expiry actually moved. Fresh addresses
    /// append in arrival order, subject to the cap.
    pub fn upsert_address(&mut self, new: SlaacAddress) -> AddressMerge {
        for i in 0..self.addresses.len() {
            if self.addresses[i].address != new.address {
                continue;
            }
            if new.lifetime == 0 {
                self.addresses.remove(i);
                return AddressMerge::Changed;
            }
            let item = &mut self.addresses[i];
            let changed = item.expires_at() != new.expires_at()
                || item.preferred_until() != new.preferred_until();
            *item = new;
            return if changed { AddressMerge::Changed } else { AddressMerge::Unchanged };
        }

        // The cap counts only autoconf addresses, unlike the kernel's
        // per-interface limit which counts every address.
        if self.max_addresses != 0 && self.addresses.len() >= self.max_addresses as usize {
            return AddressMerge::CapExceeded;
        }

        if new.lifetime == 0 {
            return AddressMerge::Unchanged;
        }
        self.addresses.push(new);
        AddressMerge::Changed
    }

    /// Merges a DNS server. Returns whether the snapshot changed.
    pub fn add_dns_server(&mut self, new: DnsServer) -> bool {
        for i in 0..self.dns_servers.len() {
            if self.dns_servers[i].address != new.address {
                continue;
            }
            if new.lifetime == 0 {
                self.dns_servers.remove(i);
                return true;
            }
            let item = &mut self.dns_servers[i];
            if item.timestamp != new.timestamp || item.lifetime != new.lifetime {
                *item = new;
                return true;
            }
            return false;
        }

        if new.lifetime == 0 {
            return false;
        }
        self.dns_servers.push(new);
        true
    }

    /// Merges a DNS search domain. Returns whether the snapshot changed.
    pub fn add_dns_domain(&mut self, new: DnsDomain) -> bool {
        for i in 0..self.dns_domains.len() {
            if self.dns_domains[i].domain != new.domain {
                continue;
            }
            if new.lifetime == 0 {
                self.dns_domains.remove(i);
                return true;
            }
            let item = &mut self.dns_domains[i];
            let changed = item.timestamp != new.timestamp || item.lifetime != new.lifetime;
            if changed {
                item.timestamp = new.timestamp;
                item.lifetime = new.lifetime;
            }
            return changed;
        }

        if new.lifetime == 0 {
            return false;
        }
        self.dns_domains.push(new);
        true
    }

    /// Drops every synthesised address (interface identifier rotation).
    /// Returns whether anything was removed.
    pub fn flush_addresses(&mut self) -> bool {
        if self.addresses.is_empty() {
            return false;
        }
        self.addresses.clear();
        true
    }

    // ────────────────────────────────────────────────────────────────────
    // lifetime sweep
    // ────────────────────────────────────────────────────────────────────

    /// Deletes everything that expired by `now` and reports the earliest
    /// upcoming boundary. See the module docs for the DNS half-life rule.
    pub fn sweep(&mut self, now: i32) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let now = i64::from(now);

        if sweep_expiring(&mut self.gateways, now, |g| (g.timestamp, g.lifetime), &mut outcome.next_event) {
            outcome.changed |= ConfigMap::GATEWAYS;
        }
        if sweep_expiring(&mut self.addresses, now, |a| (a.timestamp, a.lifetime), &mut outcome.next_event) {
            outcome.changed |= ConfigMap::ADDRESSES;
        }
        if sweep_expiring(&mut self.routes, now, |r| (r.timestamp, r.lifetime), &mut outcome.next_event) {
            outcome.changed |= ConfigMap::ROUTES;
        }

        let (removed, refresh) = sweep_refreshing(
            &mut self.dns_servers,
            now,
            |s| (s.timestamp, s.lifetime),
            &mut outcome.next_event,
        );
        if removed {
            outcome.changed |= ConfigMap::DNS_SERVERS;
        }
        outcome.refresh_needed |= refresh;

        let (removed, refresh) = sweep_refreshing(
            &mut self.dns_domains,
            now,
            |d| (d.timestamp, d.lifetime),
            &mut outcome.next_event,
        );
        if removed {
            outcome.changed |= ConfigMap::DNS_DOMAINS;
        }
        outcome.refresh_needed |= refresh;

        if let Some(next) = outcome.next_event {
            // Expired entries were just removed, so every surviving
            // boundary is in the future.
            debug_assert!(next > now, "next event {} not after {}", next, now);
            if next <= now {
                warn!(next, now, "lifetime sweep produced a stale next event");
                outcome.next_event = Some(now + 1);
            }
        }

        outcome
    }
}

/// Removes expired entries; surviving finite entries propose their expiry.
/// Returns whether anything was removed.
fn sweep_expiring<T>(
    items: &mut Vec<T>,
    now: i64,
    life: impl Fn(&T) -> (i32, u32),
    next_event: &mut Option<i64>,
) -> bool {
    let mut removed = false;
    let mut i = 0;
    while i < items.len() {
        let (timestamp, lifetime) = life(&items[i]);
        if lifetime == LIFETIME_INFINITE {
            i += 1;
            continue;
        }
        let expiry = i64::from(timestamp) + i64::from(lifetime);
        if now >= expiry {
            items.remove(i);
            removed = true;
        } else {
            bump_next_event(next_event, expiry);
            i += 1;
        }
    }
    removed
}

/// DNS variant: additionally reports when an entry crossed its half-life
/// boundary (it stays, but the caller should re-solicit). While an entry
/// is past its refresh but not yet expired, nothing more is scheduled for
/// it; the re-solicitation is expected to renew or withdraw it.
fn sweep_refreshing<T>(
    items: &mut Vec<T>,
    now: i64,
    life: impl Fn(&T) -> (i32, u32),
    next_event: &mut Option<i64>,
) -> (bool, bool) {
    let mut removed = false;
    let mut refresh_needed = false;
    let mut i = 0;
    while i < items.len() {
        let (timestamp, lifetime) = life(&items[i]);
        if lifetime == LIFETIME_INFINITE {
            i += 1;
            continue;
        }
        let expiry = i64::from(timestamp) + i64::from(lifetime);
        let refresh = i64::from(timestamp) + i64::from(lifetime / 2);
        if now >= expiry {
            items.remove(i);
            removed = true;
            continue;
        }
        if now >= refresh {
            refresh_needed = true;
        } else {
            bump_next_event(next_event, refresh);
        }
        i += 1;
    }
    (removed, refresh_needed)
}

#[inline]
fn bump_next_event(next_event: &mut Option<i64>, candidate: i64) {
    if next_event.map_or(true, |next| candidate < next) {
        *next_event = Some(candidate);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════
