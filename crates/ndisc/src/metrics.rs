//! Engine metrics.
//!
//! Lock-free counters over `AtomicU64`; increments are `Relaxed` (they are
//! monotonic), reads in [`NdiscMetrics::to_prometheus`] are `SeqCst` so
//! one exposition is a consistent snapshot. The struct is shared via
//! `Arc` between the engine and whoever scrapes it.
//!
//! Two of these counters exist specifically to make historically silent
//! behaviour observable: the solicitation counters (the retry budget is
//! not consumed by failed sends, so failures can repeat forever) and the
//! address-drop counter (the cap drops new prefixes without an error).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one engine instance.
#[derive(Debug, Default)]
pub struct NdiscMetrics {
    solicitations_sent: AtomicU64,
    solicitation_failures: AtomicU64,
    ra_timeouts: AtomicU64,
    dad_failures: AtomicU64,
    synthesis_failures: AtomicU64,
    addresses_dropped: AtomicU64,
    config_changes: AtomicU64,
}

impl NdiscMetrics {
    #[must_use]
    pub fn new() -> Self {
        NdiscMetrics::default()
    }

    pub(crate) fn inc_solicitations_sent(&self) {
        self.solicitations_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_solicitation_failures(&self) {
        self.solicitation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_ra_timeouts(&self) {
        self.ra_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dad_failures(&self) {
        self.dad_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_synthesis_failures(&self) {
        self.synthesis_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_addresses_dropped(&self) {
        self.addresses_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_config_changes(&self) {
        self.config_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Router solicitations handed to the transport successfully.
    #[must_use]
    pub fn solicitations_sent(&self) -> u64 {
        self.solicitations_sent.load(Ordering::SeqCst)
    }

    /// `send_rs` attempts that returned an error.
    #[must_use]
    pub fn solicitation_failures(&self) -> u64 {
        self.solicitation_failures.load(Ordering::SeqCst)
    }

    /// Times the first-RA timeout fired.
    #[must_use]
    pub fn ra_timeouts(&self) -> u64 {
        self.ra_timeouts.load(Ordering::SeqCst)
    }

    /// Stored addresses reported as duplicates by the kernel.
    #[must_use]
    pub fn dad_failures(&self) -> u64 {
        self.dad_failures.load(Ordering::SeqCst)
    }

    /// Addresses dropped because host bits could not be produced.
    #[must_use]
    pub fn synthesis_failures(&self) -> u64 {
        self.synthesis_failures.load(Ordering::SeqCst)
    }

    /// Fresh prefix addresses discarded at the configured cap.
    #[must_use]
    pub fn addresses_dropped(&self) -> u64 {
        self.addresses_dropped.load(Ordering::SeqCst)
    }

    /// Change signals emitted to the consumer.
    #[must_use]
    pub fn config_changes(&self) -> u64 {
        self.config_changes.load(Ordering::SeqCst)
    }

    /// Prometheus exposition format (untyped counters).
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(512);
        let pairs: [(&str, u64); 7] = [
            ("ndisc_solicitations_sent_total", self.solicitations_sent()),
            ("ndisc_solicitation_failures_total", self.solicitation_failures()),
            ("ndisc_ra_timeouts_total", self.ra_timeouts()),
            ("ndisc_dad_failures_total", self.dad_failures()),
            ("ndisc_synthesis_failures_total", self.synthesis_failures()),
            ("ndisc_addresses_dropped_total", self.addresses_dropped()),
            ("ndisc_config_changes_total", self.config_changes()),
        ];
        for (name, value) in pairs {
            out.push_str("# TYPE ");
            out.push_str(name);
            out.push_str(" counter\n");
            out.push_str(name);
            out.push(' ');
            out.push_str(&value.to_string());
            out.push('\n');
        }
        out
    }
}
