//! Platform and network-namespace seams.
//!
//! The engine never talks to the kernel itself; it only needs two things
//! from its host:
//!
//! - a [`Platform`] handle through which the owning namespace is
//!   discovered at construction, and
//! - a [`Netns`] scope that brackets every transport entry (`start`, the
//!   RS send path) so no work happens outside the engine's namespace.
//!
//! Namespace entry is RAII: [`NetnsGuard`] restores the previous namespace
//! on every exit path, including panics. A failed entry aborts the current
//! timer callback without mutating any state.

use std::sync::Arc;

use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// NETNS
// ════════════════════════════════════════════════════════════════════════════

/// A network namespace the engine can enter and leave.
pub trait Netns: Send + Sync {
    /// Switch the calling thread into this namespace.
    fn enter(&self) -> Result<(), NetnsError>;

    /// Restore the previously active namespace. Must not fail; a platform
    /// that cannot guarantee restoration should abort instead.
    fn leave(&self);
}

/// Scoped namespace entry failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to enter network namespace: {0}")]
pub struct NetnsError(pub String);

/// RAII scope: entered on construction, left on drop.
pub struct NetnsGuard {
    ns: Arc<dyn Netns>,
}

impl NetnsGuard {
    /// Enter `ns`, returning a guard that leaves it again when dropped.
    pub fn enter(ns: Arc<dyn Netns>) -> Result<NetnsGuard, NetnsError> {
        ns.enter()?;
        Ok(NetnsGuard { ns })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        self.ns.leave();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PLATFORM
// ════════════════════════════════════════════════════════════════════════════

/// Opaque handle to the host platform.
///
/// The engine acquires it at construction and keeps it for its lifetime;
/// the only capability it uses directly is namespace discovery. Address
/// and route installation happen on the consumer side of the change
/// signal.
pub trait Platform: Send + Sync {
    /// The namespace this engine's interface lives in, if namespaced.
    fn netns(&self) -> Option<Arc<dyn Netns>>;
}

/// A platform with no namespace: everything runs where the process runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPlatform;

impl Platform for NoopPlatform {
    fn netns(&self) -> Option<Arc<dyn Netns>> {
        None
    }
}
