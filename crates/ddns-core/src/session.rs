// # Session State
//
// The only state carried across reconciliation cycles.
//
// ## Crash Behavior
//
// - Held in process memory only, never written to disk
// - Lost on restart; the first cycle afterwards re-reads the provider's
//   records and converges without duplicating this host's record

use std::net::IpAddr;

/// Last address this process successfully reconciled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    last_applied: Option<IpAddr>,
    applied_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SessionState {
    /// Create an empty session (before the first successful cycle)
    pub fn new() -> Self {
        Self::default()
    }

    /// The last applied address, if any cycle has succeeded
    pub fn last_applied(&self) -> Option<IpAddr> {
        self.last_applied
    }

    /// When the last applied address was recorded
    pub fn applied_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.applied_at
    }

    /// Whether the given address is the one already applied
    pub fn is_applied(&self, addr: &IpAddr) -> bool {
        self.last_applied.as_ref() == Some(addr)
    }

    /// Record a successful reconciliation
    ///
    /// Only the engine calls this, after the provider confirmed `addr`.
    pub(crate) fn record_applied(&mut self, addr: IpAddr) {
        self.last_applied = Some(addr);
        self.applied_at = Some(chrono::Utc::now());
    }

    /// Forget the applied address (target changed on reload)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start from a known address
    ///
    /// Useful when embedding the engine and the caller already knows which
    /// address this host's record holds.
    pub fn with_last_applied(addr: IpAddr) -> Self {
        Self {
            last_applied: Some(addr),
            applied_at: Some(chrono::Utc::now()),
        }
    }
}
